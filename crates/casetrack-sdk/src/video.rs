//! 视频呈现能力接口
//!
//! 播放器后端的运行时平台分支收敛为 [`VideoRenderer`] trait，
//! 启动时按构建目标注入一次实现；SDK 只产出呈现描述，
//! 实际绘制由宿主外壳完成。

use std::sync::Arc;

use crate::catalog::VideoItem;
use crate::i18n::Language;
use crate::sdk::Platform;

/// 视频呈现描述
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSurface {
    /// Web：iframe 嵌入播放
    EmbedFrame { url: String },
    /// 移动端：占位提示（播放仅在 Web 端可用）
    Placeholder { message: String },
}

/// 视频呈现器能力接口
pub trait VideoRenderer: Send + Sync {
    fn render(&self, video: &VideoItem, language: Language) -> VideoSurface;
}

/// Web 端实现：按语言取嵌入地址
pub struct WebEmbedRenderer;

impl VideoRenderer for WebEmbedRenderer {
    fn render(&self, video: &VideoItem, language: Language) -> VideoSurface {
        VideoSurface::EmbedFrame {
            url: video.embed_url.get(language).to_string(),
        }
    }
}

/// 移动端实现：占位提示
pub struct MobilePlaceholderRenderer;

impl VideoRenderer for MobilePlaceholderRenderer {
    fn render(&self, _video: &VideoItem, _language: Language) -> VideoSurface {
        VideoSurface::Placeholder {
            message: "Video playback available on web".to_string(),
        }
    }
}

/// 按平台选定呈现器（启动时调用一次）
pub fn renderer_for(platform: Platform) -> Arc<dyn VideoRenderer> {
    match platform {
        Platform::Web => Arc::new(WebEmbedRenderer),
        Platform::Mobile => Arc::new(MobilePlaceholderRenderer),
    }
}
