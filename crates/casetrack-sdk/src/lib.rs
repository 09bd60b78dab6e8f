//! Casetrack SDK - 法律案件进度门户客户端 SDK
//!
//! 本 SDK 是门户客户端（Web / 移动外壳）的同步核心，包括：
//! - 🔐 认证会话：启动引导（trust-on-read）、远端优先登录、演示账号回退、登出清扫
//! - 📁 案件进度：权威加载、乐观阶段更新与失败回滚
//! - 🎬 观看进度：按阶段的已观看集合、续看指针、完成百分比
//! - 💾 本地持久化：按平台注入的键值存储、按键写入队列
//! - ⚙️ 事件系统：统一的事件广播和回调机制
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use casetrack_sdk::{CasetrackSDK, CasetrackConfig, Platform};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 配置 SDK
//!     let config = CasetrackConfig::builder()
//!         .platform(Platform::Mobile)
//!         .data_dir("/path/to/data")
//!         .build();
//!
//!     // 初始化（内部完成会话引导；已认证则顺带加载案件进度）
//!     let sdk = CasetrackSDK::initialize(config).await?;
//!
//!     // 登录（远端网络不可达时自动回退演示账号）
//!     let identity = sdk.login("client@demo.com", "client123").await?;
//!     println!("欢迎, {}", identity.name);
//!
//!     // 挂载阶段 1 的观看集合并勾选视频
//!     let tracker = sdk.watched_set(1).await?;
//!     tracker.toggle("phase1_video_1").await?;
//!     println!("完成度: {}%", tracker.completion_percentage().await);
//!
//!     // 关闭 SDK
//!     sdk.shutdown().await?;
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod auth;
pub mod catalog;
pub mod error;
pub mod events;
pub mod http_client;
pub mod i18n;
pub mod progress;
pub mod sdk;
pub mod session_state;
pub mod storage;
pub mod version;
pub mod video;
pub mod watched;

#[cfg(test)]
mod test_stub;

// 重新导出核心类型，方便使用
pub use auth::{default_demo_accounts, AuthManager, DemoAccount, LoginResponse};
pub use catalog::{
    is_valid_phase, CatalogError, Localized, PhaseCatalog, PhaseInfo, VideoItem, PHASE_MAX,
    PHASE_MIN,
};
pub use error::{CasetrackSDKError, Result};
pub use events::{EventManager, EventStats, SdkEvent};
pub use http_client::ApiClient;
pub use i18n::{default_tables, Language, Localizer, TranslationTable};
pub use progress::{
    CaseProgress, LastWatchedVideo, ProgressManager, RemoteWritePolicy, UserProfile,
};
pub use sdk::{CasetrackConfig, CasetrackConfigBuilder, CasetrackSDK, Platform};
pub use session_state::{Identity, SessionState, SessionStateManager, SessionStatus, UserRole};
pub use storage::{KeyValueStore, KeyWriteQueue, MemoryKvStore, SledKvStore};
pub use version::SDK_VERSION;
pub use video::{MobilePlaceholderRenderer, VideoRenderer, VideoSurface, WebEmbedRenderer};
pub use watched::{PhaseVideoProgress, PhaseWatchedSet};
