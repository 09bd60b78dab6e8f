//! 案件进度管理
//!
//! 仅在会话已认证期间活跃；会话转为未认证时进度被清空（置空，
//! 而非留下陈旧值）。权威数据来自远端 `GET /api/user/me`，加载失败
//! 在本周期内是终态（不自动重试，进度保持为空）。
//!
//! 两个远端写操作遵循显式声明的策略（见 [`RemoteWritePolicy`]）：
//! - `update_current_phase` → OptimisticRollback：本地先行，远端失败
//!   则回滚，回滚本身是对用户的唯一提示
//! - `update_last_watched_video` → FireAndForget：续看指针是尽力而为
//!   的便利数据，远端失败绝不回滚本地/设备值

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::catalog::is_valid_phase;
use crate::error::{CasetrackSDKError, Result};
use crate::events::{EventManager, SdkEvent};
use crate::http_client::ApiClient;
use crate::i18n::Language;
use crate::session_state::{Identity, UserRole};
use crate::storage::{self, keys, KeyValueStore, KeyWriteQueue};

/// 续看指针（阶段 + 视频）
///
/// 在某视频从未观看转为已观看的那一刻写入；取消观看不回退指针，
/// 因此指针可以指向一个已不在已观看集合里的视频（允许的陈旧指针
/// 语义）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastWatchedVideo {
    pub phase_number: u8,
    pub video_id: String,
}

/// `GET /api/user/me` / 登录响应里的用户档案
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(default = "default_current_phase")]
    pub current_phase: u8,
    #[serde(default)]
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_watched_video: Option<LastWatchedVideo>,
}

/// 后端 User 模型的 currentPhase 默认值
fn default_current_phase() -> u8 {
    1
}

impl UserProfile {
    /// 规范化为持久化身份记录
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            case_number: self.case_number.clone(),
        }
    }
}

/// 案件进度
#[derive(Debug, Clone, PartialEq)]
pub struct CaseProgress {
    /// 当前阶段（1..=15）
    pub current_phase: u8,
    /// 续看指针
    pub last_watched_video: Option<LastWatchedVideo>,
}

/// 远端写操作的显式策略
///
/// 原实现里阶段更新回滚、续看指针不回滚的不对称是隐式的；
/// 这里把策略提升为每个操作的显式声明，不再靠读代码猜。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteWritePolicy {
    /// 本地先行，远端失败回滚本地值
    OptimisticRollback,
    /// 本地/设备值为准，远端失败仅记录
    FireAndForget,
}

#[derive(Debug, Serialize)]
struct PhaseUpdateRequest {
    phase: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LastVideoUpdateRequest<'a> {
    phase_number: u8,
    video_id: &'a str,
}

/// 服务端确认响应 `{ "success": true }`
#[derive(Debug, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

/// 案件进度管理器
pub struct ProgressManager {
    api: Arc<ApiClient>,
    store: Arc<dyn KeyValueStore>,
    write_queue: Arc<KeyWriteQueue>,
    state: Arc<RwLock<Option<CaseProgress>>>,
    events: Arc<EventManager>,
}

impl ProgressManager {
    /// `update_current_phase` 的远端写策略
    pub const PHASE_UPDATE_POLICY: RemoteWritePolicy = RemoteWritePolicy::OptimisticRollback;
    /// `update_last_watched_video` 的远端写策略
    pub const LAST_WATCHED_POLICY: RemoteWritePolicy = RemoteWritePolicy::FireAndForget;

    pub fn new(
        api: Arc<ApiClient>,
        store: Arc<dyn KeyValueStore>,
        write_queue: Arc<KeyWriteQueue>,
        events: Arc<EventManager>,
    ) -> Self {
        Self {
            api,
            store,
            write_queue,
            state: Arc::new(RwLock::new(None)),
            events,
        }
    }

    /// 从远端加载权威的案件进度
    ///
    /// 失败即本周期终态：进度置空、错误上抛，调用方据此展示
    /// "暂无数据"，不自动重试。
    pub async fn load(&self) -> Result<CaseProgress> {
        match self.api.get_json::<UserProfile>("/api/user/me").await {
            Ok(profile) => {
                let progress = CaseProgress {
                    current_phase: profile.current_phase,
                    last_watched_video: profile.last_watched_video.clone(),
                };
                *self.state.write().await = Some(progress.clone());
                info!("✅ 案件进度已加载: 当前阶段 {}", progress.current_phase);
                Ok(progress)
            }
            Err(e) => {
                *self.state.write().await = None;
                warn!("❌ 案件进度加载失败: {}", e);
                Err(e)
            }
        }
    }

    /// 清空进度（会话转为未认证时调用）
    pub async fn clear(&self) {
        *self.state.write().await = None;
    }

    /// 当前进度快照
    pub async fn progress(&self) -> Option<CaseProgress> {
        self.state.read().await.clone()
    }

    /// 当前阶段
    pub async fn current_phase(&self) -> Option<u8> {
        self.state.read().await.as_ref().map(|p| p.current_phase)
    }

    /// 当前续看指针
    pub async fn last_watched_video(&self) -> Option<LastWatchedVideo> {
        self.state
            .read()
            .await
            .as_ref()
            .and_then(|p| p.last_watched_video.clone())
    }

    /// 更新当前阶段（OptimisticRollback）
    ///
    /// 本地立即应用，随后远端持久化；远端失败则回滚到旧值并仅记录
    /// 日志。回滚事件是对用户的唯一提示，错误不上抛。
    pub async fn update_current_phase(&self, new_phase: u8) -> Result<()> {
        if !is_valid_phase(new_phase) {
            return Err(CasetrackSDKError::InvalidArgument(format!(
                "阶段号越界: {}",
                new_phase
            )));
        }

        // 1. 乐观应用本地
        let old_phase = {
            let mut state = self.state.write().await;
            match state.as_mut() {
                Some(progress) => {
                    let old = progress.current_phase;
                    progress.current_phase = new_phase;
                    old
                }
                None => {
                    warn!("⚠️ 案件进度未加载，忽略阶段更新");
                    return Ok(());
                }
            }
        };
        self.emit_phase_changed(old_phase, new_phase, false).await;

        // 2. 远端持久化；失败回滚
        match self.persist_phase(new_phase).await {
            Ok(()) => {
                info!("✅ 当前阶段已更新: {} → {}", old_phase, new_phase);
            }
            Err(e) => {
                warn!(
                    "❌ 阶段更新远端持久化失败，回滚到 {}: {}",
                    old_phase, e
                );
                {
                    let mut state = self.state.write().await;
                    if let Some(progress) = state.as_mut() {
                        progress.current_phase = old_phase;
                    }
                }
                self.emit_phase_changed(new_phase, old_phase, true).await;
            }
        }
        Ok(())
    }

    /// 远端持久化当前阶段；PATCH 路由不存在时退回 legacy POST 一次
    async fn persist_phase(&self, phase: u8) -> Result<()> {
        let request = PhaseUpdateRequest { phase };
        match self
            .api
            .patch_json::<_, AckResponse>("/api/user/phase", &request)
            .await
        {
            Ok(ack) => {
                if !ack.success {
                    warn!("⚠️ 服务端未确认阶段更新");
                }
                Ok(())
            }
            Err(CasetrackSDKError::Server { status: 404, .. }) => {
                info!("🔁 PATCH /api/user/phase 不存在，改用 legacy POST /api/user/update-phase");
                let ack: AckResponse = self
                    .api
                    .post_json("/api/user/update-phase", &request)
                    .await?;
                if !ack.success {
                    warn!("⚠️ 服务端未确认阶段更新（legacy）");
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// 更新续看指针（FireAndForget）
    ///
    /// 本地状态立即应用；设备存储无条件持久化（离线可用）；
    /// 远端同步失败仅记录，不回滚本地或设备值。
    pub async fn update_last_watched_video(
        &self,
        phase_number: u8,
        video_id: &str,
    ) -> Result<()> {
        if !is_valid_phase(phase_number) {
            return Err(CasetrackSDKError::InvalidArgument(format!(
                "阶段号越界: {}",
                phase_number
            )));
        }

        let pointer = LastWatchedVideo {
            phase_number,
            video_id: video_id.to_string(),
        };

        // 1. 本地状态立即应用
        {
            let mut state = self.state.write().await;
            if let Some(progress) = state.as_mut() {
                progress.last_watched_video = Some(pointer.clone());
            }
        }

        // 2. 设备存储无条件持久化；同键写经写入队列串行化
        let persisted = self
            .write_queue
            .run(keys::LAST_WATCHED_VIDEO, || async {
                storage::write_json(self.store.as_ref(), keys::LAST_WATCHED_VIDEO, &pointer).await
            })
            .await;
        if let Err(e) = persisted {
            warn!("⚠️ 续看指针本地持久化失败: {}", e);
        }

        self.events
            .emit(SdkEvent::LastWatchedVideoChanged {
                phase_number,
                video_id: video_id.to_string(),
                timestamp: SdkEvent::now_ts(),
            })
            .await;

        // 3. 远端同步：失败仅记录（FireAndForget）
        let request = LastVideoUpdateRequest {
            phase_number,
            video_id,
        };
        match self
            .api
            .patch_json::<_, AckResponse>("/api/user/last-video", &request)
            .await
        {
            Ok(_) => {}
            Err(e) => {
                warn!("⚠️ 续看指针远端同步失败（忽略）: {}", e);
            }
        }

        Ok(())
    }

    async fn emit_phase_changed(&self, old_phase: u8, new_phase: u8, rolled_back: bool) {
        self.events
            .emit(SdkEvent::CurrentPhaseChanged {
                old_phase,
                new_phase,
                rolled_back,
                timestamp: SdkEvent::now_ts(),
            })
            .await;
    }
}
