//! 会话状态管理
//!
//! 提供认证身份生命周期的完整状态信息，包括：
//! - 会话状态机（未知 / 未认证 / 已认证）
//! - 已认证身份记录
//! - 认证时间与平台信息

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// 会话状态
///
/// `Unknown` 仅出现在启动引导完成之前；引导之后只会在
/// `Unauthenticated` 与 `Authenticated` 之间迁移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// 未知（启动引导进行中）
    Unknown,
    /// 未认证
    Unauthenticated,
    /// 已认证
    Authenticated,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Unknown => write!(f, "未知"),
            SessionStatus::Unauthenticated => write!(f, "未认证"),
            SessionStatus::Authenticated => write!(f, "已认证"),
        }
    }
}

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// 委托人（客户端）
    Client,
    /// 管理员
    Admin,
}

/// 已认证身份
///
/// 登录时创建；以 JSON 形式持久化在 `authUser` 键下（bearer token
/// 单独存 `authToken`）；登出时二者一并删除。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// 用户ID
    pub id: String,
    /// 邮箱
    pub email: String,
    /// 姓名
    pub name: String,
    /// 角色
    pub role: UserRole,
    /// 案件编号（仅委托人有）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
}

/// 会话状态（完整信息）
#[derive(Debug, Clone)]
pub struct SessionState {
    /// 会话状态
    pub status: SessionStatus,
    /// 已认证身份
    pub identity: Option<Identity>,
    /// 认证时间（UTC毫秒时间戳）
    pub auth_time: Option<i64>,
    /// SDK版本
    pub sdk_version: String,
    /// 客户端平台信息
    pub platform: String,
}

impl SessionState {
    /// 创建新的会话状态（引导前）
    pub fn new(platform: String) -> Self {
        Self {
            status: SessionStatus::Unknown,
            identity: None,
            auth_time: None,
            sdk_version: crate::version::SDK_VERSION.to_string(),
            platform,
        }
    }

    /// 生成状态摘要（用于日志打印）
    pub fn summary(&self) -> String {
        let identity_info = self
            .identity
            .as_ref()
            .map(|i| format!("用户: {} ({})", i.name, i.email))
            .unwrap_or_else(|| "无身份".to_string());

        format!(
            "【会话状态】状态: {} | {} | SDK版本: {} | 平台: {}",
            self.status, identity_info, self.sdk_version, self.platform
        )
    }
}

/// 会话状态管理器（线程安全）
#[derive(Debug, Clone)]
pub struct SessionStateManager {
    state: Arc<RwLock<SessionState>>,
}

impl SessionStateManager {
    /// 创建新的状态管理器
    pub fn new(platform: String) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::new(platform))),
        }
    }

    /// 标记为已认证
    pub async fn set_authenticated(&self, identity: Identity) {
        let mut state = self.state.write().await;
        state.identity = Some(identity);
        state.auth_time = Some(Utc::now().timestamp_millis());
        state.status = SessionStatus::Authenticated;
    }

    /// 标记为未认证（清空身份）
    pub async fn set_unauthenticated(&self) {
        let mut state = self.state.write().await;
        state.identity = None;
        state.auth_time = None;
        state.status = SessionStatus::Unauthenticated;
    }

    /// 获取当前状态
    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status
    }

    /// 是否已认证
    pub async fn is_authenticated(&self) -> bool {
        self.status().await == SessionStatus::Authenticated
    }

    /// 获取当前身份快照
    pub async fn identity(&self) -> Option<Identity> {
        self.state.read().await.identity.clone()
    }

    /// 获取完整状态快照
    pub async fn get_state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// 打印状态到日志
    pub async fn log_state(&self) {
        let state = self.state.read().await;
        tracing::info!("{}", state.summary());
    }
}
