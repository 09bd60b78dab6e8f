//! 认证会话管理
//!
//! 持有已认证身份的生命周期：
//! - 引导（bootstrap）：从持久化的身份 + token 恢复会话，信任读取
//!   （trust-on-read），不回源校验；失效 token 在下一次失败的 API
//!   调用中才会暴露
//! - 登录：远端优先；仅在网络层失败时回退到注入的演示账号表；
//!   服务端明确拒绝则原样上抛、不回退
//! - 登出：清除持久化身份、token、续看指针与全部 15 个阶段的
//!   已观看集合键；不通知服务端作废 token

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::catalog::{PHASE_MAX, PHASE_MIN};
use crate::error::{CasetrackSDKError, Result};
use crate::events::{EventManager, SdkEvent};
use crate::http_client::ApiClient;
use crate::progress::UserProfile;
use crate::session_state::{Identity, SessionStateManager, SessionStatus, UserRole};
use crate::storage::{self, keys, KeyValueStore};

/// 演示账号（凭据 + 对应身份）
///
/// 作为不可变配置注入 [`AuthManager`]；仅在登录请求网络失败时参与
/// 匹配，匹配要求邮箱与密码都精确相等。
#[derive(Debug, Clone)]
pub struct DemoAccount {
    pub email: String,
    pub password: String,
    pub identity: Identity,
}

/// 门户内置的演示账号表
pub fn default_demo_accounts() -> Vec<DemoAccount> {
    vec![
        DemoAccount {
            email: "client@demo.com".to_string(),
            password: "client123".to_string(),
            identity: Identity {
                id: "1".to_string(),
                email: "client@demo.com".to_string(),
                name: "John Doe".to_string(),
                role: UserRole::Client,
                case_number: Some("CASE-2024-001".to_string()),
            },
        },
        DemoAccount {
            email: "admin@demo.com".to_string(),
            password: "admin123".to_string(),
            identity: Identity {
                id: "2".to_string(),
                email: "admin@demo.com".to_string(),
                name: "Admin User".to_string(),
                role: UserRole::Admin,
                case_number: None,
            },
        },
    ]
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// `POST /api/auth/login` 的成功响应
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// 认证会话管理器
pub struct AuthManager {
    store: Arc<dyn KeyValueStore>,
    api: Arc<ApiClient>,
    session: SessionStateManager,
    demo_accounts: Arc<Vec<DemoAccount>>,
    events: Arc<EventManager>,
}

impl AuthManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        api: Arc<ApiClient>,
        session: SessionStateManager,
        demo_accounts: Vec<DemoAccount>,
        events: Arc<EventManager>,
    ) -> Self {
        Self {
            store,
            api,
            session,
            demo_accounts: Arc::new(demo_accounts),
            events,
        }
    }

    /// 会话状态管理器
    pub fn session(&self) -> &SessionStateManager {
        &self.session
    }

    /// 是否已认证
    pub async fn is_authenticated(&self) -> bool {
        self.session.is_authenticated().await
    }

    /// 进程启动时的会话引导
    ///
    /// 身份与 token 二者齐备 → `Authenticated`（不回源校验）；
    /// 任一缺失 → `Unauthenticated`。损坏的身份 JSON 视同缺失并清除。
    pub async fn bootstrap(&self) -> SessionStatus {
        // 1. 读取持久化身份与 token（读失败按缺失处理）
        let raw_identity = match self.store.get(keys::AUTH_USER).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("⚠️ 读取持久化身份失败: {}", e);
                None
            }
        };
        let token = match self.store.get(keys::AUTH_TOKEN).await {
            Ok(token) => token,
            Err(e) => {
                warn!("⚠️ 读取持久化 token 失败: {}", e);
                None
            }
        };

        // 2. 解析身份；损坏即清除，避免下次启动重复踩同一条坏数据
        let identity = match raw_identity {
            Some(raw) => match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!("⚠️ 持久化身份 JSON 已损坏，清除: {}", e);
                    if let Err(e) = self.store.remove(keys::AUTH_USER).await {
                        warn!("⚠️ 清除损坏身份失败: {}", e);
                    }
                    None
                }
            },
            None => None,
        };

        // 3. 迁移状态机
        match (identity, token) {
            (Some(identity), Some(_token)) => {
                self.session.set_authenticated(identity).await;
            }
            _ => {
                self.session.set_unauthenticated().await;
            }
        }

        let status = self.session.status().await;
        self.emit_session_changed(status).await;
        info!("🔄 会话引导完成: {}", status);
        status
    }

    /// 登录
    ///
    /// 远端优先；失败按网络层/服务端拒绝分类处理（见模块说明）。
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let request = LoginRequest { email, password };
        match self
            .api
            .post_json::<_, LoginResponse>("/api/auth/login", &request)
            .await
        {
            Ok(response) => {
                // 持久化 token 与规范化身份；持久化失败仅记录，
                // 本进程内的会话照常建立
                if let Err(e) = self.store.set(keys::AUTH_TOKEN, &response.token).await {
                    error!("持久化 token 失败: {}", e);
                }
                let identity = response.user.identity();
                if let Err(e) =
                    storage::write_json(self.store.as_ref(), keys::AUTH_USER, &identity).await
                {
                    error!("持久化身份失败: {}", e);
                }

                self.session.set_authenticated(identity.clone()).await;
                self.emit_session_changed(SessionStatus::Authenticated).await;
                info!("✅ 登录成功: {}", identity.email);
                Ok(identity)
            }
            Err(e) if e.is_network_failure() => {
                // 网络不可达：回退演示账号表
                warn!("⚠️ 登录请求网络失败，尝试演示账号回退: {}", e);
                let matched = self
                    .demo_accounts
                    .iter()
                    .find(|account| account.email == email && account.password == password);

                match matched {
                    Some(account) => {
                        let identity = account.identity.clone();
                        // 演示登录没有 token，只持久化身份
                        if let Err(e) =
                            storage::write_json(self.store.as_ref(), keys::AUTH_USER, &identity)
                                .await
                        {
                            error!("持久化演示身份失败: {}", e);
                        }
                        self.session.set_authenticated(identity.clone()).await;
                        self.emit_session_changed(SessionStatus::Authenticated).await;
                        info!("✅ 演示账号登录: {}", identity.email);
                        Ok(identity)
                    }
                    None => Err(CasetrackSDKError::Auth(
                        "Invalid email or password".to_string(),
                    )),
                }
            }
            Err(e) => {
                // 服务端明确拒绝：原样上抛，不回退演示账号
                warn!("❌ 登录被服务端拒绝: {}", e);
                Err(e)
            }
        }
    }

    /// 登出
    ///
    /// 无论各键此前是否存在，都执行完整清除；单个键清除失败仅记录，
    /// 继续清除其余键。不回源作废 token。
    pub async fn logout(&self) {
        info!("🔚 登出，清除本地会话数据");

        let mut keys_to_remove = vec![
            keys::AUTH_USER.to_string(),
            keys::AUTH_TOKEN.to_string(),
            keys::LAST_WATCHED_VIDEO.to_string(),
        ];
        for phase in PHASE_MIN..=PHASE_MAX {
            keys_to_remove.push(keys::phase_watched(phase));
        }

        for key in keys_to_remove {
            if let Err(e) = self.store.remove(&key).await {
                warn!("⚠️ 清除键 {} 失败: {}", key, e);
            }
        }

        self.session.set_unauthenticated().await;
        self.emit_session_changed(SessionStatus::Unauthenticated).await;
    }

    async fn emit_session_changed(&self, status: SessionStatus) {
        self.events
            .emit(SdkEvent::SessionChanged {
                status,
                timestamp: SdkEvent::now_ts(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use crate::test_stub;
    use std::time::Duration;

    fn manager_with(base_url: &str, store: Arc<MemoryKvStore>) -> AuthManager {
        let api = Arc::new(
            ApiClient::new(base_url, Duration::from_secs(2), store.clone()).unwrap(),
        );
        AuthManager::new(
            store,
            api,
            SessionStateManager::new("test".to_string()),
            default_demo_accounts(),
            Arc::new(EventManager::new(16)),
        )
    }

    #[tokio::test]
    async fn test_demo_fallback_when_remote_unreachable() {
        let base_url = test_stub::refused_base_url().await;
        let store = Arc::new(MemoryKvStore::new());
        let auth = manager_with(&base_url, store.clone());

        let identity = auth.login("client@demo.com", "client123").await.unwrap();
        assert_eq!(identity.role, UserRole::Client);
        assert_eq!(identity.case_number.as_deref(), Some("CASE-2024-001"));
        assert!(auth.is_authenticated().await);

        // 身份已持久化，但演示登录没有 token
        assert!(store.get(keys::AUTH_USER).await.unwrap().is_some());
        assert!(store.get(keys::AUTH_TOKEN).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_demo_fallback_rejects_wrong_credentials() {
        let base_url = test_stub::refused_base_url().await;
        let store = Arc::new(MemoryKvStore::new());
        let auth = manager_with(&base_url, store);

        auth.bootstrap().await;
        let result = auth.login("client@demo.com", "wrong-password").await;
        match result {
            Err(CasetrackSDKError::Auth(message)) => {
                assert_eq!(message, "Invalid email or password");
            }
            other => panic!("期望 Auth 错误，实际: {:?}", other),
        }
        assert_eq!(
            auth.session().status().await,
            SessionStatus::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_server_rejection_does_not_fall_back_to_demo() {
        // 服务端明确返回 401：即便凭据恰好匹配演示账号也不回退
        let stub = test_stub::spawn(401, "{\"error\":\"Invalid credentials\"}").await;
        let store = Arc::new(MemoryKvStore::new());
        let auth = manager_with(&stub.base_url, store);

        let result = auth.login("client@demo.com", "client123").await;
        match result {
            Err(CasetrackSDKError::Server { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("期望 Server 错误，实际: {:?}", other),
        }
        assert!(!auth.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_remote_login_persists_token_and_identity() {
        let body = r#"{
            "token": "jwt-123",
            "user": {
                "id": "42",
                "email": "maria@example.com",
                "name": "Maria Lopez",
                "role": "client",
                "caseNumber": "CASE-2024-017",
                "currentPhase": 5,
                "language": "es",
                "lastWatchedVideo": {"phaseNumber": 4, "videoId": "phase4_video_2"}
            }
        }"#;
        let stub = test_stub::spawn(200, body).await;
        let store = Arc::new(MemoryKvStore::new());
        let auth = manager_with(&stub.base_url, store.clone());

        let identity = auth.login("maria@example.com", "secret").await.unwrap();
        assert_eq!(identity.name, "Maria Lopez");
        assert_eq!(identity.case_number.as_deref(), Some("CASE-2024-017"));

        assert_eq!(
            store.get(keys::AUTH_TOKEN).await.unwrap().as_deref(),
            Some("jwt-123")
        );
        let persisted: Identity =
            serde_json::from_str(&store.get(keys::AUTH_USER).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted, identity);
    }

    #[tokio::test]
    async fn test_bootstrap_trusts_persisted_session() {
        let base_url = test_stub::refused_base_url().await;
        let store = Arc::new(MemoryKvStore::new());
        store
            .set(
                keys::AUTH_USER,
                r#"{"id":"1","email":"client@demo.com","name":"John Doe","role":"client","caseNumber":"CASE-2024-001"}"#,
            )
            .await
            .unwrap();
        store.set(keys::AUTH_TOKEN, "stale-but-trusted").await.unwrap();

        // 远端完全不可达也能恢复会话（trust-on-read）
        let auth = manager_with(&base_url, store);
        assert_eq!(auth.bootstrap().await, SessionStatus::Authenticated);
        assert_eq!(
            auth.session().identity().await.unwrap().name,
            "John Doe"
        );
    }

    #[tokio::test]
    async fn test_bootstrap_requires_both_identity_and_token() {
        let base_url = test_stub::refused_base_url().await;
        let store = Arc::new(MemoryKvStore::new());
        store
            .set(
                keys::AUTH_USER,
                r#"{"id":"1","email":"client@demo.com","name":"John Doe","role":"client"}"#,
            )
            .await
            .unwrap();
        // 没有 token → 未认证
        let auth = manager_with(&base_url, store);
        assert_eq!(auth.bootstrap().await, SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_bootstrap_clears_corrupt_identity() {
        let base_url = test_stub::refused_base_url().await;
        let store = Arc::new(MemoryKvStore::new());
        store.set(keys::AUTH_USER, "{corrupt json").await.unwrap();
        store.set(keys::AUTH_TOKEN, "token").await.unwrap();

        let auth = manager_with(&base_url, store.clone());
        assert_eq!(auth.bootstrap().await, SessionStatus::Unauthenticated);
        // 损坏的身份键已被清除
        assert!(store.get(keys::AUTH_USER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_sweeps_all_portal_keys() {
        let base_url = test_stub::refused_base_url().await;
        let store = Arc::new(MemoryKvStore::new());

        // 预置所有门户键
        store.set(keys::AUTH_USER, "{}").await.unwrap();
        store.set(keys::AUTH_TOKEN, "token").await.unwrap();
        store.set(keys::LAST_WATCHED_VIDEO, "{}").await.unwrap();
        for phase in PHASE_MIN..=PHASE_MAX {
            store
                .set(&keys::phase_watched(phase), "[\"v\"]")
                .await
                .unwrap();
        }

        let auth = manager_with(&base_url, store.clone());
        auth.logout().await;

        assert!(store.get(keys::AUTH_USER).await.unwrap().is_none());
        assert!(store.get(keys::AUTH_TOKEN).await.unwrap().is_none());
        assert!(store.get(keys::LAST_WATCHED_VIDEO).await.unwrap().is_none());
        for phase in PHASE_MIN..=PHASE_MAX {
            assert!(
                store
                    .get(&keys::phase_watched(phase))
                    .await
                    .unwrap()
                    .is_none(),
                "phase_{}_watched 未被清除",
                phase
            );
        }
        assert_eq!(
            auth.session().status().await,
            SessionStatus::Unauthenticated
        );
    }
}
