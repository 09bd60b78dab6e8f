use std::fmt;

#[derive(Debug)]
pub enum CasetrackSDKError {
    KvStore(String),
    Serialization(String),
    IO(String),
    InvalidArgument(String),
    NotFound(String),
    NotAuthenticated,
    Transport(String),  // 网络层错误（无响应、连接失败）
    Timeout(String),    // 客户端侧超时
    Auth(String),       // 认证错误（凭据无效等）
    Config(String),     // 配置错误
    // 服务端返回的错误（4xx/5xx，带响应体）
    Server {
        status: u16,
        message: String,
    },
    Other(String),
}

impl fmt::Display for CasetrackSDKError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CasetrackSDKError::KvStore(e) => write!(f, "KV store error: {}", e),
            CasetrackSDKError::Serialization(e) => write!(f, "Serialization error: {}", e),
            CasetrackSDKError::IO(e) => write!(f, "IO error: {}", e),
            CasetrackSDKError::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
            CasetrackSDKError::NotFound(e) => write!(f, "Not found: {}", e),
            CasetrackSDKError::NotAuthenticated => write!(f, "Not authenticated"),
            CasetrackSDKError::Transport(e) => write!(f, "Transport error: {}", e),
            CasetrackSDKError::Timeout(e) => write!(f, "Timeout: {}", e),
            CasetrackSDKError::Auth(e) => write!(f, "Authentication error: {}", e),
            CasetrackSDKError::Config(e) => write!(f, "Config error: {}", e),
            CasetrackSDKError::Server { status, message } => {
                write!(f, "Server error [{}]: {}", status, message)
            }
            CasetrackSDKError::Other(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl std::error::Error for CasetrackSDKError {}

impl From<serde_json::Error> for CasetrackSDKError {
    fn from(error: serde_json::Error) -> Self {
        CasetrackSDKError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for CasetrackSDKError {
    fn from(error: std::io::Error) -> Self {
        CasetrackSDKError::IO(error.to_string())
    }
}

impl From<reqwest::Error> for CasetrackSDKError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            CasetrackSDKError::Timeout(error.to_string())
        } else if error.is_decode() {
            CasetrackSDKError::Serialization(error.to_string())
        } else {
            CasetrackSDKError::Transport(error.to_string())
        }
    }
}

impl CasetrackSDKError {
    /// 是否为网络层失败（无响应 / 客户端超时）
    ///
    /// 登录流程据此判断：网络层失败 → 回退演示账号表；
    /// 服务端明确拒绝（`Server`）→ 原样上抛，不回退。
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            CasetrackSDKError::Transport(_) | CasetrackSDKError::Timeout(_)
        )
    }

    /// 获取服务端错误状态码（如果这是一个服务端错误）
    pub fn server_status(&self) -> Option<u16> {
        match self {
            CasetrackSDKError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CasetrackSDKError>;
