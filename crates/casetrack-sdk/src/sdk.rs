//! 统一 SDK 接口 - CasetrackSDK 主入口
//!
//! 分层架构设计：
//! ```text
//! CasetrackSDK (门面/编排层)
//!   ├── AuthManager (认证会话层)
//!   ├── ProgressManager (案件进度层)
//!   ├── PhaseWatchedSet (阶段观看集合层，按屏幕挂载)
//!   ├── ApiClient (HTTP 访问层)
//!   ├── KeyValueStore (本地持久化层，按平台注入)
//!   └── EventManager (事件系统层)
//! ```
//!
//! 设计原则：
//! - 异步优先：主要 API 使用 async/await
//! - 依赖注入：平台差异（存储后端、视频呈现器、基础 URL）在启动时
//!   解析一次，不在业务代码里做运行时平台分支
//! - 事件驱动：状态变更统一经 EventManager 广播

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{default_demo_accounts, AuthManager, DemoAccount};
use crate::catalog::PhaseCatalog;
use crate::error::Result;
use crate::events::{EventManager, SdkEvent};
use crate::http_client::{
    ApiClient, DEFAULT_REQUEST_TIMEOUT_SECS, MOBILE_API_BASE_URL, WEB_API_BASE_URL,
};
use crate::i18n::{default_tables, Language, Localizer, TranslationTable};
use crate::progress::ProgressManager;
use crate::session_state::{Identity, SessionStateManager, SessionStatus};
use crate::storage::{KeyValueStore, KeyWriteQueue, MemoryKvStore, SledKvStore};
use crate::version::SDK_VERSION;
use crate::video::{renderer_for, VideoRenderer};
use crate::watched::PhaseWatchedSet;

/// 构建目标平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// 浏览器（Web 外壳）
    Web,
    /// 移动端（iOS / Android 外壳）
    Mobile,
}

impl Platform {
    /// 平台对应的默认 API 基础 URL（启动时查表一次）
    pub fn default_api_base_url(&self) -> &'static str {
        match self {
            Platform::Web => WEB_API_BASE_URL,
            Platform::Mobile => MOBILE_API_BASE_URL,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Web => write!(f, "web"),
            Platform::Mobile => write!(f, "mobile"),
        }
    }
}

/// Casetrack SDK 配置
#[derive(Debug, Clone)]
pub struct CasetrackConfig {
    /// 构建目标平台（决定存储后端、视频呈现器与默认基础 URL）
    pub platform: Platform,
    /// 数据存储目录（仅移动端 sled 存储使用）
    pub data_dir: PathBuf,
    /// API 基础 URL；None 时按平台表解析
    pub api_base_url: Option<String>,
    /// 请求超时时间（秒）
    pub request_timeout_secs: u64,
    /// 事件缓冲区大小
    pub event_buffer_size: usize,
    /// 初始界面语言
    pub language: Language,
    /// 演示账号表（注入的不可变配置）
    pub demo_accounts: Vec<DemoAccount>,
    /// 阶段目录（注入的不可变配置）
    pub catalog: PhaseCatalog,
    /// 翻译表（注入的不可变配置）
    pub translations: TranslationTable,
    /// 调试模式
    pub debug_mode: bool,
}

impl Default for CasetrackConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Mobile,
            data_dir: get_default_data_dir(),
            api_base_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            event_buffer_size: 100,
            language: Language::En,
            demo_accounts: default_demo_accounts(),
            catalog: PhaseCatalog::default(),
            translations: default_tables(),
            debug_mode: false,
        }
    }
}

impl CasetrackConfig {
    pub fn builder() -> CasetrackConfigBuilder {
        CasetrackConfigBuilder::new()
    }
}

/// 获取默认数据目录 ~/.casetrack/
fn get_default_data_dir() -> PathBuf {
    if let Some(home_dir) = std::env::var("HOME").ok().map(PathBuf::from) {
        home_dir.join(".casetrack")
    } else if let Some(home_dir) = std::env::var("USERPROFILE").ok().map(PathBuf::from) {
        // Windows 支持
        home_dir.join(".casetrack")
    } else {
        // 无法获取用户主目录时回退到当前目录
        PathBuf::from("./casetrack_data")
    }
}

/// Casetrack SDK 配置构建器
pub struct CasetrackConfigBuilder {
    config: CasetrackConfig,
}

impl CasetrackConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CasetrackConfig::default(),
        }
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.platform = platform;
        self
    }

    pub fn data_dir<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// 覆盖平台表的基础 URL（测试/预发环境用）
    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_base_url = Some(url.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn demo_accounts(mut self, accounts: Vec<DemoAccount>) -> Self {
        self.config.demo_accounts = accounts;
        self
    }

    pub fn catalog(mut self, catalog: PhaseCatalog) -> Self {
        self.config.catalog = catalog;
        self
    }

    pub fn translations(mut self, tables: TranslationTable) -> Self {
        self.config.translations = tables;
        self
    }

    pub fn debug_mode(mut self, debug: bool) -> Self {
        self.config.debug_mode = debug;
        self
    }

    pub fn build(self) -> CasetrackConfig {
        self.config
    }
}

impl Default for CasetrackConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Casetrack SDK 主入口
pub struct CasetrackSDK {
    platform: Platform,
    store: Arc<dyn KeyValueStore>,
    api: Arc<ApiClient>,
    write_queue: Arc<KeyWriteQueue>,
    events: Arc<EventManager>,
    auth: Arc<AuthManager>,
    progress: Arc<ProgressManager>,
    localizer: Arc<Localizer>,
    renderer: Arc<dyn VideoRenderer>,
    catalog: Arc<PhaseCatalog>,
}

impl CasetrackSDK {
    /// 初始化 SDK（按平台选定存储后端）
    ///
    /// 移动端使用 `data_dir` 下的 sled 存储；Web 端的真实持久化由
    /// 宿主桥接注入（参见 [`CasetrackSDK::initialize_with_store`]），
    /// 此处退化为进程内存储。
    pub async fn initialize(config: CasetrackConfig) -> Result<Arc<Self>> {
        let store: Arc<dyn KeyValueStore> = match config.platform {
            Platform::Mobile => Arc::new(SledKvStore::open(&config.data_dir).await?),
            Platform::Web => Arc::new(MemoryKvStore::new()),
        };
        Self::initialize_with_store(config, store).await
    }

    /// 以注入的存储实现初始化 SDK
    ///
    /// 初始化流程：
    /// 1. 解析基础 URL（配置覆盖 > 平台表）并创建 API 客户端
    /// 2. 组装事件系统与各管理器
    /// 3. 会话引导；已认证则加载案件进度（失败保持为空，不重试）
    pub async fn initialize_with_store(
        config: CasetrackConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Arc<Self>> {
        info!(
            "🚀 初始化 Casetrack SDK v{} (平台: {})",
            SDK_VERSION, config.platform
        );

        let base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| config.platform.default_api_base_url().to_string());
        let api = Arc::new(ApiClient::new(
            base_url,
            Duration::from_secs(config.request_timeout_secs),
            store.clone(),
        )?);

        let events = Arc::new(EventManager::new(config.event_buffer_size));
        let write_queue = Arc::new(KeyWriteQueue::new());
        let session = SessionStateManager::new(config.platform.to_string());
        let auth = Arc::new(AuthManager::new(
            store.clone(),
            api.clone(),
            session,
            config.demo_accounts.clone(),
            events.clone(),
        ));
        let progress = Arc::new(ProgressManager::new(
            api.clone(),
            store.clone(),
            write_queue.clone(),
            events.clone(),
        ));
        let localizer = Arc::new(Localizer::new(config.translations.clone(), config.language));
        let renderer = renderer_for(config.platform);
        let catalog = Arc::new(config.catalog.clone());

        let sdk = Arc::new(Self {
            platform: config.platform,
            store,
            api,
            write_queue,
            events,
            auth,
            progress,
            localizer,
            renderer,
            catalog,
        });

        // 会话引导 → 已认证则加载案件进度
        let status = sdk.auth.bootstrap().await;
        if status == SessionStatus::Authenticated {
            if let Err(e) = sdk.progress.load().await {
                warn!("⚠️ 启动时加载案件进度失败（保持为空）: {}", e);
            }
        }

        Ok(sdk)
    }

    /// 登录；成功后立即加载案件进度
    ///
    /// 演示账号登录没有 token，进度加载会被服务端拒绝；进度保持
    /// 为空，会话本身仍然有效。
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = self.auth.login(email, password).await?;
        if let Err(e) = self.progress.load().await {
            warn!("⚠️ 登录后加载案件进度失败（保持为空）: {}", e);
        }
        Ok(identity)
    }

    /// 登出：清除本地会话数据并清空进度
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.progress.clear().await;
    }

    /// 挂载某阶段的已观看集合（构造并加载）
    pub async fn watched_set(&self, phase_number: u8) -> Result<PhaseWatchedSet> {
        let tracker = PhaseWatchedSet::new(
            phase_number,
            self.store.clone(),
            self.api.clone(),
            self.write_queue.clone(),
            self.events.clone(),
            self.progress.clone(),
            self.catalog.clone(),
        )?;
        tracker.load().await;
        Ok(tracker)
    }

    /// 切换界面语言
    pub async fn set_language(&self, language: Language) {
        let old = self.localizer.set_language(language);
        if old != language {
            self.events
                .emit(SdkEvent::LanguageChanged {
                    language,
                    timestamp: SdkEvent::now_ts(),
                })
                .await;
        }
    }

    /// 查询译文（便捷方法）
    pub fn t(&self, key: &str) -> String {
        self.localizer.t(key)
    }

    /// 构建目标平台
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// 认证会话管理器
    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// 案件进度管理器
    pub fn progress(&self) -> &ProgressManager {
        &self.progress
    }

    /// 事件管理器
    pub fn events(&self) -> &EventManager {
        &self.events
    }

    /// 本地存储
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// 本地化器
    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    /// 视频呈现器
    pub fn renderer(&self) -> &Arc<dyn VideoRenderer> {
        &self.renderer
    }

    /// 阶段目录
    pub fn catalog(&self) -> &PhaseCatalog {
        &self.catalog
    }

    /// SDK 版本
    pub fn version() -> &'static str {
        SDK_VERSION
    }

    /// 关闭 SDK：清理监听器并把存储落盘
    pub async fn shutdown(&self) -> Result<()> {
        self.events.clear_listeners().await;
        self.store.flush().await?;
        info!("✅ Casetrack SDK 已关闭");
        Ok(())
    }
}
