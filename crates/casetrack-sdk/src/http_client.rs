//! HTTP 客户端模块 - 门户后端 API 访问
//!
//! 使用 reqwest 作为底层 HTTP 客户端。基础 URL 在进程启动时按平台
//! 解析一次；每次请求发出前从注入的 KeyValueStore 读取 bearer token
//! 并附加到 Authorization 头（无 token 时请求照常发出，由服务端以
//! 401 拒绝）。
//!
//! 401 响应仅观察并记录，不会自动登出或清除本地 token（已知设计
//! 缺口：过期 token 只会在下一次失败的 API 调用中暴露）。

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{CasetrackSDKError, Result};
use crate::storage::{keys, KeyValueStore};

/// 各平台的默认 API 基础 URL（进程启动时查表解析一次，运行期不可改）
pub const WEB_API_BASE_URL: &str = "http://localhost:3000";
pub const MOBILE_API_BASE_URL: &str = "http://192.168.2.50:3000";

/// 默认请求超时（秒）；超时中止并以通用失败形式上抛
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// 服务端错误响应体 `{ "error": "..." }`
#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    error: String,
}

/// 门户 API 客户端
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn KeyValueStore>,
}

impl ApiClient {
    /// 创建新的 API 客户端
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| CasetrackSDKError::Other(format!("创建 HTTP 客户端失败: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!("✅ API 客户端已创建 (base_url: {})", base_url);

        Ok(Self {
            client,
            base_url,
            store,
        })
    }

    /// 当前基础 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 发出 GET 请求并解析 JSON 响应
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.client.get(self.url(path))).await
    }

    /// 发出 POST 请求并解析 JSON 响应
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    /// 发出 PATCH 请求并解析 JSON 响应
    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.client.patch(self.url(path)).json(body))
            .await
    }

    /// 发出请求：附加 bearer token → 分类错误 → 解析 JSON
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        // 1. 每次派发前即时读取持久化 token；读失败不阻断请求
        let builder = match self.bearer_token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        // 2. 发送；网络层错误（无响应/超时）与服务端拒绝分开分类
        let response = builder.send().await.map_err(CasetrackSDKError::from)?;

        // 3. 观察 401（仅记录，不登出、不清 token）
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("⚠️ 认证失败（401），token 缺失或已失效");
        }

        // 4. 非 2xx → 提取服务端错误消息
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            let message = serde_json::from_str::<ErrorBody>(&error_text)
                .map(|body| body.error)
                .unwrap_or(error_text);
            error!("❌ 请求失败，HTTP 状态码: {}, 错误: {}", status, message);
            return Err(CasetrackSDKError::Server {
                status: status.as_u16(),
                message,
            });
        }

        // 5. 解析响应
        let result = response
            .json::<T>()
            .await
            .map_err(|e| CasetrackSDKError::Serialization(format!("解析响应失败: {}", e)))?;

        Ok(result)
    }

    /// 读取持久化的 bearer token；缺失不是错误
    async fn bearer_token(&self) -> Option<String> {
        match self.store.get(keys::AUTH_TOKEN).await {
            Ok(token) => token,
            Err(e) => {
                error!("读取 auth token 失败: {}", e);
                None
            }
        }
    }
}
