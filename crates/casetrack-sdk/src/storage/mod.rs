//! 存储模块 - 门户 SDK 的本地持久化层
//!
//! 采用能力接口 + 依赖注入的设计：
//! - KeyValueStore: 字符串键值存储的能力 trait，按构建目标注入实现
//! - SledKvStore: 设备端实现（sled）
//! - MemoryKvStore: 内存实现（Web 宿主注入 / 测试）
//! - KeyWriteQueue: 按键串行化写入，消除同键并发写的丢失更新
//!
//! 所有持久化状态都是字符串键 + JSON 值；键名见 [`keys`]。

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub mod kv;
pub mod memory;
pub mod write_queue;

pub use kv::SledKvStore;
pub use memory::MemoryKvStore;
pub use write_queue::KeyWriteQueue;

/// 键值存储能力接口
///
/// 运行时平台分支（浏览器 localStorage / 移动端 AsyncStorage）收敛为
/// 此 trait 的注入实现，启动时选定一次，之后不可切换。
///
/// 契约：`get` 对缺失键静默返回 `None`；实现内部的平台错误以 `Err`
/// 形式交给调用方，调用方统一 catch-log-continue，不向上层崩溃。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取键对应的值；键不存在时返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入键值对（覆盖旧值）
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// 删除键（键不存在时也返回成功）
    async fn remove(&self, key: &str) -> Result<()>;

    /// 将缓冲数据落盘（无缓冲的实现可不覆写）
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// 读取并反序列化 JSON 值
///
/// 错误处理口径（统一）：读失败或 JSON 损坏 → 记日志并按"空/缺失"处理，
/// 绝不向调用方抛错。
pub async fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key).await {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!("⚠️ 读取本地键失败: {} ({})", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("⚠️ 本地键 {} 的 JSON 已损坏，按空值处理: {}", key, e);
            None
        }
    }
}

/// 序列化并写入 JSON 值
pub async fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await
}

/// 门户使用的存储键
///
/// 与后端/旧客户端共享同一命名，不可改动。
pub mod keys {
    /// 已认证用户（Identity 的 JSON）
    pub const AUTH_USER: &str = "authUser";
    /// Bearer token
    pub const AUTH_TOKEN: &str = "authToken";
    /// 续看指针（LastWatchedVideo 的 JSON）
    pub const LAST_WATCHED_VIDEO: &str = "lastWatchedVideo";

    /// 按阶段划分的已观看视频集合键（视频 ID 字符串数组）
    pub fn phase_watched(phase_number: u8) -> String {
        format!("phase_{}_watched", phase_number)
    }
}
