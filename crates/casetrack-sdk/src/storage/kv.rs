//! 设备端 KV 存储 - 基于 sled 的键值存储
//!
//! 移动/桌面构建目标的 [`KeyValueStore`] 实现。值以 UTF-8 字符串存储，
//! 与 Web 端 localStorage 的字符串语义保持一致。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sled::Db;

use crate::error::{CasetrackSDKError, Result};
use crate::storage::KeyValueStore;

/// sled 键值存储
#[derive(Debug, Clone)]
pub struct SledKvStore {
    db: Arc<Db>,
}

impl SledKvStore {
    /// 打开（或创建）位于 `base_path/kv` 的存储
    pub async fn open(base_path: &Path) -> Result<Self> {
        let kv_path = base_path.join("kv");

        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| CasetrackSDKError::IO(format!("创建 KV 存储目录失败: {}", e)))?;

        // 打开 sled 数据库（上一实例可能刚释放文件锁，重试多次带退避）
        const MAX_OPEN_RETRIES: u32 = 8;
        const RETRY_DELAY_MS: u64 = 300;
        let mut db_opt: Option<Db> = None;
        let mut last_err: Option<sled::Error> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = format!("{}", e);
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            CasetrackSDKError::KvStore(
                last_err
                    .map(|e| format!("打开 sled 数据库失败: {}", e))
                    .unwrap_or_else(|| "打开 sled 数据库失败".to_string()),
            )
        })?;

        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl KeyValueStore for SledKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .db
            .get(key)
            .map_err(|e| CasetrackSDKError::KvStore(format!("读取键值对失败: {}", e)))?;

        match result {
            Some(bytes) => {
                let value = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    CasetrackSDKError::Serialization(format!("存储值不是合法 UTF-8: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key, value.as_bytes())
            .map_err(|e| CasetrackSDKError::KvStore(format!("写入键值对失败: {}", e)))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key)
            .map_err(|e| CasetrackSDKError::KvStore(format!("删除键值对失败: {}", e)))?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| CasetrackSDKError::KvStore(format!("落盘失败: {}", e)))?;
        Ok(())
    }
}
