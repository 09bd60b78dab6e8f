//! 按键写入队列
//!
//! 同一存储键上的并发异步写（快速连续勾选同一阶段的视频）没有互斥
//! 保障时是后完成者覆盖先完成者。本模块给每个键挂一把异步锁，
//! 将"读-改-写"整体串行化；不同键之间互不阻塞。
//!
//! 仅覆盖本进程内的竞争；跨设备的版本化写入不在此层。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

/// 按键串行化执行器
#[derive(Default)]
pub struct KeyWriteQueue {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyWriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// 在 `key` 的串行区内执行 `op`
    ///
    /// 同键调用按到达顺序排队执行；`op` 内通常是一次完整的
    /// 读-改-写序列。
    pub async fn run<F, Fut, T>(&self, key: &str, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = self.lock_for(key);
        let _guard = cell.lock().await;
        op().await
    }
}
