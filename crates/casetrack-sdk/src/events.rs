//! 事件系统模块 - 处理门户 SDK 中的各种事件
//!
//! 功能包括：
//! - 会话状态变更事件
//! - 案件阶段变更（含回滚）事件
//! - 续看指针变更事件
//! - 阶段观看进度变更事件（进度页脚据此刷新）
//! - 事件广播和订阅机制
//!
//! 广播仅覆盖本进程内的订阅者；跨标签页/跨设备的一致性
//! 由服务端数据在下一次加载时兜底。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::i18n::Language;
use crate::session_state::SessionStatus;

/// SDK 事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SdkEvent {
    /// 会话状态变更（引导完成 / 登录 / 登出）
    SessionChanged {
        status: SessionStatus,
        timestamp: u64,
    },
    /// 当前阶段变更
    ///
    /// 远端持久化失败导致的回滚也走本事件，`rolled_back` 为 true，
    /// 回滚本身就是对用户的唯一提示。
    CurrentPhaseChanged {
        old_phase: u8,
        new_phase: u8,
        rolled_back: bool,
        timestamp: u64,
    },
    /// 续看指针变更
    LastWatchedVideoChanged {
        phase_number: u8,
        video_id: String,
        timestamp: u64,
    },
    /// 阶段观看进度变更（勾选/取消勾选后广播）
    PhaseProgressChanged {
        phase_number: u8,
        watched_count: usize,
        total_videos: usize,
        timestamp: u64,
    },
    /// 界面语言变更
    LanguageChanged {
        language: Language,
        timestamp: u64,
    },
}

impl SdkEvent {
    /// 获取事件类型字符串
    pub fn event_type(&self) -> &'static str {
        match self {
            SdkEvent::SessionChanged { .. } => "session_changed",
            SdkEvent::CurrentPhaseChanged { .. } => "current_phase_changed",
            SdkEvent::LastWatchedVideoChanged { .. } => "last_watched_video_changed",
            SdkEvent::PhaseProgressChanged { .. } => "phase_progress_changed",
            SdkEvent::LanguageChanged { .. } => "language_changed",
        }
    }

    /// 获取事件时间戳（UTC毫秒）
    pub fn timestamp(&self) -> u64 {
        match self {
            SdkEvent::SessionChanged { timestamp, .. } => *timestamp,
            SdkEvent::CurrentPhaseChanged { timestamp, .. } => *timestamp,
            SdkEvent::LastWatchedVideoChanged { timestamp, .. } => *timestamp,
            SdkEvent::PhaseProgressChanged { timestamp, .. } => *timestamp,
            SdkEvent::LanguageChanged { timestamp, .. } => *timestamp,
        }
    }

    /// 获取事件关联的阶段号
    pub fn phase_number(&self) -> Option<u8> {
        match self {
            SdkEvent::CurrentPhaseChanged { new_phase, .. } => Some(*new_phase),
            SdkEvent::LastWatchedVideoChanged { phase_number, .. } => Some(*phase_number),
            SdkEvent::PhaseProgressChanged { phase_number, .. } => Some(*phase_number),
            _ => None,
        }
    }

    /// 当前 UTC 毫秒时间戳
    pub(crate) fn now_ts() -> u64 {
        Utc::now().timestamp_millis() as u64
    }
}

/// 事件监听器类型
pub type EventListener = Box<dyn Fn(&SdkEvent) + Send + Sync>;

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    /// 总事件数
    pub total_events: u64,
    /// 按类型分组的事件数
    pub events_by_type: HashMap<String, u64>,
    /// 监听器数量
    pub listener_count: usize,
    /// 最后事件时间
    pub last_event_time: Option<u64>,
}

/// 事件管理器
pub struct EventManager {
    /// 广播发送器
    sender: broadcast::Sender<SdkEvent>,
    /// 事件监听器映射（事件类型 → 监听器列表，"*" 为通配）
    listeners: Arc<tokio::sync::RwLock<HashMap<String, Vec<EventListener>>>>,
    /// 事件统计
    stats: Arc<tokio::sync::RwLock<EventStats>>,
}

impl EventManager {
    /// 创建新的事件管理器
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self {
            sender,
            listeners: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            stats: Arc::new(tokio::sync::RwLock::new(EventStats::default())),
        }
    }

    /// 发布事件
    pub async fn emit(&self, event: SdkEvent) {
        debug!("Emitting event: {}", event.event_type());

        // 更新统计
        {
            let mut stats = self.stats.write().await;
            stats.total_events += 1;
            *stats
                .events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
            stats.last_event_time = Some(event.timestamp());
        }

        // 广播事件（无订阅者时 send 会失败，属正常场景，仅打 debug）
        if let Err(e) = self.sender.send(event.clone()) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }

        // 调用监听器
        let listeners = self.listeners.read().await;
        if let Some(event_listeners) = listeners.get(event.event_type()) {
            for listener in event_listeners {
                listener(&event);
            }
        }

        // 调用通用监听器
        if let Some(general_listeners) = listeners.get("*") {
            for listener in general_listeners {
                listener(&event);
            }
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<SdkEvent> {
        self.sender.subscribe()
    }

    /// 添加事件监听器
    pub async fn add_listener<F>(&self, event_type: &str, listener: F)
    where
        F: Fn(&SdkEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().await;
        listeners
            .entry(event_type.to_string())
            .or_insert_with(Vec::new)
            .push(Box::new(listener));

        // 更新监听器统计
        let mut stats = self.stats.write().await;
        stats.listener_count = listeners.values().map(|v| v.len()).sum();

        info!("Added listener for event type: {}", event_type);
    }

    /// 移除所有监听器
    pub async fn clear_listeners(&self) {
        let mut listeners = self.listeners.write().await;
        listeners.clear();

        let mut stats = self.stats.write().await;
        stats.listener_count = 0;

        info!("Cleared all event listeners");
    }

    /// 获取事件统计
    pub async fn get_stats(&self) -> EventStats {
        self.stats.read().await.clone()
    }

    /// 获取活跃订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
