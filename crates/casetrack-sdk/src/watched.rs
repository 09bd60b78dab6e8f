//! 按阶段的已观看视频集合
//!
//! 一个实例绑定一个阶段号，生命周期随宿主屏幕：
//! - 挂载时从阶段键加载本地集合（损坏数据按空集处理），并尽力
//!   与远端按阶段的进度端点合并
//! - 勾选翻转集合成员；未观看→已观看额外推进续看指针，并把变更
//!   镜像到远端（仅记录失败）；已观看→未观看不回退指针（允许的
//!   陈旧指针语义）
//! - 每次变更都把完整集合写回阶段键（经写入队列串行化），随后
//!   广播进度变更事件，进度页脚据此重算完成百分比

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::{is_valid_phase, PhaseCatalog};
use crate::error::{CasetrackSDKError, Result};
use crate::events::{EventManager, SdkEvent};
use crate::http_client::ApiClient;
use crate::progress::ProgressManager;
use crate::storage::{self, keys, KeyValueStore, KeyWriteQueue};

/// `GET /api/progress/phase/:phaseNumber` 的条目（多余字段忽略）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseVideoProgress {
    pub video_id: String,
    pub watched: bool,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchedUpdateRequest {
    phase_number: u8,
    watched: bool,
}

/// 阶段已观看集合追踪器
pub struct PhaseWatchedSet {
    phase_number: u8,
    store: Arc<dyn KeyValueStore>,
    api: Arc<ApiClient>,
    write_queue: Arc<KeyWriteQueue>,
    events: Arc<EventManager>,
    progress: Arc<ProgressManager>,
    catalog: Arc<PhaseCatalog>,
    set: Arc<RwLock<HashSet<String>>>,
}

impl PhaseWatchedSet {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        phase_number: u8,
        store: Arc<dyn KeyValueStore>,
        api: Arc<ApiClient>,
        write_queue: Arc<KeyWriteQueue>,
        events: Arc<EventManager>,
        progress: Arc<ProgressManager>,
        catalog: Arc<PhaseCatalog>,
    ) -> Result<Self> {
        if !is_valid_phase(phase_number) {
            return Err(CasetrackSDKError::InvalidArgument(format!(
                "阶段号越界: {}",
                phase_number
            )));
        }
        Ok(Self {
            phase_number,
            store,
            api,
            write_queue,
            events,
            progress,
            catalog,
            set: Arc::new(RwLock::new(HashSet::new())),
        })
    }

    /// 绑定的阶段号
    pub fn phase_number(&self) -> u8 {
        self.phase_number
    }

    /// 本阶段的视频总数（来自目录）
    pub fn total_videos(&self) -> usize {
        self.catalog.total_videos(self.phase_number)
    }

    /// 挂载时加载集合
    ///
    /// 本地键先行（损坏→空集）；随后尽力从远端合并已观看条目，
    /// 远端失败仅记录。目录不认识的本地 ID 保留并告警，陈旧目录
    /// 不抹掉用户进度。
    pub async fn load(&self) {
        let key = keys::phase_watched(self.phase_number);

        // 1. 本地集合
        let local: Vec<String> =
            storage::read_json(self.store.as_ref(), &key).await.unwrap_or_default();
        for video_id in &local {
            if !self.catalog.contains_video(self.phase_number, video_id) {
                warn!(
                    "⚠️ 阶段 {} 的已观看集合包含目录未知的视频: {}",
                    self.phase_number, video_id
                );
            }
        }
        {
            let mut set = self.set.write().await;
            *set = local.into_iter().collect();
        }

        // 2. 远端合并（尽力而为）
        let path = format!("/api/progress/phase/{}", self.phase_number);
        match self.api.get_json::<Vec<PhaseVideoProgress>>(&path).await {
            Ok(entries) => {
                let mut merged_any = false;
                {
                    let mut set = self.set.write().await;
                    for entry in entries.into_iter().filter(|e| e.watched) {
                        merged_any |= set.insert(entry.video_id);
                    }
                }
                if merged_any {
                    debug!("🔄 阶段 {} 已从远端合并观看进度", self.phase_number);
                    self.persist().await;
                }
            }
            Err(e) => {
                warn!(
                    "⚠️ 阶段 {} 的远端进度加载失败（忽略）: {}",
                    self.phase_number, e
                );
            }
        }

        info!(
            "✅ 阶段 {} 已观看集合加载完成: {}/{}",
            self.phase_number,
            self.watched_count().await,
            self.total_videos()
        );
        self.emit_progress_changed().await;
    }

    /// 翻转视频的观看状态；返回翻转后的状态
    ///
    /// 视频必须在本阶段的目录视频列表内（不允许跨阶段串号）。
    pub async fn toggle(&self, video_id: &str) -> Result<bool> {
        if !self.catalog.contains_video(self.phase_number, video_id) {
            return Err(CasetrackSDKError::InvalidArgument(format!(
                "视频 {} 不属于阶段 {}",
                video_id, self.phase_number
            )));
        }

        // 1. 翻转内存集合
        let now_watched = {
            let mut set = self.set.write().await;
            if set.remove(video_id) {
                false
            } else {
                set.insert(video_id.to_string());
                true
            }
        };

        // 2. 未观看→已观看：推进续看指针（指针自身的远端腿是
        //    FireAndForget）；已观看→未观看不触碰指针
        if now_watched {
            if let Err(e) = self
                .progress
                .update_last_watched_video(self.phase_number, video_id)
                .await
            {
                warn!("⚠️ 续看指针更新失败: {}", e);
            }
        }

        // 3. 远端镜像本次变更（仅记录失败）
        self.mirror_to_remote(video_id, now_watched).await;

        // 4. 持久化完整集合并广播
        self.persist().await;
        self.emit_progress_changed().await;

        Ok(now_watched)
    }

    /// 是否已观看
    pub async fn is_watched(&self, video_id: &str) -> bool {
        self.set.read().await.contains(video_id)
    }

    /// 已观看数量
    pub async fn watched_count(&self) -> usize {
        self.set.read().await.len()
    }

    /// 已观看视频 ID（排序后）
    pub async fn watched_videos(&self) -> Vec<String> {
        let mut videos: Vec<String> = self.set.read().await.iter().cloned().collect();
        videos.sort();
        videos
    }

    /// 完成百分比：round(100 × 已观看 / 总数)；总数为 0 时为 0
    pub async fn completion_percentage(&self) -> u8 {
        let total = self.total_videos();
        if total == 0 {
            return 0;
        }
        let watched = self.watched_count().await;
        ((watched as f64 / total as f64) * 100.0).round() as u8
    }

    /// 把完整集合写回阶段键（经写入队列串行化）；失败仅记录
    async fn persist(&self) {
        let key = keys::phase_watched(self.phase_number);
        let snapshot = self.watched_videos().await;
        let result = self
            .write_queue
            .run(&key, || async {
                storage::write_json(self.store.as_ref(), &key, &snapshot).await
            })
            .await;
        if let Err(e) = result {
            warn!("⚠️ 阶段 {} 的已观看集合持久化失败: {}", self.phase_number, e);
        }
    }

    /// 把单个视频的观看状态镜像到远端；失败仅记录
    async fn mirror_to_remote(&self, video_id: &str, watched: bool) {
        let path = format!("/api/progress/video/{}/watched", video_id);
        let request = WatchedUpdateRequest {
            phase_number: self.phase_number,
            watched,
        };
        match self
            .api
            .post_json::<_, crate::progress::AckResponse>(&path, &request)
            .await
        {
            Ok(_) => {}
            Err(e) => {
                warn!("⚠️ 观看状态远端镜像失败（忽略）: {}", e);
            }
        }
    }

    async fn emit_progress_changed(&self) {
        self.events
            .emit(SdkEvent::PhaseProgressChanged {
                phase_number: self.phase_number,
                watched_count: self.watched_count().await,
                total_videos: self.total_videos(),
                timestamp: SdkEvent::now_ts(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Localized, PhaseInfo, VideoItem};
    use crate::storage::MemoryKvStore;
    use crate::test_stub;
    use std::time::Duration;

    /// 阶段 N 配有 `total` 条视频（phaseN_video_1..）的测试目录
    fn test_catalog(phase_number: u8, total: usize) -> PhaseCatalog {
        let mut phases = PhaseCatalog::default().phases().to_vec();
        let videos = (1..=total)
            .map(|i| VideoItem {
                id: format!("phase{}_video_{}", phase_number, i),
                title: Localized::new(format!("Video {}", i), format!("Video {}", i)),
                embed_url: Localized::new("https://example.com/embed", "https://example.com/embed"),
                summary: Localized::new("", ""),
            })
            .collect();
        phases[(phase_number - 1) as usize].videos = videos;
        PhaseCatalog::new(phases).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryKvStore>,
        tracker: PhaseWatchedSet,
    }

    fn fixture(base_url: &str, phase_number: u8, total: usize) -> Fixture {
        let store = Arc::new(MemoryKvStore::new());
        let api = Arc::new(
            ApiClient::new(base_url, Duration::from_secs(2), store.clone()).unwrap(),
        );
        let write_queue = Arc::new(KeyWriteQueue::new());
        let events = Arc::new(EventManager::new(16));
        let progress = Arc::new(ProgressManager::new(
            api.clone(),
            store.clone(),
            write_queue.clone(),
            events.clone(),
        ));
        let tracker = PhaseWatchedSet::new(
            phase_number,
            store.clone(),
            api,
            write_queue,
            events,
            progress,
            Arc::new(test_catalog(phase_number, total)),
        )
        .unwrap();
        Fixture { store, tracker }
    }

    async fn offline_fixture(phase_number: u8, total: usize) -> Fixture {
        let base_url = test_stub::refused_base_url().await;
        fixture(&base_url, phase_number, total)
    }

    #[tokio::test]
    async fn test_toggle_watched_persists_and_updates_pointer() {
        let fx = offline_fixture(3, 5).await;
        fx.tracker.load().await;

        let watched = fx.tracker.toggle("phase3_video_2").await.unwrap();
        assert!(watched);
        assert!(fx.tracker.is_watched("phase3_video_2").await);

        // 持久化的阶段键可反序列化为含该 ID 的列表
        let persisted: Vec<String> = serde_json::from_str(
            &fx.store
                .get(&keys::phase_watched(3))
                .await
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert!(persisted.contains(&"phase3_video_2".to_string()));

        // 未观看→已观看推进了续看指针（远端失败不影响）
        let pointer = fx.store.get(keys::LAST_WATCHED_VIDEO).await.unwrap().unwrap();
        assert!(pointer.contains("phase3_video_2"));
    }

    #[tokio::test]
    async fn test_toggle_twice_round_trips() {
        let fx = offline_fixture(3, 5).await;
        fx.tracker.load().await;

        fx.tracker.toggle("phase3_video_1").await.unwrap();
        let watched = fx.tracker.toggle("phase3_video_1").await.unwrap();
        assert!(!watched);
        assert_eq!(fx.tracker.watched_count().await, 0);

        // 持久化也回到空列表
        let persisted: Vec<String> = serde_json::from_str(
            &fx.store
                .get(&keys::phase_watched(3))
                .await
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert!(persisted.is_empty());
    }

    #[tokio::test]
    async fn test_unwatch_does_not_clear_stale_pointer() {
        let fx = offline_fixture(3, 5).await;
        fx.tracker.load().await;

        fx.tracker.toggle("phase3_video_1").await.unwrap();
        let before = fx.store.get(keys::LAST_WATCHED_VIDEO).await.unwrap();
        assert!(before.is_some());

        // 取消观看同一视频：指针保持原值（允许的陈旧指针）
        fx.tracker.toggle("phase3_video_1").await.unwrap();
        let after = fx.store.get(keys::LAST_WATCHED_VIDEO).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_toggle_rejects_video_from_other_phase() {
        let fx = offline_fixture(3, 5).await;
        fx.tracker.load().await;

        let result = fx.tracker.toggle("phase1_video_1").await;
        assert!(matches!(
            result,
            Err(CasetrackSDKError::InvalidArgument(_))
        ));
        assert_eq!(fx.tracker.watched_count().await, 0);
    }

    #[tokio::test]
    async fn test_completion_percentage() {
        let fx = offline_fixture(4, 5).await;
        fx.tracker.load().await;

        // 0/5 → 0
        assert_eq!(fx.tracker.completion_percentage().await, 0);

        for i in 1..=3 {
            fx.tracker
                .toggle(&format!("phase4_video_{}", i))
                .await
                .unwrap();
        }
        // 3/5 → 60
        assert_eq!(fx.tracker.completion_percentage().await, 60);

        // 总数为 0 的阶段 → 0
        let empty = offline_fixture(5, 0).await;
        empty.tracker.load().await;
        assert_eq!(empty.tracker.completion_percentage().await, 0);
    }

    #[tokio::test]
    async fn test_load_treats_malformed_data_as_empty() {
        let fx = offline_fixture(3, 5).await;
        fx.store
            .set(&keys::phase_watched(3), "{definitely not a list")
            .await
            .unwrap();

        fx.tracker.load().await;
        assert_eq!(fx.tracker.watched_count().await, 0);
    }

    #[tokio::test]
    async fn test_load_keeps_unknown_ids_from_storage() {
        // 陈旧目录不应抹掉用户已有进度
        let fx = offline_fixture(3, 5).await;
        fx.store
            .set(&keys::phase_watched(3), "[\"removed_video_9\"]")
            .await
            .unwrap();

        fx.tracker.load().await;
        assert!(fx.tracker.is_watched("removed_video_9").await);
    }

    #[tokio::test]
    async fn test_load_merges_remote_watched_entries() {
        let stub = test_stub::spawn_with(Arc::new(|request: &str| {
            if request.starts_with("GET /api/progress/phase/3") {
                (
                    200,
                    r#"[
                        {"videoId": "phase3_video_1", "watched": true, "watchedAt": "2024-06-01T00:00:00Z"},
                        {"videoId": "phase3_video_2", "watched": false}
                    ]"#
                    .to_string(),
                )
            } else {
                (500, "{\"error\":\"Server error\"}".to_string())
            }
        }))
        .await;
        let fx = fixture(&stub.base_url, 3, 5);

        fx.tracker.load().await;
        // 仅合并 watched=true 的条目
        assert!(fx.tracker.is_watched("phase3_video_1").await);
        assert!(!fx.tracker.is_watched("phase3_video_2").await);

        // 合并结果已写回本地键
        let persisted: Vec<String> = serde_json::from_str(
            &fx.store
                .get(&keys::phase_watched(3))
                .await
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(persisted, vec!["phase3_video_1".to_string()]);
    }

    #[tokio::test]
    async fn test_toggle_broadcasts_progress_changed() {
        let fx = offline_fixture(3, 5).await;
        fx.tracker.load().await;
        let mut receiver = fx.tracker.events.subscribe();

        fx.tracker.toggle("phase3_video_1").await.unwrap();

        // 勾选路径上最终会有一条本阶段的进度变更广播
        loop {
            match receiver.recv().await.unwrap() {
                SdkEvent::PhaseProgressChanged {
                    phase_number,
                    watched_count,
                    total_videos,
                    ..
                } => {
                    assert_eq!(phase_number, 3);
                    assert_eq!(watched_count, 1);
                    assert_eq!(total_videos, 5);
                    break;
                }
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_tracker_rejects_out_of_range_phase() {
        let store: Arc<MemoryKvStore> = Arc::new(MemoryKvStore::new());
        let api = Arc::new(
            ApiClient::new(
                "http://127.0.0.1:1",
                Duration::from_secs(1),
                store.clone(),
            )
            .unwrap(),
        );
        let write_queue = Arc::new(KeyWriteQueue::new());
        let events = Arc::new(EventManager::new(4));
        let progress = Arc::new(ProgressManager::new(
            api.clone(),
            store.clone(),
            write_queue.clone(),
            events.clone(),
        ));
        let result = PhaseWatchedSet::new(
            16,
            store,
            api,
            write_queue,
            events,
            progress,
            Arc::new(PhaseCatalog::default()),
        );
        assert!(result.is_err());
    }
}
