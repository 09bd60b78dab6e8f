//! 登录与观看进度演示
//!
//! 展示完整的门户客户端流程：初始化 → 登录（远端不可达时自动回退
//! 演示账号）→ 挂载阶段观看集合 → 勾选视频 → 登出。
//!
//! 运行: cargo run --example login_demo

use casetrack_sdk::{CasetrackConfig, CasetrackSDK, Language, Platform};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Web 平台：内存存储 + 嵌入式视频呈现器
    let config = CasetrackConfig::builder()
        .platform(Platform::Web)
        .request_timeout_secs(3)
        .build();
    let sdk = CasetrackSDK::initialize(config).await?;

    // 订阅事件，观察登录与勾选触发的广播
    let mut receiver = sdk.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            println!("📣 事件: {}", event.event_type());
        }
    });

    // 后端未启动时会自动走演示账号回退
    let identity = sdk.login("client@demo.com", "client123").await?;
    println!(
        "欢迎, {} (案件编号: {})",
        identity.name,
        identity.case_number.as_deref().unwrap_or("-")
    );

    // 阶段 1 的观看集合
    let tracker = sdk.watched_set(1).await?;
    for video in &sdk.catalog().phase(1).unwrap().videos {
        println!("🎬 {}", video.title.get(Language::En));
    }
    tracker.toggle("phase1_video_1").await?;
    println!(
        "阶段 1 完成度: {}% ({}/{})",
        tracker.completion_percentage().await,
        tracker.watched_count().await,
        tracker.total_videos()
    );

    // 续看指针已随勾选推进
    if let Some(pointer) = sdk.progress().last_watched_video().await {
        println!("⏯️ 续看: 阶段 {} / {}", pointer.phase_number, pointer.video_id);
    }

    sdk.logout().await;
    sdk.shutdown().await?;
    Ok(())
}
