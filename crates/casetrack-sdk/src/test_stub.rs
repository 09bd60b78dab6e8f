//! 测试用的极简 HTTP 存根服务
//!
//! 用裸 TcpListener 返回固定/按请求计算的 JSON 响应，供需要走通
//! 远端分支的测试使用；每个连接读一次、答一次、随即关闭。

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// 根据原始请求文本给出 (状态码, 响应体)
pub(crate) type StubHandler = Arc<dyn Fn(&str) -> (u16, String) + Send + Sync>;

pub(crate) struct StubServer {
    pub base_url: String,
    /// 收到的原始请求文本（按到达顺序）
    pub requests: mpsc::UnboundedReceiver<String>,
}

/// 启动按请求路由的存根服务
pub(crate) async fn spawn_with(handler: StubHandler) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let handler = handler.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 16 * 1024];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let _ = tx.send(request.clone());

                let (status, body) = handler(&request);
                let reason = match status {
                    200 => "OK",
                    401 => "Unauthorized",
                    404 => "Not Found",
                    500 => "Internal Server Error",
                    _ => "Status",
                };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    StubServer {
        base_url: format!("http://{}", addr),
        requests: rx,
    }
}

/// 启动对所有请求返回同一响应的存根服务
pub(crate) async fn spawn(status: u16, body: &str) -> StubServer {
    let body = body.to_string();
    spawn_with(Arc::new(move |_| (status, body.clone()))).await
}

/// 返回一个必然连接被拒的基础 URL（绑定后立即释放端口）
pub(crate) async fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
