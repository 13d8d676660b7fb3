//! Minimal HTTP responder for collector tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves the same canned response to every connection.
pub(crate) struct TestServer {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
    pub last_request: Arc<tokio::sync::Mutex<String>>,
}

impl TestServer {
    pub(crate) async fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let last_request = Arc::new(tokio::sync::Mutex::new(String::new()));

        let response = format!(
            "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let hits_task = Arc::clone(&hits);
        let last_task = Arc::clone(&last_request);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                hits_task.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                *last_task.lock().await = String::from_utf8_lossy(&buf[..n]).to_string();
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
            last_request,
        }
    }

    pub(crate) fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub(crate) async fn last_request_line(&self) -> String {
        self.last_request
            .lock()
            .await
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }
}
