use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

pub const CHANNELS: &str = "CNN,http://a/cnn.m3u8\nBBC,http://b/bbc.m3u8\n\ninvalid-line\n";

/// Local HTTP server serving canned channel lists on an ephemeral port.
pub struct ListServer {
    base: String,
    hits: Arc<AtomicUsize>,
}

impl ListServer {
    pub async fn start() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/channels.txt", get(|| async { CHANNELS }))
            .route("/empty.txt", get(|| async { "" }))
            .route(
                "/binary.txt",
                get(|| async { vec![0xff_u8, 0xfe, b'A', b',', b'B'] }),
            )
            .route(
                "/bom.txt",
                get(|| async { "\u{feff}CNN,http://a/cnn.m3u8\r\nBBC,http://b/bbc.m3u8\r\n" }),
            )
            .route("/missing.txt", get(|| async { StatusCode::NOT_FOUND }))
            .route("/slow.txt", get(slow))
            .route("/fast.txt", get(|| async { "Fast,http://fast/live.m3u8\n" }))
            .with_state(Arc::clone(&hits));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });

        Self {
            base: format!("http://{}", addr),
            hits,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Requests that reached `/slow.txt`.
    pub fn slow_hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn slow(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;
    "Slow,http://slow/live.m3u8\n"
}
