//! Local upstream and ingest servers for adapter tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Upstream that echoes POST bodies back as an event stream and answers
/// `GET /health` with `ok`. Only `/v1/messages` looks like an LLM API.
pub(crate) async fn start_upstream() -> SocketAddr {
    async fn echo(body: Bytes) -> impl IntoResponse {
        ([(header::CONTENT_TYPE, "text/event-stream")], body)
    }

    let app = Router::new()
        .route("/v1/messages", post(echo))
        .route("/upload", post(echo))
        .route("/health", get(|| async { "ok" }));
    serve(app).await
}

/// Ingest endpoint recording every capture record it receives.
pub(crate) struct IngestStub {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl IngestStub {
    pub async fn start() -> Self {
        async fn ingest(
            State(received): State<Arc<Mutex<Vec<Value>>>>,
            Json(body): Json<Value>,
        ) -> StatusCode {
            received.lock().push(body);
            StatusCode::OK
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/api/ingest", post(ingest))
            .with_state(Arc::clone(&received));
        let addr = serve(app).await;

        Self {
            url: format!("http://{addr}/api/ingest"),
            received,
        }
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    /// Waits until `count` records have arrived, or gives up after five seconds.
    pub async fn wait_for(&self, count: usize) -> Vec<Value> {
        for _ in 0..100 {
            if self.received.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.received()
    }
}

/// A loopback port that was free a moment ago.
pub(crate) fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Waits until something accepts connections on `addr`.
pub(crate) async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {addr}");
}
