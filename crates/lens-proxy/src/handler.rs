//! hudsucker handler binding intercepted traffic to the capture pipeline.
//!
//! hudsucker clones the handler for every request, so state stored on `self`
//! in [`HttpHandler::handle_request`] is seen by the matching
//! [`HttpHandler::handle_response`] and by nothing else.

use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hudsucker::{
    hyper::{Request, Response},
    Body, HttpContext, HttpHandler, RequestOrResponse,
};
use hyper::body::Bytes;

use lens_core::{
    CapturePipeline, HeaderList, RequestSnapshot, ResponseSnapshot, Transaction,
    TransactionHandler, LOG_TARGET,
};

fn bytes_to_body(bytes: Bytes) -> Body {
    Body::from(Full::new(bytes))
}

/// Answer sent to the client when a matched request body cannot be read.
fn bad_gateway() -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = StatusCode::BAD_GATEWAY;
    res
}

/// Turns upstream response headers into an honest empty 502.
fn mark_unreadable(parts: &mut http::response::Parts) {
    parts.status = StatusCode::BAD_GATEWAY;
    for name in [CONTENT_LENGTH, TRANSFER_ENCODING, CONTENT_ENCODING] {
        parts.headers.remove(name);
    }
}

/// HTTP handler for the MITM proxy.
#[derive(Clone)]
pub struct CaptureHandler {
    pipeline: Arc<CapturePipeline>,
    /// Request recorded for the in-flight transaction, if it is a capture candidate.
    pending: Option<RequestSnapshot>,
}

impl std::fmt::Debug for CaptureHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandler")
            .field("ingest_url", &self.pipeline.config().ingest_url)
            .field("pending", &self.pending.as_ref().map(|r| &r.url))
            .finish()
    }
}

impl CaptureHandler {
    /// Creates a handler feeding `pipeline`.
    pub fn new(pipeline: Arc<CapturePipeline>) -> Self {
        Self {
            pipeline,
            pending: None,
        }
    }

    /// Extracts host from request URI or Host header, without port.
    fn extract_host<B>(req: &Request<B>) -> Option<String> {
        if let Some(host) = req.uri().host() {
            return Some(host.to_string());
        }

        req.headers()
            .get(hyper::header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.split(':').next().unwrap_or(s).to_string())
    }

    /// Path plus query string.
    fn request_path(uri: &http::Uri) -> String {
        uri.path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string())
    }

    /// Fully resolved URL. Origin-form URIs are completed from the host.
    fn target_url(uri: &http::Uri, host: &str, path: &str) -> String {
        if uri.scheme().is_some() && uri.authority().is_some() {
            uri.to_string()
        } else {
            format!("https://{host}{path}")
        }
    }

    fn header_list(headers: &HeaderMap) -> HeaderList {
        headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    fn request_snapshot(
        parts: &http::request::Parts,
        host: String,
        path: String,
        body: &[u8],
        started_at: DateTime<Utc>,
    ) -> RequestSnapshot {
        RequestSnapshot {
            method: parts.method.as_str().to_string(),
            url: Self::target_url(&parts.uri, &host, &path),
            host,
            path,
            headers: Self::header_list(&parts.headers),
            body: body.to_vec(),
            bytes: body.len() as u64,
            started_at: Some(started_at),
        }
    }

    fn response_snapshot(
        parts: &http::response::Parts,
        body: Option<&[u8]>,
        ended_at: DateTime<Utc>,
    ) -> ResponseSnapshot {
        ResponseSnapshot {
            status: parts.status.as_u16(),
            headers: Self::header_list(&parts.headers),
            body: body.map(<[u8]>::to_vec),
            bytes: body.map_or(0, |b| b.len() as u64),
            ended_at: Some(ended_at),
        }
    }

    /// Buffers a matched request, records it as pending and re-emits the
    /// body unchanged. An unreadable body is answered with a 502 and nothing
    /// goes upstream.
    async fn buffer_request<B>(
        &mut self,
        req: Request<B>,
        host: String,
        path: String,
    ) -> RequestOrResponse
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Display,
    {
        let started_at = Utc::now();
        let (parts, body) = req.into_parts();
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    "Failed to read request body for {}{}: {}",
                    host,
                    path,
                    e
                );
                return RequestOrResponse::Response(bad_gateway());
            }
        };

        tracing::debug!(
            target: LOG_TARGET,
            "Intercepted LLM API request to {}{}",
            host,
            path
        );
        self.pending = Some(Self::request_snapshot(
            &parts,
            host,
            path,
            &body_bytes,
            started_at,
        ));

        RequestOrResponse::Request(Request::from_parts(parts, bytes_to_body(body_bytes)))
    }

    /// Buffers the response to `request`, spawns its capture and re-emits the
    /// body unchanged. An unreadable body is still captured (as empty) but the
    /// client sees a 502 rather than a truncated success.
    async fn capture_response<B>(
        &self,
        request: RequestSnapshot,
        res: Response<B>,
    ) -> Response<Body>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Display,
    {
        let (mut parts, body) = res.into_parts();
        match body.collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                let snapshot = Self::response_snapshot(&parts, Some(&bytes[..]), Utc::now());
                self.spawn_capture(Transaction::new(request, snapshot));
                Response::from_parts(parts, bytes_to_body(bytes))
            }
            Err(e) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    "Could not read response body from {}: {}",
                    request.url,
                    e
                );
                let snapshot = Self::response_snapshot(&parts, None, Utc::now());
                self.spawn_capture(Transaction::new(request, snapshot));
                mark_unreadable(&mut parts);
                Response::from_parts(parts, Body::empty())
            }
        }
    }

    /// Runs the pipeline for a finished transaction without blocking the client.
    fn spawn_capture(&self, transaction: Transaction) {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            let outcome = pipeline.handle(&transaction).await;
            if !outcome.was_built() {
                tracing::debug!(
                    target: LOG_TARGET,
                    "Skipped capture of {}: {:?}",
                    transaction.request.url,
                    outcome
                );
            }
        });
    }
}

impl HttpHandler for CaptureHandler {
    async fn handle_request(
        &mut self,
        _ctx: &HttpContext,
        req: Request<Body>,
    ) -> RequestOrResponse {
        self.pending = None;

        if req.method() != Method::POST {
            return RequestOrResponse::Request(req);
        }
        let Some(host) = Self::extract_host(&req) else {
            return RequestOrResponse::Request(req);
        };
        let path = Self::request_path(req.uri());

        // Unmatched traffic is never buffered
        if self.pipeline.classify("POST", &host, &path).is_err() {
            return RequestOrResponse::Request(req);
        }

        self.buffer_request(req, host, path).await
    }

    async fn handle_response(&mut self, _ctx: &HttpContext, res: Response<Body>) -> Response<Body> {
        match self.pending.take() {
            Some(request) => self.capture_response(request, res).await,
            None => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::IngestStub;
    use http_body_util::StreamBody;
    use hyper::body::Frame;
    use lens_core::{CaptureConfig, CaptureOutcome};
    use std::time::Duration;

    fn pipeline_for(url: &str) -> Arc<CapturePipeline> {
        let config = CaptureConfig::default()
            .with_ingest_url(url)
            .with_forward_timeout(Duration::from_millis(300));
        Arc::new(CapturePipeline::new(config).unwrap())
    }

    fn pipeline() -> Arc<CapturePipeline> {
        pipeline_for("http://127.0.0.1:9/x")
    }

    /// A body that yields one chunk and then fails like a reset connection.
    fn failing_body() -> impl hyper::body::Body<Data = Bytes, Error = std::io::Error> {
        let frames: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"{\"model\""))),
            Err(std::io::Error::other("connection reset")),
        ];
        StreamBody::new(futures::stream::iter(frames))
    }

    async fn body_bytes(body: Body) -> Bytes {
        body.collect().await.unwrap().to_bytes()
    }

    #[test]
    fn handler_debug() {
        let handler = CaptureHandler::new(pipeline());
        let debug = format!("{:?}", handler);
        assert!(debug.contains("CaptureHandler"));
        assert!(debug.contains("127.0.0.1:9"));
    }

    #[test]
    fn extract_host_prefers_uri() {
        let req = Request::builder()
            .uri("https://api.openai.com/v1/responses")
            .header("host", "other.example.com")
            .body(())
            .unwrap();
        assert_eq!(
            CaptureHandler::extract_host(&req).as_deref(),
            Some("api.openai.com")
        );
    }

    #[test]
    fn extract_host_falls_back_to_header_without_port() {
        let req = Request::builder()
            .uri("/v1/messages")
            .header("host", "api.anthropic.com:443")
            .body(())
            .unwrap();
        assert_eq!(
            CaptureHandler::extract_host(&req).as_deref(),
            Some("api.anthropic.com")
        );
    }

    #[test]
    fn extract_host_missing() {
        let req = Request::builder().uri("/v1/messages").body(()).unwrap();
        assert!(CaptureHandler::extract_host(&req).is_none());
    }

    #[test]
    fn request_path_keeps_query() {
        let uri: http::Uri = "https://gw.example.com/v1/chat/completions?api-version=2"
            .parse()
            .unwrap();
        assert_eq!(
            CaptureHandler::request_path(&uri),
            "/v1/chat/completions?api-version=2"
        );
    }

    #[test]
    fn target_url_absolute_and_origin_form() {
        let absolute: http::Uri = "https://chatgpt.com/backend-api/codex/responses"
            .parse()
            .unwrap();
        assert_eq!(
            CaptureHandler::target_url(&absolute, "chatgpt.com", "/backend-api/codex/responses"),
            "https://chatgpt.com/backend-api/codex/responses"
        );

        let origin: http::Uri = "/v1/messages".parse().unwrap();
        assert_eq!(
            CaptureHandler::target_url(&origin, "api.anthropic.com", "/v1/messages"),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn snapshots_feed_the_pipeline() {
        let (req_parts, ()) = Request::builder()
            .method("POST")
            .uri("https://api.anthropic.com/v1/messages")
            .header("content-type", "application/json")
            .header("x-api-key", "sk-ant-secret")
            .body(())
            .unwrap()
            .into_parts();
        let (res_parts, ()) = Response::builder()
            .status(200)
            .header("content-type", "text/event-stream")
            .body(())
            .unwrap()
            .into_parts();

        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(250);
        let body = br#"{"model":"claude-x"}"#;
        let sse = b"event: message_start\ndata: {}\n\n";

        let request = CaptureHandler::request_snapshot(
            &req_parts,
            "api.anthropic.com".into(),
            "/v1/messages".into(),
            body,
            start,
        );
        let response = CaptureHandler::response_snapshot(&res_parts, Some(&sse[..]), end);
        assert_eq!(request.bytes, body.len() as u64);
        assert_eq!(response.bytes, sse.len() as u64);

        let record = pipeline()
            .prepare(&Transaction::new(request, response))
            .unwrap();
        assert_eq!(record.provider, "anthropic");
        assert_eq!(record.target_url, "https://api.anthropic.com/v1/messages");
        assert!(record.response_is_streaming);
        assert_eq!(record.timings.total_ms, 250);
        assert!(!record.request_headers.contains_key("x-api-key"));
    }

    #[test]
    fn unreadable_response_snapshot() {
        let (parts, ()) = Response::builder()
            .status(502)
            .body(())
            .unwrap()
            .into_parts();
        let snapshot = CaptureHandler::response_snapshot(&parts, None, Utc::now());
        assert_eq!(snapshot.status, 502);
        assert!(snapshot.body.is_none());
        assert_eq!(snapshot.bytes, 0);
    }

    #[tokio::test]
    async fn spawned_capture_survives_unreachable_ingest() {
        let handler = CaptureHandler::new(pipeline());
        let (parts, ()) = Request::builder()
            .method("POST")
            .uri("https://api.openai.com/v1/responses")
            .body(())
            .unwrap()
            .into_parts();
        let request = CaptureHandler::request_snapshot(
            &parts,
            "api.openai.com".into(),
            "/v1/responses".into(),
            b"{}",
            Utc::now(),
        );
        let tx = Transaction::new(request, ResponseSnapshot::new(200, b"{}".to_vec()));

        // The detached task cannot report back, so run the same transaction inline too
        handler.spawn_capture(tx.clone());
        assert_eq!(handler.pipeline.handle(&tx).await, CaptureOutcome::SendFailed);
    }

    #[tokio::test]
    async fn matched_request_is_reemitted_and_recorded() {
        let mut handler = CaptureHandler::new(pipeline());
        let body = r#"{"model":"claude-x"}"#;
        let req = Request::builder()
            .method("POST")
            .uri("https://api.anthropic.com/v1/messages")
            .header("content-length", body.len())
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();

        let out = handler
            .buffer_request(req, "api.anthropic.com".into(), "/v1/messages".into())
            .await;
        let RequestOrResponse::Request(req) = out else {
            panic!("matched request must continue upstream");
        };
        assert_eq!(req.headers()["content-length"], body.len().to_string());
        assert_eq!(body_bytes(req.into_body()).await, body.as_bytes());

        let pending = handler.pending.as_ref().unwrap();
        assert_eq!(pending.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(pending.body, body.as_bytes());
        assert!(pending.started_at.is_some());
    }

    #[tokio::test]
    async fn unreadable_request_is_answered_with_bad_gateway() {
        let mut handler = CaptureHandler::new(pipeline());
        let req = Request::builder()
            .method("POST")
            .uri("https://api.anthropic.com/v1/messages")
            .header("content-length", 64)
            .body(failing_body())
            .unwrap();

        let out = handler
            .buffer_request(req, "api.anthropic.com".into(), "/v1/messages".into())
            .await;
        let RequestOrResponse::Response(res) = out else {
            panic!("an empty POST must not be sent upstream");
        };
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert!(handler.pending.is_none());
    }

    #[tokio::test]
    async fn response_is_reemitted_and_paired_with_its_request() {
        let stub = IngestStub::start().await;
        let handler = CaptureHandler::new(pipeline_for(&stub.url));
        let request = RequestSnapshot::new(
            "POST",
            "api.openai.com",
            "/v1/responses",
            r#"{"model":"gpt-5"}"#,
        )
        .started_at(Utc::now());
        let sse = "event: response.created\ndata: {}\n\n";
        let res = Response::builder()
            .status(200)
            .header("content-type", "text/event-stream")
            .body(Full::new(Bytes::from_static(sse.as_bytes())))
            .unwrap();

        let out = handler.capture_response(request, res).await;
        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(body_bytes(out.into_body()).await, sse.as_bytes());

        let received = stub.wait_for(1).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["requestBody"]["model"], "gpt-5");
        assert_eq!(received[0]["responseBody"], sse);
        assert_eq!(received[0]["responseIsStreaming"], true);
    }

    #[tokio::test]
    async fn unreadable_response_becomes_bad_gateway() {
        let stub = IngestStub::start().await;
        let handler = CaptureHandler::new(pipeline_for(&stub.url));
        let request = RequestSnapshot::new("POST", "api.anthropic.com", "/v1/messages", "{}");
        let res = Response::builder()
            .status(200)
            .header("content-type", "text/event-stream")
            .header("content-length", 512)
            .header("content-encoding", "gzip")
            .body(failing_body())
            .unwrap();

        let out = handler.capture_response(request, res).await;
        assert_eq!(out.status(), StatusCode::BAD_GATEWAY);
        assert!(out.headers().get(CONTENT_LENGTH).is_none());
        assert!(out.headers().get(CONTENT_ENCODING).is_none());
        assert!(out.headers().get(TRANSFER_ENCODING).is_none());
        assert!(body_bytes(out.into_body()).await.is_empty());

        // The capture still records what upstream actually sent
        let received = stub.wait_for(1).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["responseStatus"], 200);
        assert_eq!(received[0]["responseBody"], "");
    }
}
