//! The stream relay.
//!
//! Sits between a chat client and the upstream AI backend. In streaming
//! mode it is a transparent pipe: upstream body bytes are forwarded
//! chunk-for-chunk with NDJSON headers, no re-buffering, no re-framing.
//! In single-shot mode the buffered upstream body is forwarded verbatim.
//! In both modes an upstream failure is mapped to
//! a deterministic, wire-shaped error payload so a downstream frame
//! decoder never observes a malformed stream.

pub mod upstream;

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::{future, Stream, StreamExt};

use crate::api::{AgentReply, Avatar, ChatRequest, Event};
use upstream::{UpstreamBackend, UpstreamError};

/// Which response shape the relay speaks to its clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Chunked NDJSON event stream.
    Stream,
    /// One buffered JSON reply.
    Single,
}

impl FromStr for RelayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream" => Ok(RelayMode::Stream),
            "single" => Ok(RelayMode::Single),
            other => Err(format!("invalid mode '{other}' (expected 'stream' or 'single')")),
        }
    }
}

/// Shared state injected into handlers. Stateless per request; nothing
/// here mutates after startup.
#[derive(Clone)]
pub struct RelayState {
    pub upstream: Arc<dyn UpstreamBackend>,
    pub mode: RelayMode,
}

/// Build the relay router.
pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn chat_handler(
    State(state): State<RelayState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    tracing::info!(mode = ?state.mode, "relaying chat request");
    match state.mode {
        RelayMode::Stream => stream_chat(&state, &request).await,
        RelayMode::Single => single_chat(&state, &request).await,
    }
}

const NDJSON: &str = "application/x-ndjson";

/// Streaming mode: pipe the upstream stream through, shaping failures.
async fn stream_chat(state: &RelayState, request: &ChatRequest) -> Response {
    match state.upstream.stream(request).await {
        Ok(upstream_body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, NDJSON),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(shape_stream(upstream_body)),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("upstream request failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, NDJSON)],
                Event::Error(e.diagnosis()).to_ndjson(),
            )
                .into_response()
        }
    }
}

/// Forward upstream chunks as-is; a mid-stream failure becomes exactly
/// one terminal `error` event line, after which the body ends. Headers
/// are long gone by then, so the HTTP status stays whatever was sent.
fn shape_stream(
    upstream_body: impl Stream<Item = Result<Bytes, UpstreamError>>,
) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> {
    upstream_body.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("upstream stream failed mid-flight: {e}");
                *failed = true;
                Bytes::from(Event::Error(e.diagnosis()).to_ndjson())
            }
        };
        future::ready(Some(Ok(chunk)))
    })
}

/// Single-shot mode: forward the buffered upstream body verbatim, or shape a
/// fixed error reply whose structural fields are present but neutral.
async fn single_chat(state: &RelayState, request: &ChatRequest) -> Response {
    match state.upstream.fetch(request).await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("upstream request failed: {e}");
            let reply = AgentReply {
                flow: e.diagnosis(),
                avatar: Avatar::default(),
                refs: Vec::new(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(reply)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::FrameDecoder;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::http::Request;
    use tower::ServiceExt;
    use upstream::UpstreamStream;

    enum Behavior {
        StreamOk(Vec<Result<Bytes, UpstreamError>>),
        StreamErr(UpstreamError),
        FetchOk(Bytes),
        FetchErr(UpstreamError),
    }

    struct MockUpstream {
        behavior: Mutex<Option<Behavior>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl MockUpstream {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior: Mutex::new(Some(behavior)),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn seen_requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl UpstreamBackend for MockUpstream {
        async fn stream(&self, request: &ChatRequest) -> Result<UpstreamStream, UpstreamError> {
            self.requests.lock().expect("lock").push(request.clone());
            match self.behavior.lock().expect("lock").take() {
                Some(Behavior::StreamOk(items)) => Ok(futures_util::stream::iter(items).boxed()),
                Some(Behavior::StreamErr(e)) => Err(e),
                _ => panic!("unexpected stream call"),
            }
        }

        async fn fetch(&self, request: &ChatRequest) -> Result<Bytes, UpstreamError> {
            self.requests.lock().expect("lock").push(request.clone());
            match self.behavior.lock().expect("lock").take() {
                Some(Behavior::FetchOk(body)) => Ok(body),
                Some(Behavior::FetchErr(e)) => Err(e),
                _ => panic!("unexpected fetch call"),
            }
        }
    }

    fn router_with(behavior: Behavior, mode: RelayMode) -> (Router, Arc<MockUpstream>) {
        let mock = MockUpstream::new(behavior);
        let state = RelayState {
            upstream: mock.clone(),
            mode,
        };
        (build_router(state), mock)
    }

    async fn post_chat(router: Router, body: &str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds");
        router.oneshot(request).await.expect("router responds")
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collects")
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (router, _) = router_with(Behavior::StreamOk(Vec::new()), RelayMode::Stream);
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .expect("request builds");
        let response = router.oneshot(request).await.expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stream_mode_pipes_upstream_chunks_verbatim() {
        let chunks = vec![
            Ok(Bytes::from_static(b"{\"type\":\"status\",\"data\":\"Working\"}\n{\"ty")),
            Ok(Bytes::from_static(b"pe\":\"content\",\"data\":\"hi\"}\n")),
        ];
        let (router, mock) = router_with(Behavior::StreamOk(chunks), RelayMode::Stream);

        let response = post_chat(router, r#"{"msg":"hello"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).expect("ct"),
            NDJSON
        );
        assert_eq!(
            response.headers().get(header::CONNECTION).expect("conn"),
            "keep-alive"
        );

        let body = body_bytes(response).await;
        assert_eq!(
            body,
            Bytes::from_static(
                b"{\"type\":\"status\",\"data\":\"Working\"}\n{\"type\":\"content\",\"data\":\"hi\"}\n"
            )
        );

        let seen = mock.seen_requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].msg, "hello");
        assert_eq!(seen[0].kind, "text");
    }

    #[tokio::test]
    async fn stream_mode_maps_refused_to_one_error_line() {
        let (router, _) = router_with(Behavior::StreamErr(UpstreamError::Refused), RelayMode::Stream);

        let response = post_chat(router, r#"{"msg":"hello"}"#).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).expect("ct"),
            NDJSON
        );

        let body = body_bytes(response).await;
        let text = std::str::from_utf8(&body).expect("utf8");
        assert!(text.ends_with('\n'));
        let event: Event = serde_json::from_str(text.trim()).expect("body is one event line");
        match event {
            Event::Error(message) => assert!(message.contains("Connection Refused")),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mid_stream_failure_appends_exactly_one_error_event() {
        let chunks = vec![
            Ok(Bytes::from_static(b"{\"type\":\"content\",\"data\":\"partial\"}\n")),
            Err(UpstreamError::Other("connection reset".to_string())),
            // Never reached: the stream ends at the first failure.
            Ok(Bytes::from_static(b"{\"type\":\"content\",\"data\":\"ghost\"}\n")),
        ];
        let (router, _) = router_with(Behavior::StreamOk(chunks), RelayMode::Stream);

        let response = post_chat(router, r#"{"msg":"hello"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_bytes(response).await;

        // Whatever happened upstream, the client-side decoder must see a
        // fully parseable stream.
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for line in decoder.feed(&body).expect("no overflow") {
            events.push(serde_json::from_str::<Event>(&line).expect("every line parses"));
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Content(ref data) if data == "partial"));
        assert!(matches!(events[1], Event::Error(_)));
    }

    #[tokio::test]
    async fn single_mode_forwards_upstream_body_verbatim() {
        let upstream_body = r#"{"flow":"answer","avatar":{"state":"idle","mood":"happy"},"refs":[{"txt":"Doc","link":"https://example.com"}]}"#;
        let (router, _) = router_with(
            Behavior::FetchOk(Bytes::from_static(upstream_body.as_bytes())),
            RelayMode::Single,
        );

        let response = post_chat(router, r#"{"msg":"hello"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).expect("ct"),
            "application/json"
        );
        let body = body_bytes(response).await;
        assert_eq!(body, Bytes::from_static(upstream_body.as_bytes()));
    }

    #[tokio::test]
    async fn single_mode_shapes_refused_as_a_neutral_reply() {
        let (router, _) = router_with(Behavior::FetchErr(UpstreamError::Refused), RelayMode::Single);

        let response = post_chat(router, r#"{"msg":"hello"}"#).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_bytes(response).await;
        let reply: AgentReply = serde_json::from_slice(&body).expect("body is a reply");
        assert!(reply.flow.contains("Connection Refused"));
        assert_eq!(reply.avatar, Avatar::default());
        assert!(reply.refs.is_empty());
    }

    #[tokio::test]
    async fn single_mode_distinguishes_generic_failures() {
        let (router, _) = router_with(
            Behavior::FetchErr(UpstreamError::Other("boom".to_string())),
            RelayMode::Single,
        );

        let response = post_chat(router, r#"{"msg":"hello"}"#).await;
        let body = body_bytes(response).await;
        let reply: AgentReply = serde_json::from_slice(&body).expect("body is a reply");
        assert!(reply.flow.starts_with("Error: "));
        assert!(!reply.flow.contains("Connection Refused"));
    }

    #[test]
    fn relay_mode_parses_from_config_strings() {
        assert_eq!("stream".parse::<RelayMode>(), Ok(RelayMode::Stream));
        assert_eq!("single".parse::<RelayMode>(), Ok(RelayMode::Single));
        assert!("duplex".parse::<RelayMode>().is_err());
    }
}
