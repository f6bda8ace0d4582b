//! In-process HTTP fixtures: mirrors, directory documents and paid APIs.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

// ============================================================================
// Test server infrastructure
// ============================================================================

pub struct TestServer {
    base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });

        tokio::spawn(async move {
            server.await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn join(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

/// Base URL of a port nothing listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

// ============================================================================
// Mirrors
// ============================================================================

/// How a fixture mirror behaves.
#[derive(Clone, Copy)]
pub enum MirrorKind {
    /// Lists `140` and `251`; streams real bytes.
    Serving,
    /// Lists only `251`.
    MissingFormat,
    /// Lists `140`, but the stream endpoint answers 200 with no body.
    EmptyStream,
    /// Answers metadata with a body that is not JSON.
    Garbage,
    /// Sleeps before answering metadata.
    Slow(Duration),
}

#[derive(Clone)]
struct MirrorState {
    kind: MirrorKind,
    metadata_hits: Arc<AtomicUsize>,
}

pub struct MirrorServer {
    pub server: TestServer,
    pub metadata_hits: Arc<AtomicUsize>,
}

impl MirrorServer {
    pub async fn start(kind: MirrorKind) -> Self {
        let metadata_hits = Arc::new(AtomicUsize::new(0));
        let state = MirrorState {
            kind,
            metadata_hits: Arc::clone(&metadata_hits),
        };
        let router = Router::new()
            .route("/api/v1/videos/{id}", get(video_metadata))
            .route("/videoplayback", get(videoplayback))
            .with_state(state);

        Self {
            server: TestServer::start(router).await,
            metadata_hits,
        }
    }

    pub fn url(&self) -> &str {
        self.server.url()
    }

    pub fn hits(&self) -> usize {
        self.metadata_hits.load(Ordering::SeqCst)
    }
}

/// Upstream URL a fixture mirror reports for `id`/`itag`.
pub fn upstream_url(id: &str, itag: u32) -> String {
    format!("https://rr1---sn-test.googlevideo.com/videoplayback?id={id}&itag={itag}&sig=abc")
}

async fn video_metadata(
    State(state): State<MirrorState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.metadata_hits.fetch_add(1, Ordering::SeqCst);

    let formats = match state.kind {
        MirrorKind::Garbage => {
            return (StatusCode::OK, "<html>upstream error</html>").into_response();
        }
        MirrorKind::Slow(delay) => {
            tokio::time::sleep(delay).await;
            vec![json!({"itag": 140, "url": upstream_url(&id, 140)})]
        }
        MirrorKind::MissingFormat => {
            vec![json!({"itag": 251, "url": upstream_url(&id, 251)})]
        }
        MirrorKind::Serving | MirrorKind::EmptyStream => vec![
            json!({"itag": "251", "url": upstream_url(&id, 251)}),
            json!({"itag": 140, "url": upstream_url(&id, 140)}),
        ],
    };

    Json(json!({ "title": "fixture", "adaptiveFormats": formats })).into_response()
}

async fn videoplayback(State(state): State<MirrorState>) -> impl IntoResponse {
    match state.kind {
        MirrorKind::EmptyStream => (StatusCode::OK, [(header::CONTENT_TYPE, "audio/mp4")], Vec::new()),
        _ => (
            StatusCode::PARTIAL_CONTENT,
            [(header::CONTENT_TYPE, "audio/mp4")],
            b"ftypM4A audio bytes".to_vec(),
        ),
    }
}

// ============================================================================
// Directory document
// ============================================================================

pub struct DirectoryServer {
    pub server: TestServer,
    pub hits: Arc<AtomicUsize>,
}

impl DirectoryServer {
    pub async fn start(instances: Vec<String>) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/instances.json",
            get(move || {
                let counter = Arc::clone(&counter);
                let instances = instances.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "invidious": instances }))
                }
            }),
        );

        Self {
            server: TestServer::start(router).await,
            hits,
        }
    }

    pub fn document_url(&self) -> String {
        self.server.join("/instances.json")
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Paid API
// ============================================================================

#[derive(Deserialize)]
struct IdQuery {
    id: String,
}

/// A paid API whose answer depends on the `api-key` header:
/// `ok-*` succeeds, `quota-*` reports a quota message, `limit-*` answers 429,
/// anything else fails.
pub struct SecondaryServer {
    pub server: TestServer,
    pub calls: Arc<AtomicUsize>,
}

impl SecondaryServer {
    pub async fn start() -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/dl", get(secondary_dl))
            .with_state(Arc::clone(&calls));

        Self {
            server: TestServer::start(router).await,
            calls,
        }
    }

    pub fn endpoint(&self) -> String {
        self.server.join("/dl")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn secondary_dl(
    State(calls): State<Arc<AtomicUsize>>,
    headers: HeaderMap,
    Query(query): Query<IdQuery>,
) -> impl IntoResponse {
    calls.fetch_add(1, Ordering::SeqCst);
    let key = headers
        .get("api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if key.starts_with("ok-") {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "link": format!("https://cdn.example/{}.m4a", query.id),
                "msg": "success"
            })),
        )
    } else if key.starts_with("quota-") {
        (
            StatusCode::OK,
            Json(json!({"status": "fail", "msg": "You have exceeded the DAILY quota"})),
        )
    } else if key.starts_with("limit-") {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"message": "Too many requests"})),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "fail", "msg": "Invalid API key"})),
        )
    }
}
