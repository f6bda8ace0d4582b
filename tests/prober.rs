//! Liveness probe behaviour against real HTTP responses.

mod common;

use std::time::Duration;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use mirrorlink::{CandidateProber, MirrorClient};

use common::{dead_url, TestServer};

const TIMEOUT: Duration = Duration::from_secs(2);

async fn audio(headers: HeaderMap) -> impl IntoResponse {
    let status = if headers.contains_key(header::RANGE) {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    (status, [(header::CONTENT_TYPE, "audio/mp4")], "ftypM4A")
}

async fn empty() -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "audio/mp4")], "")
}

async fn html_error_page() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<html><body>Video unavailable</body></html>",
    )
}

async fn forbidden() -> impl IntoResponse {
    (StatusCode::FORBIDDEN, "expired signature")
}

async fn stalled() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(10)).await;
    "too late"
}

async fn server() -> TestServer {
    TestServer::start(
        Router::new()
            .route("/audio", get(audio))
            .route("/empty", get(empty))
            .route("/html", get(html_error_page))
            .route("/forbidden", get(forbidden))
            .route("/stalled", get(stalled)),
    )
    .await
}

fn prober() -> CandidateProber {
    CandidateProber::new(MirrorClient::new().unwrap())
}

#[tokio::test]
async fn partial_content_with_bytes_is_accessible() {
    let server = server().await;
    assert!(prober().is_accessible(&server.join("/audio"), TIMEOUT).await);
}

#[tokio::test]
async fn empty_success_body_is_rejected() {
    let server = server().await;
    assert!(!prober().is_accessible(&server.join("/empty"), TIMEOUT).await);
}

#[tokio::test]
async fn html_error_page_is_rejected() {
    let server = server().await;
    assert!(!prober().is_accessible(&server.join("/html"), TIMEOUT).await);
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let server = server().await;
    assert!(!prober().is_accessible(&server.join("/forbidden"), TIMEOUT).await);
}

#[tokio::test]
async fn stalled_server_hits_timeout() {
    let server = server().await;
    let started = std::time::Instant::now();
    assert!(
        !prober()
            .is_accessible(&server.join("/stalled"), Duration::from_millis(200))
            .await
    );
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn connection_refused_is_rejected() {
    let url = format!("{}/audio", dead_url().await);
    assert!(!prober().is_accessible(&url, TIMEOUT).await);
}
