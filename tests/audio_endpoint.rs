// Audio endpoint behaviour through the full router stack

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use heardle_player::config::{RateLimitConfig, ServerConfig};
use heardle_player::server::{create_router, AppState, RateLimiter};

const CLIP_SIZE: usize = 1000;

fn setup() -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let clip: Vec<u8> = (0..CLIP_SIZE).map(|i| (i % 251) as u8).collect();
    std::fs::write(dir.path().join("song-1.mp3"), &clip).unwrap();
    std::fs::write(dir.path().join("secret"), b"nope").unwrap();

    let limiter = Arc::new(RateLimiter::new(&RateLimitConfig::default()));
    let state = AppState::new(dir.path(), limiter);
    let router = create_router(state, &ServerConfig::default());
    (dir, router)
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method(Method::GET).uri(uri)
}

async fn error_message(response: axum::response::Response) -> String {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    json["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn full_clip_is_streamed() {
    let (_dir, app) = setup();
    let response = app
        .oneshot(get("/api/audio?id=song-1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(headers[header::CONTENT_LENGTH], "1000");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=31536000");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), CLIP_SIZE);
}

#[tokio::test]
async fn range_request_returns_partial_content() {
    let (_dir, app) = setup();
    let response = app
        .oneshot(
            get("/api/audio?id=song-1")
                .header(header::RANGE, "bytes=100-199")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-199/1000");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), 100);
    assert_eq!(body[0], 100);
}

#[tokio::test]
async fn range_past_end_is_unsatisfiable() {
    let (_dir, app) = setup();
    let response = app
        .oneshot(
            get("/api/audio?id=song-1")
                .header(header::RANGE, "bytes=5000-")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
}

#[tokio::test]
async fn missing_id_is_rejected() {
    let (_dir, app) = setup();
    let response = app
        .oneshot(get("/api/audio").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "Missing id parameter");
}

#[tokio::test]
async fn malformed_ids_are_rejected_before_touching_disk() {
    for id in ["..%2Fsecret", "song%201", "song.mp3"] {
        let (_dir, app) = setup();
        let response = app
            .oneshot(get(&format!("/api/audio?id={id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "id {id}");
        assert_eq!(error_message(response).await, "Invalid id format");
    }
}

#[tokio::test]
async fn unknown_clip_is_not_found() {
    let (_dir, app) = setup();
    let response = app
        .oneshot(get("/api/audio?id=song-2").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_message(response).await, "Audio file not found");
}

#[tokio::test]
async fn other_methods_are_not_allowed() {
    let (_dir, app) = setup();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/audio?id=song-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn twenty_first_request_from_a_client_is_limited() {
    let (_dir, app) = setup();

    for _ in 0..20 {
        let response = app
            .clone()
            .oneshot(
                get("/api/audio?id=song-1")
                    .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let limited = app
        .clone()
        .oneshot(
            get("/api/audio?id=song-1")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_message(limited).await, "Too many requests");

    // A different client is unaffected
    let other = app
        .oneshot(
            get("/api/audio?id=song-1")
                .header("x-real-ip", "198.51.100.2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn allowed_origin_gets_cors_headers() {
    let (_dir, app) = setup();
    let response = app
        .clone()
        .oneshot(
            get("/api/audio?id=song-1")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );

    let response = app
        .oneshot(
            get("/api/audio?id=song-1")
                .header(header::ORIGIN, "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn preflight_is_answered() {
    let (_dir, app) = setup();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/audio?id=song-1")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}
