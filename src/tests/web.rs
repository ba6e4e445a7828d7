use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{create_orchestrator, FakeBackend};
use crate::{
    config::{CaptureConfig, HighlightConfig},
    highlight::tabs::Tabs,
    web::{self, SharedState, SOURCE_HEADER},
};

fn create_router(remote: Option<Arc<FakeBackend>>) -> Router {
    let (orchestrator, _store) = create_orchestrator(remote, CaptureConfig::default());
    web::router(Arc::new(SharedState {
        orchestrator,
        tabs: Tabs::new(),
        capture: CaptureConfig::default(),
        highlight: HighlightConfig::default(),
    }))
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let source = response
        .headers()
        .get(SOURCE_HEADER)
        .map(|v| v.to_str().unwrap().to_string());

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, source, value)
}

#[tokio::test]
async fn test_capture_then_search() {
    let router = create_router(None);

    let html = "<html><head><title>Tide tables</title></head>\
        <body><p>Spring tides follow the new moon.</p><script>var x = 1;</script></body></html>";
    let (status, _, body) = send(
        &router,
        "POST",
        "/api/capture",
        Some(json!({"url": "https://example.org/tides", "html": html})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stored");
    assert_eq!(body["chunks"], 1);

    let (status, source, body) = send(
        &router,
        "POST",
        "/api/search",
        Some(json!({"query": "Spring tides follow the new moon."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("local"));
    assert_eq!(body[0]["url"], "https://example.org/tides");
    assert_eq!(body[0]["title"], "Tide tables");
    assert!(!body[0]["matches"][0]["text"].as_str().unwrap().contains("var x"));

    let (status, _, body) = send(&router, "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_urls"], 1);
}

#[tokio::test]
async fn test_remote_source_header() {
    let router = create_router(Some(FakeBackend::online()));

    let (status, source, body) = send(&router, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("remote"));
    assert_eq!(body["status"], "ok");

    let router = create_router(Some(FakeBackend::offline()));
    let (status, source, body) = send(&router, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("local"));
    assert_eq!(body["status"], "offline");
}

#[tokio::test]
async fn test_bad_requests() {
    let router = create_router(None);

    let (status, _, _) = send(
        &router,
        "POST",
        "/api/search",
        Some(json!({"query": "tides", "category": "recipes"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &router,
        "POST",
        "/api/capture",
        Some(json!({"url": "https://example.org/tides"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&router, "GET", "/api/pages/missing/highlights", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&router, "DELETE", "/api/pages/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_query_is_an_empty_result() {
    let router = create_router(Some(FakeBackend::online()));

    let (status, source, body) = send(&router, "POST", "/api/search", Some(json!({"query": " "}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("local"));
    assert_eq!(body, json!([]));

    let (status, _, body) = send(&router, "POST", "/api/compare", Some(json!({"query": ""}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test(start_paused = true)]
async fn test_open_page_and_highlight() {
    let router = create_router(None);

    let html = "<body><p>Elephant migration patterns</p><p>Weather forecast</p></body>";
    let (status, _, body) = send(&router, "POST", "/api/pages", Some(json!({"id": "t1", "html": html}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["regions"], 2);

    let (status, _, body) = send(
        &router,
        "POST",
        "/api/highlight",
        Some(json!({"page_id": "t1", "text": "elephant migration"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ids"].as_array().unwrap().len(), 1);

    let (status, _, body) = send(&router, "GET", "/api/pages/t1/highlights", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["Elephant migration patterns"]));

    // a second highlight replaces the first
    let (_, _, body) = send(
        &router,
        "POST",
        "/api/highlight",
        Some(json!({"page_id": "t1", "text": "weather forecast", "policy": "ratio"})),
    )
    .await;
    assert_eq!(body["ids"].as_array().unwrap().len(), 1);
    let (_, _, body) = send(&router, "GET", "/api/pages/t1/highlights", None).await;
    assert_eq!(body, json!(["Weather forecast"]));

    // blank text clears the marks and selects nothing
    let (status, _, body) = send(
        &router,
        "POST",
        "/api/highlight",
        Some(json!({"page_id": "t1", "text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ids"], json!([]));
    let (_, _, body) = send(&router, "GET", "/api/pages/t1/highlights", None).await;
    assert_eq!(body, json!([]));

    let (status, _, _) = send(&router, "DELETE", "/api/pages/t1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = send(&router, "GET", "/api/pages/t1/highlights", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_highlight_on_unopened_page_times_out() {
    let router = create_router(None);

    let (status, _, body) = send(
        &router,
        "POST",
        "/api/highlight",
        Some(json!({"page_id": "later", "text": "elephant migration"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    // the abandoned wait leaves no tab behind
    let (status, _, _) = send(&router, "GET", "/api/pages/later/highlights", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = send(
        &router,
        "POST",
        "/api/pages",
        Some(json!({"id": "later", "html": "<p>Elephant migration</p>"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["regions"], 1);
}
