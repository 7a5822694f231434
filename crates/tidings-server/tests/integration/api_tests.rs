use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::common::{setup_failing_app, setup_test_app, setup_unavailable_app};

async fn call(router: &Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_returns_ok_on_both_paths() {
    let app = setup_test_app();

    for uri in ["/", "/health"] {
        let (status, json) = call(&app.router, Method::GET, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"ok": true}));
    }
}

#[tokio::test]
async fn head_health_has_no_body() {
    let app = setup_test_app();
    let (status, json) = call(&app.router, Method::HEAD, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.is_null());
}

#[tokio::test]
async fn health_works_without_a_pipeline() {
    let router = setup_unavailable_app();
    let (status, _) = call(&router, Method::GET, "/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn run_publishes_then_skips_until_interval_passes() {
    let app = setup_test_app();

    let (status, json) = call(&app.router, Method::GET, "/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["posted"], 2);
    assert_eq!(
        app.publisher.sent_texts(),
        vec![
            "<b>UK: Stocks rally</b>\nhttps://news.example.com/1",
            "<b>UK: Bonds slip</b>\nhttps://news.example.com/2",
        ]
    );

    let (status, json) = call(&app.router, Method::GET, "/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "skipped");

    // Gate reopens, but both items are already seen.
    app.clock.advance(Duration::from_secs(3600));
    let (_, json) = call(&app.router, Method::GET, "/run").await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["posted"], 0);
    assert_eq!(app.publisher.attempt_count(), 2);
}

#[tokio::test]
async fn head_run_triggers_a_cycle() {
    let app = setup_test_app();

    let (status, _) = call(&app.router, Method::HEAD, "/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.publisher.sent_texts().len(), 2);
}

#[tokio::test]
async fn run_without_pipeline_reports_error() {
    let router = setup_unavailable_app();

    let (status, json) = call(&router, Method::GET, "/run").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "error");
    assert!(
        json["detail"]
            .as_str()
            .unwrap()
            .contains("TIDINGS_BOT_TOKEN")
    );
}

#[tokio::test]
async fn failed_cycle_reports_error() {
    let router = setup_failing_app();

    let (status, json) = call(&router, Method::GET, "/run").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status"], "error");
    assert!(json["detail"].as_str().unwrap().contains("boom"));
}

#[tokio::test]
async fn unknown_path_is_404() {
    let app = setup_test_app();
    let (status, _) = call(&app.router, Method::GET, "/v1/jobs").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
