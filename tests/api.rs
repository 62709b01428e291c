use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceExt;

use tagstore::api::{create_router, AppState};
use tagstore::definition::StructuralValidator;
use tagstore::observability::MetricsRegistry;
use tagstore::storage::MemoryDatastore;
use tagstore::{RuleEngineService, TagStore};

fn app(memory: &MemoryDatastore) -> Router {
    let service = RuleEngineService::new(
        TagStore::new(Arc::new(memory.clone())),
        Arc::new(StructuralValidator::new()),
        Arc::new(MetricsRegistry::new()),
    );

    create_router(Arc::new(AppState {
        service,
        start_time: Instant::now(),
        version: "test".to_string(),
    }))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    body: &'static str,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or_default())
}

#[tokio::test]
async fn test_tag_lifecycle_over_http() {
    let memory = MemoryDatastore::new();
    let app = app(&memory);
    let config = r#"{"rules": {"velocity": {"window": "1h", "limit": 10}}}"#;

    for tag in ["/v1/ruleengine/risk/tag/v1", "/v1/ruleengine/risk/tag/v2"] {
        let (status, _) = call(&app, Method::PUT, tag, config).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = call(&app, Method::PUT, "/v1/ruleengine/risk/tag/v1", config).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errCode"], 11);

    let (status, body) = call(&app, Method::PUT, "/v1/ruleengine/risk/defaulttag/v1", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errCode"], 10);

    call(&app, Method::PUT, "/v1/ruleengine/risk/tag/v1/enable", "").await;
    let (status, _) = call(&app, Method::PUT, "/v1/ruleengine/risk/defaulttag/v1", "").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::DELETE, "/v1/ruleengine/risk/tag/v1", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errCode"], 8);

    let (status, body) = call(&app, Method::PUT, "/v1/ruleengine/risk/tag/v9/enable", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errCode"], 7);

    let (status, _) = call(&app, Method::DELETE, "/v1/ruleengine/risk/tag/v2", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(memory.config_count(), 1);

    let (status, body) = call(&app, Method::GET, "/v1/ruleengine/risk", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["defaultTag"], "v1");
    assert_eq!(body["tags"].as_object().unwrap().len(), 1);

    let (status, _) = call(&app, Method::DELETE, "/v1/ruleengine/risk", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(memory.engine_count(), 0);
    assert_eq!(memory.config_count(), 0);
}

#[tokio::test]
async fn test_overlong_tag_rejected() {
    let memory = MemoryDatastore::new();
    let app = app(&memory);

    let (status, body) = call(
        &app,
        Method::PUT,
        "/v1/ruleengine/risk/tag/abcdefghijklmnopqrstuvwxyz012345",
        r#"{"rules": {"r": {}}}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errCode"], 3);
    assert_eq!(memory.engine_count(), 0);
}
