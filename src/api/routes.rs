use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::domain::CompleteRuleEngine;
use crate::service::RuleEngineService;

use super::request::{parse_config, EnginePath, TagPath};
use super::response::{ApiError, HealthResponse, ReadyResponse};

/// Shared application state.
pub struct AppState {
    /// Validating front of the tag store
    pub service: RuleEngineService,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/v1/ruleengine/:name",
            get(handle_get_engine).delete(handle_delete_engine),
        )
        .route(
            "/v1/ruleengine/:name/tag/:tag",
            put(handle_create_tag).delete(handle_delete_tag),
        )
        .route("/v1/ruleengine/:name/tag/:tag/enable", put(handle_enable_tag))
        .route(
            "/v1/ruleengine/:name/tag/:tag/disable",
            put(handle_disable_tag),
        )
        .route(
            "/v1/ruleengine/:name/defaulttag/:tag",
            put(handle_set_default),
        )
        .route(
            "/v1/ruleengine/:name/defaulttag",
            delete(handle_remove_default),
        )
        .route("/health/check", get(handle_health))
        .route("/ready", get(handle_ready))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Store a new tagged configuration.
async fn handle_create_tag(
    State(state): State<Arc<AppState>>,
    Path(path): Path<TagPath>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let config = parse_config(&body)?;

    state
        .service
        .create_tagged_config(&path.name, &path.tag, &config)
        .await?;

    info!(engine = %path.name, tag = %path.tag, "Tagged configuration created");
    Ok(StatusCode::OK)
}

/// Return the engine with every tag's configuration resolved.
async fn handle_get_engine(
    State(state): State<Arc<AppState>>,
    Path(path): Path<EnginePath>,
) -> Result<Json<CompleteRuleEngine>, ApiError> {
    let engine = state.service.get_complete_rule_engine(&path.name).await?;
    Ok(Json(engine))
}

async fn handle_delete_engine(
    State(state): State<Arc<AppState>>,
    Path(path): Path<EnginePath>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_rule_engine(&path.name).await?;

    info!(engine = %path.name, "Rule engine deleted");
    Ok(StatusCode::OK)
}

async fn handle_delete_tag(
    State(state): State<Arc<AppState>>,
    Path(path): Path<TagPath>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_tagged_config(&path.name, &path.tag)
        .await?;

    info!(engine = %path.name, tag = %path.tag, "Tagged configuration deleted");
    Ok(StatusCode::OK)
}

async fn handle_set_default(
    State(state): State<Arc<AppState>>,
    Path(path): Path<TagPath>,
) -> Result<StatusCode, ApiError> {
    state.service.set_default_tag(&path.name, &path.tag).await?;
    Ok(StatusCode::OK)
}

async fn handle_remove_default(
    State(state): State<Arc<AppState>>,
    Path(path): Path<EnginePath>,
) -> Result<StatusCode, ApiError> {
    state.service.remove_default_tag(&path.name).await?;
    Ok(StatusCode::OK)
}

async fn handle_enable_tag(
    State(state): State<Arc<AppState>>,
    Path(path): Path<TagPath>,
) -> Result<StatusCode, ApiError> {
    state.service.enable_tag(&path.name, &path.tag).await?;
    Ok(StatusCode::OK)
}

async fn handle_disable_tag(
    State(state): State<Arc<AppState>>,
    Path(path): Path<TagPath>,
) -> Result<StatusCode, ApiError> {
    state.service.disable_tag(&path.name, &path.tag).await?;
    Ok(StatusCode::OK)
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check endpoint.
async fn handle_ready(State(state): State<Arc<AppState>>) -> axum::response::Response {
    let datastore = state.service.store().datastore();

    if let Err(e) = datastore.ping().await {
        warn!(datastore = datastore.kind(), error = %e, "Datastore ping failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                datastore: datastore.kind().to_string(),
            }),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(ReadyResponse {
            ready: true,
            datastore: datastore.kind().to_string(),
        }),
    )
        .into_response()
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut metrics = format!(
        r#"# HELP tagstore_uptime_seconds Application uptime in seconds
# TYPE tagstore_uptime_seconds counter
tagstore_uptime_seconds {}

"#,
        state.start_time.elapsed().as_secs(),
    );
    metrics.push_str(&state.service.metrics().to_prometheus());

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        metrics,
    )
}
