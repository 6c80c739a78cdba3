//! Admin HTTP routes and handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use lodestone_core::{DeadLetterStats, DeadLetterStore, GroupCount, HistoryStats, HistoryStore};
use lodestone_processor::{Poller, PollerState, ProcessorMetrics, ProcessorSnapshot};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub metrics: ProcessorMetrics,
    pub poller: Arc<Poller>,
    pub dead_letters: Arc<dyn DeadLetterStore>,
    pub history: Arc<dyn HistoryStore>,
    pub prometheus: PrometheusHandle,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/dead-letter/stats", get(dead_letter_stats))
        .fallback(fallback)
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": state.version,
        "poller": state.poller.state(),
    }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.prometheus.render()
}

#[derive(Serialize)]
struct StatsResponse {
    poller: PollerState,
    processor: ProcessorSnapshot,
    history: HistoryStats,
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let history = state.history.stats().await?;
    Ok(Json(StatsResponse {
        poller: state.poller.state(),
        processor: state.metrics.snapshot(),
        history,
    }))
}

#[derive(Serialize)]
struct DeadLetterResponse {
    #[serde(flatten)]
    stats: DeadLetterStats,
    by_source: Vec<GroupCount>,
    by_error_code: Vec<GroupCount>,
}

async fn dead_letter_stats(
    State(state): State<AppState>,
) -> Result<Json<DeadLetterResponse>, AppError> {
    Ok(Json(DeadLetterResponse {
        stats: state.dead_letters.stats().await?,
        by_source: state.dead_letters.count_by_source().await?,
        by_error_code: state.dead_letters.count_by_error_code().await?,
    }))
}

async fn fallback() -> AppError {
    AppError::NotFound
}

/// Error handling
#[derive(Debug)]
enum AppError {
    NotFound,
    Store(lodestone_core::Error),
}

impl From<lodestone_core::Error> for AppError {
    fn from(err: lodestone_core::Error) -> Self {
        AppError::Store(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Store(err) => {
                error!(error = %err, "Stats query failed");
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
        };

        let body = json!({
            "error": {
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}
