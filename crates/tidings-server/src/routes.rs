use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;

use tidings_core::error::AppError;

use crate::dto::{HealthResponse, RunResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Build the router. `get` routes also answer HEAD, so uptime pingers that
/// only send HEAD can trigger `/run` too.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/run", get(run))
        .with_state(state)
}

pub async fn health() -> impl IntoResponse {
    axum::Json(HealthResponse { ok: true })
}

/// Run one cycle. Gate-closed cycles answer `skipped`; any failure to run
/// answers `error` with a non-2xx status.
pub async fn run(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let trigger = state
        .trigger
        .as_ref()
        .map_err(|reason| AppError::ConfigError(reason.clone()))?;

    let report = trigger.trigger().await?;
    tracing::info!(
        cycle_id = %report.cycle_id,
        outcome = ?report.outcome,
        published = report.published,
        "Cycle triggered over HTTP"
    );

    Ok(axum::Json(RunResponse::from(&report)))
}
