//! Liveness endpoint.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /health`: process is up; reports whether the store answers.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("store ping failed: {e}");
            false
        }
    };
    Json(HealthResponse {
        status: "ok".into(),
        store,
    })
}
