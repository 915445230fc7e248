//! Health check endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use event_store::EventStore;
use projections::ReadModel;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Entries per read model.
    pub read_models: BTreeMap<&'static str, usize>,
}

/// GET /health — reports whether the event store is reachable.
///
/// Answers 503 with `"degraded"` while the read models cannot catch up.
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (status, code) = match state.catch_up().await {
        Ok(()) => ("ok", StatusCode::OK),
        Err(e) => {
            tracing::warn!(code = e.code(), "health check failed");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let models: [&dyn ReadModel; 3] = [&state.catalog, &state.dashboards, &state.refunds];
    let read_models = models.iter().map(|m| (m.name(), m.count())).collect();

    (code, Json(HealthResponse { status, read_models }))
}
