//! Prometheus metrics endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::ReadModel;

use crate::state::AppState;

/// Router state for the metrics endpoint.
pub struct Telemetry<S: EventStore> {
    pub handle: PrometheusHandle,
    pub app: Arc<AppState<S>>,
}

impl<S: EventStore> Clone for Telemetry<S> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            app: self.app.clone(),
        }
    }
}

/// GET /metrics — returns Prometheus-formatted metrics.
///
/// Read model sizes are sampled into gauges on every scrape.
pub async fn get<S: EventStore + Clone + 'static>(
    State(telemetry): State<Telemetry<S>>,
) -> impl IntoResponse {
    metrics::gauge!("catalog_entries").set(telemetry.app.catalog.count() as f64);
    metrics::gauge!("refund_queue_depth").set(telemetry.app.refunds.count() as f64);

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        telemetry.handle.render(),
    )
}
