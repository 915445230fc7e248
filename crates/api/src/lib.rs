//! HTTP API for the domain marketplace.
//!
//! Serves the catalog, listing management, offers and Buy Now checkouts,
//! with structured logging (tracing) and Prometheus metrics. The caller's
//! identity arrives in request headers set by the auth proxy in front of
//! this service (see [`session`]).

pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use state::{AppState, Services};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get::<S>))
        .with_state(routes::metrics::Telemetry {
            handle: metrics_handle,
            app: state.clone(),
        });

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/domains",
            get(routes::domains::list::<S>).post(routes::domains::create::<S>),
        )
        .route("/domains/featured", get(routes::domains::featured::<S>))
        .route(
            "/domains/{id}",
            get(routes::domains::get::<S>)
                .patch(routes::domains::update::<S>)
                .delete(routes::domains::delist::<S>),
        )
        .route("/domains/{id}/reserve", post(routes::domains::reserve::<S>))
        .route("/domains/{id}/release", post(routes::domains::release::<S>))
        .route("/domains/{id}/events", get(routes::domains::events::<S>))
        .route("/domains/{id}/offers", post(routes::offers::submit::<S>))
        .route("/domains/{id}/checkout", post(routes::checkout::pay_now::<S>))
        .route(
            "/domains/{id}/checkout/confirm",
            post(routes::checkout::confirm::<S>),
        )
        .route("/offers/{id}/resolve", post(routes::offers::resolve::<S>))
        .route("/checkouts/{id}", get(routes::checkout::get::<S>))
        .route("/dashboard", get(routes::account::dashboard::<S>))
        .route("/admin/refunds", get(routes::account::refunds::<S>))
        .route("/feedback", post(routes::account::feedback::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
