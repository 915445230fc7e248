//! API server entry point.

use std::error::Error;
use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::{AppState, Services};
use checkout::{InMemoryPaymentWidget, PayPalConfig, PayPalWidget, PaymentWidget};
use chrono::Utc;
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::HttpMailer;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn payment_widget(config: &Config) -> Result<Arc<dyn PaymentWidget>, BoxError> {
    match &config.paypal {
        Some(paypal) => {
            let mut widget_config =
                PayPalConfig::new(paypal.client_id.clone(), paypal.client_secret.clone());
            if let Some(api_base) = &paypal.api_base {
                widget_config = widget_config.with_api_base(api_base.clone());
            }
            tracing::info!("using PayPal payment widget");
            Ok(Arc::new(PayPalWidget::new(widget_config)?))
        }
        None => {
            tracing::warn!("PayPal not configured, payments are simulated in memory");
            Ok(Arc::new(InMemoryPaymentWidget::new()))
        }
    }
}

/// Builds the state over `store`, serves until a shutdown signal, then
/// drains the notification queue.
async fn serve<S: EventStore + Clone + 'static>(
    store: S,
    services: Services,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let shutdown = services.shutdown.clone();
    let (state, dispatcher) = AppState::build(store, services);

    // Replay existing history into the read models
    state.catch_up().await.map_err(|e| format!("catch-up failed: {}", e.code()))?;

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = dispatcher.await {
        tracing::warn!(error = %e, "notification dispatcher did not stop cleanly");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()?;

    // 3. Outside services
    let services = Services {
        widget: payment_widget(&config)?,
        mailer: Arc::new(HttpMailer::new(config.mailer.clone())?),
        payment_timeout: config.payment_timeout,
        feedback_recipients: config.feedback_recipients.clone(),
        notify_since: Utc::now(),
        shutdown: CancellationToken::new(),
    };

    // 4. Event store, then serve
    match &config.database_url {
        Some(url) => {
            let store = PostgresEventStore::connect(url).await?;
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL event store");
            serve(store, services, &config, metrics_handle).await?;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, events are kept in memory");
            serve(InMemoryEventStore::new(), services, &config, metrics_handle).await?;
        }
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
