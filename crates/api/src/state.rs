//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use checkout::{CheckoutCoordinator, DEFAULT_PAYMENT_TIMEOUT, InMemoryPaymentWidget, PaymentWidget};
use chrono::{DateTime, Utc};
use event_store::EventStore;
use market::{DomainService, OfferService};
use projections::{
    DashboardView, DomainCatalogView, InMemoryMailer, Mailer, OwnerNotifier, ProjectionProcessor,
    RefundQueueView, run_dispatcher,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// The outside world the API talks to.
pub struct Services {
    pub widget: Arc<dyn PaymentWidget>,
    pub mailer: Arc<dyn Mailer>,
    pub payment_timeout: Duration,
    pub feedback_recipients: Vec<String>,

    /// Only events after this instant trigger owner mail.
    pub notify_since: DateTime<Utc>,

    /// Cancelled on shutdown; stops the dispatcher and in-flight payments.
    pub shutdown: CancellationToken,
}

impl Services {
    /// In-memory payment widget and mailer, for tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            widget: Arc::new(InMemoryPaymentWidget::new()),
            mailer: Arc::new(InMemoryMailer::new()),
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
            feedback_recipients: Vec::new(),
            notify_since: Utc::now(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub store: S,
    pub domains: DomainService<S>,
    pub offers: OfferService<S>,
    pub checkout: CheckoutCoordinator<S, Arc<dyn PaymentWidget>>,
    pub processor: ProjectionProcessor<S>,
    pub catalog: DomainCatalogView,
    pub dashboards: DashboardView,
    pub refunds: RefundQueueView,
    pub mailer: Arc<dyn Mailer>,
    pub feedback_recipients: Vec<String>,
    pub shutdown: CancellationToken,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    /// Wires services, read models and the owner notifier over `store`,
    /// and spawns the notification dispatcher.
    pub fn build(store: S, services: Services) -> (Arc<Self>, JoinHandle<()>) {
        let catalog = DomainCatalogView::new();
        let dashboards = DashboardView::new();
        let refunds = RefundQueueView::new();
        let (notifier, queue) = OwnerNotifier::new(services.notify_since);

        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(catalog.clone()));
        processor.register(Box::new(dashboards.clone()));
        processor.register(Box::new(refunds.clone()));
        processor.register(Box::new(notifier));

        let dispatcher = tokio::spawn(run_dispatcher(
            queue,
            services.mailer.clone(),
            services.shutdown.clone(),
        ));

        let state = Arc::new(Self {
            domains: DomainService::new(store.clone()),
            offers: OfferService::new(store.clone()),
            checkout: CheckoutCoordinator::new(store.clone(), services.widget)
                .with_payment_timeout(services.payment_timeout),
            store,
            processor,
            catalog,
            dashboards,
            refunds,
            mailer: services.mailer,
            feedback_recipients: services.feedback_recipients,
            shutdown: services.shutdown,
        });

        (state, dispatcher)
    }
}

impl<S: EventStore> AppState<S> {
    /// Brings every read model up to date before a query.
    pub async fn catch_up(&self) -> Result<(), ApiError> {
        self.processor.run_catch_up().await?;
        Ok(())
    }

    /// Feeds a committed write to the read models and the notifier.
    ///
    /// The write stands either way; a failure here is caught up by the
    /// next read.
    pub async fn publish(&self) {
        if let Err(e) = self.processor.run_catch_up().await {
            tracing::warn!(error = %e, "read models not updated after write");
        }
    }
}
