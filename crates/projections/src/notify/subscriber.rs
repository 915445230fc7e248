//! The owner notification projection and its delivery task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventEnvelope;
use market::{DomainEvent, OfferEvent};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;

use super::{Mailer, Notification, OfferNotification, SaleNotification};
use crate::Result;
use crate::projection::{MarketEvent, Projection, ProjectionPosition};

/// How many times a notification is tried before it is given up on.
pub const DELIVERY_ATTEMPTS: u32 = 3;

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
struct ListingContact {
    name: String,
    owner_email: Option<String>,
}

struct OwnerNotifierState {
    contacts: HashMap<AggregateId, ListingContact>,
    position: ProjectionPosition,
}

/// Projection that queues owner emails for new offers and sales.
///
/// Only events written after `since` are queued, so replaying the log on
/// startup or after a reset rebuilds the owner contacts without mailing
/// anyone twice.
#[derive(Clone)]
pub struct OwnerNotifier {
    state: Arc<RwLock<OwnerNotifierState>>,
    since: DateTime<Utc>,
    outbox: mpsc::UnboundedSender<Notification>,
}

impl OwnerNotifier {
    /// Creates the notifier and the queue [`run_dispatcher`] drains.
    pub fn new(since: DateTime<Utc>) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (outbox, queue) = mpsc::unbounded_channel();
        let notifier = Self {
            state: Arc::new(RwLock::new(OwnerNotifierState {
                contacts: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
            since,
            outbox,
        };
        (notifier, queue)
    }

    fn enqueue(&self, notification: Notification) {
        tracing::debug!(kind = notification.kind(), "queueing owner notification");
        if self.outbox.send(notification).is_err() {
            tracing::warn!("notification dispatcher is gone, dropping notification");
            metrics::counter!("notifications_failed_total").increment(1);
        }
    }
}

#[async_trait]
impl Projection for OwnerNotifier {
    fn name(&self) -> &'static str {
        "OwnerNotifier"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        let is_new = event.timestamp > self.since;

        match MarketEvent::decode(event)? {
            MarketEvent::Domain(domain_event) => match domain_event {
                DomainEvent::DomainListed(data) => {
                    state.contacts.insert(
                        event.aggregate_id,
                        ListingContact {
                            name: data.name,
                            owner_email: data.owner_email,
                        },
                    );
                }
                DomainEvent::DomainSold(data) => {
                    if let Some(contact) = state.contacts.get_mut(&event.aggregate_id) {
                        // The buyer has no address on record.
                        let previous = contact.owner_email.take();
                        if let (true, Some(owner_email)) = (is_new, previous) {
                            self.enqueue(Notification::Sale(SaleNotification {
                                domain_name: contact.name.clone(),
                                amount: data.price.to_decimal_string(),
                                payment_id: data.payment_id,
                                owner_email,
                            }));
                        }
                    }
                }
                _ => {}
            },
            MarketEvent::Offer(OfferEvent::OfferSubmitted(data)) if is_new => {
                match state
                    .contacts
                    .get(&data.domain_id)
                    .and_then(|c| c.owner_email.clone())
                {
                    Some(owner_email) => self.enqueue(Notification::Offer(OfferNotification {
                        domain_name: data.domain_name,
                        amount: data.amount.to_decimal_string(),
                        buyer_email: data.contact_email,
                        buyer_phone: data.contact_phone,
                        message: data.message,
                        owner_email,
                    })),
                    None => tracing::debug!(
                        domain_id = %data.domain_id,
                        "no owner email on record, offer not mailed"
                    ),
                }
            }
            _ => {}
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.contacts.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

/// Delivers queued notifications until `cancel` fires or the queue closes.
///
/// Each notification gets up to [`DELIVERY_ATTEMPTS`] tries with a growing
/// pause between them. One that still fails is logged and dropped.
pub async fn run_dispatcher<M: Mailer>(
    mut queue: mpsc::UnboundedReceiver<Notification>,
    mailer: M,
    cancel: CancellationToken,
) {
    tracing::info!("notification dispatcher started");
    loop {
        let notification = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(notification) => notification,
                None => break,
            },
        };
        deliver(&mailer, &notification, &cancel).await;
    }
    tracing::info!("notification dispatcher stopped");
}

async fn deliver<M: Mailer>(mailer: &M, notification: &Notification, cancel: &CancellationToken) {
    let kind = notification.kind();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match mailer.deliver(notification).await {
            Ok(()) => {
                metrics::counter!("notifications_sent_total", "kind" => kind).increment(1);
                tracing::info!(kind, recipient = notification.recipient(), "owner notified");
                return;
            }
            Err(e) if e.is_retryable() && attempt < DELIVERY_ATTEMPTS => {
                tracing::debug!(kind, attempt, error = %e, "notification failed, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(RETRY_BACKOFF * attempt) => {}
                }
            }
            Err(e) => {
                metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
                tracing::warn!(
                    kind,
                    attempt,
                    recipient = notification.recipient(),
                    error = %e,
                    "owner notification not delivered"
                );
                return;
            }
        }
    }
}
