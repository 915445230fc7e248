//! The projection and read model traits, and decoding of stored events.

use async_trait::async_trait;
use checkout::{Checkout, CheckoutEvent};
use event_store::EventEnvelope;
use market::{Aggregate, Domain, DomainEvent, Offer, OfferEvent, Transaction, TransactionEvent};

use crate::Result;

/// How many events of the store's global stream a projection has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }

    /// Whether the event at 1-based `index` in the global stream is still
    /// to be handled.
    pub fn is_behind(&self, index: u64) -> bool {
        self.events_processed < index
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// A stored event decoded by the aggregate it belongs to.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    Domain(DomainEvent),
    Offer(OfferEvent),
    Transaction(TransactionEvent),
    Checkout(CheckoutEvent),
    /// An aggregate type no projection knows about.
    Other,
}

impl MarketEvent {
    pub fn decode(envelope: &EventEnvelope) -> Result<Self> {
        let payload = || envelope.payload.clone();
        let kind = envelope.aggregate_type.as_str();

        let event = if kind == Domain::aggregate_type() {
            MarketEvent::Domain(serde_json::from_value(payload())?)
        } else if kind == Offer::aggregate_type() {
            MarketEvent::Offer(serde_json::from_value(payload())?)
        } else if kind == Transaction::aggregate_type() {
            MarketEvent::Transaction(serde_json::from_value(payload())?)
        } else if kind == Checkout::aggregate_type() {
            MarketEvent::Checkout(serde_json::from_value(payload())?)
        } else {
            MarketEvent::Other
        };
        Ok(event)
    }
}

/// Turns the event stream into a read model, or into side effects.
///
/// `handle` sees every event of the global stream in order, including
/// ones it ignores, and must advance its position for each of them. The
/// processor relies on that position to deliver each event exactly once.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops everything the projection has built, back to position zero.
    async fn reset(&self) -> Result<()>;
}

/// Query side of a projection, as reported by health checks and metrics.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entries currently held. Zero while a writer holds the lock.
    fn count(&self) -> usize;
}
