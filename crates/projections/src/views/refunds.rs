//! Refund queue read model: captured payments that bought nothing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use checkout::CheckoutEvent;
use common::{AggregateId, UserId};
use event_store::EventEnvelope;
use market::{Money, TransactionEvent};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{MarketEvent, Projection, ProjectionPosition, ReadModel};

/// A payment an operator has to refund by hand.
#[derive(Debug, Clone, Serialize)]
pub struct RefundEntry {
    pub payment_id: String,
    pub domain_id: AggregateId,
    pub buyer_id: UserId,
    pub amount: Money,

    /// Why the payment did not buy the domain, e.g. `already_sold`.
    pub reason: String,

    /// The checkout that flagged it, when the payment went through one.
    pub checkout_id: Option<AggregateId>,

    pub flagged_at: DateTime<Utc>,
}

struct RefundQueueState {
    entries: HashMap<String, RefundEntry>,
    position: ProjectionPosition,
}

/// Read model view of payments awaiting manual refund.
///
/// Fed by failed transactions and by checkout compensations. A payment is
/// listed once however many times it was reported.
#[derive(Clone)]
pub struct RefundQueueView {
    state: Arc<RwLock<RefundQueueState>>,
}

impl RefundQueueView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RefundQueueState {
                entries: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Pending refunds, oldest first.
    pub async fn pending(&self) -> Vec<RefundEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<RefundEntry> = state.entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.flagged_at
                .cmp(&b.flagged_at)
                .then_with(|| a.payment_id.cmp(&b.payment_id))
        });
        entries
    }

    pub async fn get(&self, payment_id: &str) -> Option<RefundEntry> {
        self.state.read().await.entries.get(payment_id).cloned()
    }
}

impl Default for RefundQueueView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for RefundQueueView {
    fn name(&self) -> &'static str {
        "RefundQueueView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;

        match MarketEvent::decode(event)? {
            MarketEvent::Transaction(TransactionEvent::TransactionFailed(data)) => {
                state
                    .entries
                    .entry(data.payment_id.clone())
                    .or_insert(RefundEntry {
                        payment_id: data.payment_id,
                        domain_id: data.domain_id,
                        buyer_id: data.buyer_id,
                        amount: data.amount,
                        reason: data.reason.as_str().to_string(),
                        checkout_id: None,
                        flagged_at: data.failed_at,
                    });
            }
            MarketEvent::Checkout(CheckoutEvent::RefundFlagged(data)) => {
                let entry = state
                    .entries
                    .entry(data.payment_id.clone())
                    .or_insert(RefundEntry {
                        payment_id: data.payment_id,
                        domain_id: data.domain_id,
                        buyer_id: data.buyer_id,
                        amount: data.amount,
                        reason: data.reason.to_lowercase(),
                        checkout_id: None,
                        flagged_at: data.flagged_at,
                    });
                entry.checkout_id.get_or_insert(data.checkout_id);
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
        state.entries.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for RefundQueueView {
    fn name(&self) -> &'static str {
        "RefundQueueView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.entries.len()).unwrap_or(0)
    }
}
