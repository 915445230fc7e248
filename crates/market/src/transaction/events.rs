//! Transaction events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateEvent;
use crate::money::Money;

use super::{FailureReason, PaymentMethod};

/// Events that can occur on a transaction.
///
/// A transaction stream holds exactly one event: it is written once, when
/// the payment it is keyed on has been confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TransactionEvent {
    /// The payment bought the domain.
    TransactionCompleted(TransactionCompletedData),

    /// The payment could not buy the domain and must be refunded.
    TransactionFailed(TransactionFailedData),
}

impl AggregateEvent for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::TransactionCompleted(_) => "TransactionCompleted",
            TransactionEvent::TransactionFailed(_) => "TransactionFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionCompletedData {
    pub transaction_id: AggregateId,
    pub domain_id: AggregateId,
    pub buyer_id: UserId,

    /// Always the listing price at the moment of sale.
    pub amount: Money,

    pub payment_method: PaymentMethod,
    pub payment_id: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFailedData {
    pub transaction_id: AggregateId,
    pub domain_id: AggregateId,
    pub buyer_id: UserId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_id: String,
    pub reason: FailureReason,
    pub failed_at: DateTime<Utc>,
}
