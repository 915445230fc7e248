//! Transaction aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    FailureReason, PaymentMethod, TransactionError, TransactionEvent, TransactionStatus,
    events::{TransactionCompletedData, TransactionFailedData},
};

/// A confirmed payment for a domain, as handed over by the payment widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub domain_id: AggregateId,
    pub buyer_id: UserId,
    pub amount: Money,
    pub payment_id: String,
}

/// Transaction aggregate root: the outcome of one confirmed payment.
///
/// The stream ID is derived from the payment ID, so a payment can be
/// recorded at most once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    domain_id: Option<AggregateId>,
    buyer_id: Option<UserId>,
    amount: Money,
    payment_method: PaymentMethod,
    payment_id: String,
    status: Option<TransactionStatus>,
    failure_reason: Option<FailureReason>,
    created_at: Option<DateTime<Utc>>,
}

impl Aggregate for Transaction {
    type Event = TransactionEvent;
    type Error = TransactionError;

    fn aggregate_type() -> &'static str {
        "Transaction"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            TransactionEvent::TransactionCompleted(data) => self.apply_completed(data),
            TransactionEvent::TransactionFailed(data) => self.apply_failed(data),
        }
    }
}

// Query methods
impl Transaction {
    /// Stream ID for the transaction recording `payment_id`.
    pub fn id_for_payment(payment_id: &str) -> AggregateId {
        AggregateId::derived("transaction", payment_id.trim())
    }

    pub fn domain_id(&self) -> Option<AggregateId> {
        self.domain_id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_id(&self) -> &str {
        &self.payment_id
    }

    pub fn status(&self) -> Option<TransactionStatus> {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(TransactionStatus::Completed)
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure_reason
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

// Command methods (return events)
impl Transaction {
    /// Records that the payment bought the domain.
    pub fn complete(&self, payment: &PaymentRecord) -> Result<Vec<TransactionEvent>, TransactionError> {
        self.ensure_unrecorded(payment)?;
        Ok(vec![TransactionEvent::TransactionCompleted(
            TransactionCompletedData {
                transaction_id: Self::id_for_payment(&payment.payment_id),
                domain_id: payment.domain_id,
                buyer_id: payment.buyer_id,
                amount: payment.amount,
                payment_method: PaymentMethod::Paypal,
                payment_id: payment.payment_id.trim().to_string(),
                completed_at: Utc::now(),
            },
        )])
    }

    /// Records that the payment was taken but could not buy the domain.
    pub fn fail(
        &self,
        payment: &PaymentRecord,
        reason: FailureReason,
    ) -> Result<Vec<TransactionEvent>, TransactionError> {
        self.ensure_unrecorded(payment)?;
        Ok(vec![TransactionEvent::TransactionFailed(TransactionFailedData {
            transaction_id: Self::id_for_payment(&payment.payment_id),
            domain_id: payment.domain_id,
            buyer_id: payment.buyer_id,
            amount: payment.amount,
            payment_method: PaymentMethod::Paypal,
            payment_id: payment.payment_id.trim().to_string(),
            reason,
            failed_at: Utc::now(),
        })])
    }

    fn ensure_unrecorded(&self, payment: &PaymentRecord) -> Result<(), TransactionError> {
        if payment.payment_id.trim().is_empty() {
            return Err(TransactionError::EmptyPaymentId);
        }
        if self.id.is_some() {
            return Err(TransactionError::AlreadyRecorded {
                payment_id: self.payment_id.clone(),
            });
        }
        Ok(())
    }
}

// Apply event helpers
impl Transaction {
    fn apply_completed(&mut self, data: TransactionCompletedData) {
        self.id = Some(data.transaction_id);
        self.domain_id = Some(data.domain_id);
        self.buyer_id = Some(data.buyer_id);
        self.amount = data.amount;
        self.payment_method = data.payment_method;
        self.payment_id = data.payment_id;
        self.status = Some(TransactionStatus::Completed);
        self.created_at = Some(data.completed_at);
    }

    fn apply_failed(&mut self, data: TransactionFailedData) {
        self.id = Some(data.transaction_id);
        self.domain_id = Some(data.domain_id);
        self.buyer_id = Some(data.buyer_id);
        self.amount = data.amount;
        self.payment_method = data.payment_method;
        self.payment_id = data.payment_id;
        self.status = Some(TransactionStatus::Failed);
        self.failure_reason = Some(data.reason);
        self.created_at = Some(data.failed_at);
    }
}
