//! Checkout saga events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use market::{AggregateEvent, Money};
use serde::{Deserialize, Serialize};

/// Events that can occur during a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    /// A buyer started paying for a domain.
    CheckoutStarted(CheckoutStartedData),

    /// A saga step started execution.
    StepStarted(StepData),

    /// A saga step completed successfully.
    StepCompleted(StepCompletedData),

    /// A saga step failed.
    StepFailed(StepFailedData),

    /// Compensation started after a step failed with money captured.
    CompensationStarted(CompensationData),

    /// A captured payment was handed to operators for manual refund.
    RefundFlagged(RefundFlaggedData),

    /// The domain was sold to the buyer.
    CheckoutCompleted(CheckoutCompletedData),

    /// The checkout ended without a sale.
    CheckoutFailed(CheckoutFailedData),
}

impl AggregateEvent for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutStarted(_) => "CheckoutStarted",
            CheckoutEvent::StepStarted(_) => "StepStarted",
            CheckoutEvent::StepCompleted(_) => "StepCompleted",
            CheckoutEvent::StepFailed(_) => "StepFailed",
            CheckoutEvent::CompensationStarted(_) => "CompensationStarted",
            CheckoutEvent::RefundFlagged(_) => "RefundFlagged",
            CheckoutEvent::CheckoutCompleted(_) => "CheckoutCompleted",
            CheckoutEvent::CheckoutFailed(_) => "CheckoutFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutStartedData {
    pub checkout_id: AggregateId,
    pub domain_id: AggregateId,
    pub buyer_id: UserId,

    /// The listing price when the checkout started.
    pub amount: Money,

    pub currency: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    pub step_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCompletedData {
    pub step_name: String,

    /// Provider payment reference (set after capture_payment).
    pub payment_id: Option<String>,

    /// Provider order reference (set after capture_payment, when known).
    #[serde(default)]
    pub order_id: Option<String>,

    /// Transaction of record (set after commit_sale).
    pub transaction_id: Option<AggregateId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_name: String,

    /// Stable error code, e.g. `ALREADY_SOLD` or `PAYMENT_TIMEOUT`.
    pub code: String,

    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step whose failure triggered compensation.
    pub from_step: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundFlaggedData {
    pub checkout_id: AggregateId,
    pub domain_id: AggregateId,
    pub buyer_id: UserId,
    pub payment_id: String,
    pub amount: Money,

    /// Error code of the failure that left the payment without a sale.
    pub reason: String,

    pub flagged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCompletedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl CheckoutEvent {
    pub fn checkout_started(
        checkout_id: AggregateId,
        domain_id: AggregateId,
        buyer_id: UserId,
        amount: Money,
        currency: impl Into<String>,
    ) -> Self {
        CheckoutEvent::CheckoutStarted(CheckoutStartedData {
            checkout_id,
            domain_id,
            buyer_id,
            amount,
            currency: currency.into(),
            started_at: Utc::now(),
        })
    }

    pub fn step_started(step_name: impl Into<String>) -> Self {
        CheckoutEvent::StepStarted(StepData {
            step_name: step_name.into(),
        })
    }

    pub fn payment_captured(
        step_name: impl Into<String>,
        payment_id: impl Into<String>,
        order_id: Option<String>,
    ) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            payment_id: Some(payment_id.into()),
            order_id,
            transaction_id: None,
        })
    }

    pub fn sale_committed(step_name: impl Into<String>, transaction_id: AggregateId) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            payment_id: None,
            order_id: None,
            transaction_id: Some(transaction_id),
        })
    }

    pub fn step_failed(
        step_name: impl Into<String>,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        CheckoutEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            code: code.into(),
            error: error.into(),
        })
    }

    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        CheckoutEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    pub fn checkout_completed() -> Self {
        CheckoutEvent::CheckoutCompleted(CheckoutCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn checkout_failed(reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutFailed(CheckoutFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let checkout_id = AggregateId::new();
        let domain_id = AggregateId::new();

        assert_eq!(
            CheckoutEvent::checkout_started(
                checkout_id,
                domain_id,
                UserId::new(),
                Money::from_dollars(10),
                "USD"
            )
            .event_type(),
            "CheckoutStarted"
        );
        assert_eq!(
            CheckoutEvent::step_started("capture_payment").event_type(),
            "StepStarted"
        );
        assert_eq!(
            CheckoutEvent::payment_captured("capture_payment", "PAY-1", None).event_type(),
            "StepCompleted"
        );
        assert_eq!(
            CheckoutEvent::step_failed("commit_sale", "ALREADY_SOLD", "sold").event_type(),
            "StepFailed"
        );
        assert_eq!(
            CheckoutEvent::compensation_started("commit_sale").event_type(),
            "CompensationStarted"
        );
        assert_eq!(
            CheckoutEvent::checkout_completed().event_type(),
            "CheckoutCompleted"
        );
        assert_eq!(
            CheckoutEvent::checkout_failed("timeout").event_type(),
            "CheckoutFailed"
        );
    }

    #[test]
    fn test_refund_flagged_payload_shape() {
        let event = CheckoutEvent::RefundFlagged(RefundFlaggedData {
            checkout_id: AggregateId::new(),
            domain_id: AggregateId::new(),
            buyer_id: UserId::new(),
            payment_id: "PAY-9".into(),
            amount: Money::from_cents(1999),
            reason: "ALREADY_SOLD".into(),
            flagged_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RefundFlagged");
        assert_eq!(json["data"]["payment_id"], "PAY-9");
        assert_eq!(json["data"]["amount"], 1999);

        let back: CheckoutEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type(), "RefundFlagged");
    }

    #[test]
    fn test_step_completed_tolerates_missing_order_id() {
        let json = serde_json::json!({
            "type": "StepCompleted",
            "data": {
                "step_name": "capture_payment",
                "payment_id": "PAY-1",
                "transaction_id": null
            }
        });

        match serde_json::from_value::<CheckoutEvent>(json).unwrap() {
            CheckoutEvent::StepCompleted(data) => {
                assert_eq!(data.payment_id.as_deref(), Some("PAY-1"));
                assert!(data.order_id.is_none());
            }
            other => panic!("expected StepCompleted, got {}", other.event_type()),
        }
    }
}
