//! Checkout saga aggregate.

use common::{AggregateId, UserId};
use event_store::Version;
use market::{Aggregate, Money};
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;
use crate::events::CheckoutEvent;
use crate::state::CheckoutState;

/// A payment the checkout captured but could not turn into a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedRefund {
    pub payment_id: String,
    pub amount: Money,
    pub reason: String,
}

/// An event-sourced purchase saga: one buyer paying for one domain.
///
/// Records each step of the checkout and the context it accumulates, so a
/// checkout can be inspected after the fact and captured payments that did
/// not buy anything can be found and refunded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkout {
    id: Option<AggregateId>,
    version: Version,
    domain_id: Option<AggregateId>,
    buyer_id: Option<UserId>,
    amount: Money,
    currency: String,
    state: CheckoutState,
    current_step: usize,
    completed_steps: Vec<String>,
    payment_id: Option<String>,
    order_id: Option<String>,
    transaction_id: Option<AggregateId>,

    /// Error code of the step that failed, if any.
    failure_code: Option<String>,

    failure_reason: Option<String>,
    refund: Option<FlaggedRefund>,
}

impl Aggregate for Checkout {
    type Event = CheckoutEvent;
    type Error = CheckoutError;

    fn aggregate_type() -> &'static str {
        "Checkout"
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
            CheckoutEvent::CheckoutStarted(data) => {
                self.id = Some(data.checkout_id);
                self.domain_id = Some(data.domain_id);
                self.buyer_id = Some(data.buyer_id);
                self.amount = data.amount;
                self.currency = data.currency;
                self.state = CheckoutState::Running;
            }
            CheckoutEvent::StepStarted(_) => {
                self.current_step += 1;
            }
            CheckoutEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step_name);
                if let Some(pid) = data.payment_id {
                    self.payment_id = Some(pid);
                }
                if let Some(oid) = data.order_id {
                    self.order_id = Some(oid);
                }
                if let Some(tid) = data.transaction_id {
                    self.transaction_id = Some(tid);
                }
            }
            CheckoutEvent::StepFailed(data) => {
                self.failure_code = Some(data.code);
                self.failure_reason = Some(data.error);
            }
            CheckoutEvent::CompensationStarted(_) => {
                self.state = CheckoutState::Compensating;
            }
            CheckoutEvent::RefundFlagged(data) => {
                self.refund = Some(FlaggedRefund {
                    payment_id: data.payment_id,
                    amount: data.amount,
                    reason: data.reason,
                });
            }
            CheckoutEvent::CheckoutCompleted(_) => {
                self.state = CheckoutState::Completed;
            }
            CheckoutEvent::CheckoutFailed(data) => {
                self.state = CheckoutState::Failed;
                self.failure_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl Checkout {
    pub fn state(&self) -> CheckoutState {
        self.state
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

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Provider reference of the captured payment, once captured.
    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    /// The sale of record, once committed.
    pub fn transaction_id(&self) -> Option<AggregateId> {
        self.transaction_id
    }

    pub fn failure_code(&self) -> Option<&str> {
        self.failure_code.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn refund(&self) -> Option<&FlaggedRefund> {
        self.refund.as_ref()
    }

    /// True once money has been taken from the buyer.
    pub fn has_captured_payment(&self) -> bool {
        self.payment_id.is_some()
    }
}
