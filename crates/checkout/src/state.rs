//! Checkout saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          ├──► Failed
///                          └──► Compensating ──► Failed
/// ```
///
/// A checkout only compensates once money has been captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    #[default]
    NotStarted,

    /// Steps are being executed.
    Running,

    /// A captured payment is being flagged for refund.
    Compensating,

    /// The domain was sold to the buyer (terminal state).
    Completed,

    /// The checkout ended without a sale (terminal state).
    Failed,
}

impl CheckoutState {
    pub fn can_run(&self) -> bool {
        matches!(self, CheckoutState::NotStarted)
    }

    pub fn can_compensate(&self) -> bool {
        matches!(self, CheckoutState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Completed | CheckoutState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::NotStarted => "NotStarted",
            CheckoutState::Running => "Running",
            CheckoutState::Compensating => "Compensating",
            CheckoutState::Completed => "Completed",
            CheckoutState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
