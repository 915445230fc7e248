//! Checkout error types.

use common::AggregateId;
use event_store::EventStoreError;
use market::{MarketError, Notice};
use thiserror::Error;

/// Errors that can occur during a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The marketplace rejected the purchase (sold, unavailable, not signed in...).
    #[error(transparent)]
    Market(#[from] MarketError),

    /// The payment provider failed or declined.
    #[error("Payment failed: {0}")]
    Payment(String),

    /// The payment round trip took longer than allowed.
    #[error("Payment timed out after {seconds}s")]
    PaymentTimeout { seconds: u64 },

    /// The caller went away before the payment finished.
    #[error("Checkout cancelled")]
    Cancelled,

    /// Money was captured but the sale is not settled. Confirming the same
    /// payment again finishes it without charging the buyer twice.
    #[error("Payment {payment_id} captured but not settled: {source}")]
    Unsettled {
        checkout_id: AggregateId,
        payment_id: String,
        source: Box<CheckoutError>,
    },

    /// Checkout not found.
    #[error("Checkout not found: {0}")]
    NotFound(AggregateId),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Stable machine-readable code, shared with [`MarketError::code`].
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::Market(e) => e.code(),
            CheckoutError::Payment(_) => "PAYMENT_ERROR",
            CheckoutError::PaymentTimeout { .. } => "PAYMENT_TIMEOUT",
            CheckoutError::Cancelled => "CANCELLED",
            CheckoutError::Unsettled { .. } => "PAYMENT_UNSETTLED",
            CheckoutError::NotFound(_) => "NOT_FOUND",
            CheckoutError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => "CONFLICT",
            CheckoutError::EventStore(_) | CheckoutError::Serialization(_) => "STORE_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::Market(e) => e.is_retryable(),
            CheckoutError::PaymentTimeout { .. } | CheckoutError::Unsettled { .. } => true,
            CheckoutError::EventStore(e) => {
                e.is_retryable() || matches!(e, EventStoreError::ConcurrencyConflict { .. })
            }
            _ => false,
        }
    }

    /// The checkout and payment a buyer should confirm again, when money
    /// was taken without a sale or a refund to show for it.
    pub fn unsettled_payment(&self) -> Option<(AggregateId, &str)> {
        match self {
            CheckoutError::Unsettled {
                checkout_id,
                payment_id,
                ..
            } => Some((*checkout_id, payment_id)),
            _ => None,
        }
    }

    pub fn is_already_sold(&self) -> bool {
        matches!(self, CheckoutError::Market(e) if e.is_already_sold())
    }

    /// The notice shown to the buyer.
    pub fn notice(&self) -> Notice {
        match self {
            CheckoutError::Market(e) => e.notice(),
            CheckoutError::Payment(_) => Notice::error(
                "Payment problem",
                "Your payment could not be completed. You have not been charged.",
            ),
            CheckoutError::PaymentTimeout { .. } => Notice::error(
                "Payment timed out",
                "The payment provider did not respond in time. Please try again.",
            ),
            CheckoutError::Cancelled => {
                Notice::error("Checkout cancelled", "The checkout was cancelled.")
            }
            CheckoutError::Unsettled { payment_id, .. } => Notice::error(
                "Payment received",
                format!(
                    "Your payment {payment_id} was received but the purchase is not finished. \
                     Confirm this payment again instead of paying a second time."
                ),
            ),
            CheckoutError::NotFound(_) => Notice::error("Not found", self.to_string()),
            CheckoutError::EventStore(_) | CheckoutError::Serialization(_) => Notice::error(
                "Something went wrong",
                "We could not reach the marketplace. Please try again shortly.",
            ),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
