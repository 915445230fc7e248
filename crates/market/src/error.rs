//! Marketplace error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::domain::ListingError;
use crate::notice::Notice;
use crate::offer::OfferError;
use crate::transaction::TransactionError;

/// Errors that can occur during marketplace operations.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The operation needs a signed-in caller.
    #[error("Authentication required")]
    Unauthenticated,

    /// The caller is signed in but may not perform this operation.
    #[error("Operation not permitted for this user")]
    Forbidden,

    /// Malformed input, rejected before any state is read.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{aggregate_type} not found: {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    #[error("Listing error: {0}")]
    Listing(ListingError),

    #[error("Offer error: {0}")]
    Offer(OfferError),

    #[error("Transaction error: {0}")]
    Transaction(TransactionError),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ListingError> for MarketError {
    fn from(e: ListingError) -> Self {
        MarketError::Listing(e)
    }
}

impl From<OfferError> for MarketError {
    fn from(e: OfferError) -> Self {
        MarketError::Offer(e)
    }
}

impl From<TransactionError> for MarketError {
    fn from(e: TransactionError) -> Self {
        MarketError::Transaction(e)
    }
}

impl MarketError {
    /// Stable machine-readable code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            MarketError::Unauthenticated => "UNAUTHENTICATED",
            MarketError::Forbidden => "FORBIDDEN",
            MarketError::Validation(_) => "VALIDATION_ERROR",
            MarketError::NotFound { .. } => "NOT_FOUND",
            MarketError::Listing(e) => match e {
                ListingError::AlreadySold => "ALREADY_SOLD",
                ListingError::NotAvailable { .. } | ListingError::Delisted => "DOMAIN_UNAVAILABLE",
                ListingError::AlreadyListed { .. } => "ALREADY_LISTED",
                ListingError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
                ListingError::InvalidName { .. }
                | ListingError::InvalidPrice { .. }
                | ListingError::InvalidMinimumOffer { .. } => "VALIDATION_ERROR",
            },
            MarketError::Offer(e) => match e {
                OfferError::NoOwner => "NO_OWNER",
                OfferError::BelowMinimum { .. } => "BELOW_MINIMUM",
                OfferError::DomainUnavailable { .. } => "DOMAIN_UNAVAILABLE",
                OfferError::NotSeller => "NOT_SELLER",
                OfferError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
                OfferError::SelfOffer
                | OfferError::InvalidAmount { .. }
                | OfferError::AlreadySubmitted => "VALIDATION_ERROR",
            },
            MarketError::Transaction(e) => match e {
                TransactionError::AlreadyRecorded { .. } => "ALREADY_RECORDED",
                TransactionError::PaymentReused { .. } | TransactionError::EmptyPaymentId => {
                    "PAYMENT_ERROR"
                }
            },
            MarketError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => "CONFLICT",
            MarketError::EventStore(_) | MarketError::Serialization(_) => "STORE_ERROR",
        }
    }

    /// Returns true when repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MarketError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => true,
            MarketError::EventStore(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if the domain was sold before this operation could.
    pub fn is_already_sold(&self) -> bool {
        matches!(self, MarketError::Listing(ListingError::AlreadySold))
    }

    /// The notice shown to the user for this failure.
    pub fn notice(&self) -> Notice {
        let title = match self.code() {
            "UNAUTHENTICATED" => "Sign in required",
            "FORBIDDEN" => "Not allowed",
            "VALIDATION_ERROR" => "Please check your input",
            "NOT_FOUND" => "Not found",
            "NO_OWNER" => "Offers not accepted",
            "BELOW_MINIMUM" => "Offer too low",
            "DOMAIN_UNAVAILABLE" => "Domain unavailable",
            "ALREADY_SOLD" => "Domain already sold",
            "ALREADY_LISTED" => "Already listed",
            "NOT_SELLER" => "Not your offer",
            "INVALID_STATE_TRANSITION" => "Action not possible",
            "PAYMENT_ERROR" => "Payment problem",
            "ALREADY_RECORDED" => "Payment already recorded",
            "CONFLICT" => "Please try again",
            _ => "Something went wrong",
        };

        let message = match self {
            MarketError::Offer(OfferError::NoOwner) => {
                "This domain is sold directly by the platform. Use Buy Now instead.".to_string()
            }
            MarketError::Offer(OfferError::BelowMinimum { minimum, .. }) => {
                format!("The seller only considers offers of {minimum} or more.")
            }
            MarketError::Listing(ListingError::AlreadySold) => {
                "Someone else completed this purchase first. Any payment you made will be refunded."
                    .to_string()
            }
            MarketError::Transaction(TransactionError::AlreadyRecorded { payment_id }) => {
                format!(
                    "Payment {payment_id} could not buy this domain and will be refunded. \
                     Start a new checkout to buy it."
                )
            }
            MarketError::EventStore(_) | MarketError::Serialization(_) => {
                "We could not reach the marketplace. Please try again shortly.".to_string()
            }
            other => other.to_string(),
        };

        Notice::error(title, message)
    }
}
