//! Offer aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::Offer;
pub use commands::{ResolveOffer, SubmitOffer};
pub use events::{OfferEvent, OfferResolvedData, OfferSubmittedData};
pub use service::OfferService;
pub use state::{Decision, OfferForm, OfferStatus, UnknownDecision};

use thiserror::Error;

use crate::money::Money;

/// Errors that can occur during offer operations.
#[derive(Debug, Error)]
pub enum OfferError {
    /// Platform inventory is bought directly, never negotiated.
    #[error("Domain has no owner to make an offer to")]
    NoOwner,

    #[error("You cannot make an offer on your own domain")]
    SelfOffer,

    #[error("Domain {name} is not accepting offers")]
    DomainUnavailable { name: String },

    #[error("Offer of {amount} is below the minimum offer of {minimum}")]
    BelowMinimum { amount: Money, minimum: Money },

    #[error("Invalid offer amount: {cents} cents (must be at least $1.00)")]
    InvalidAmount { cents: i64 },

    #[error("Offer has already been submitted")]
    AlreadySubmitted,

    #[error("Only the seller can resolve this offer")]
    NotSeller,

    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OfferStatus,
        action: &'static str,
    },
}
