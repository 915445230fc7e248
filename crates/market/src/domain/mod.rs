//! Domain listing aggregate and related types.

mod aggregate;
mod commands;
mod events;
pub mod guard;
mod service;
mod state;

pub use aggregate::{Domain, SaleRecord};
pub use commands::{ListDomain, UpdateListing};
pub use events::{
    DomainDelistedData, DomainEvent, DomainListedData, DomainReleasedData, DomainReservedData,
    DomainSoldData, ListingUpdatedData,
};
pub use service::DomainService;
pub use state::{Category, DomainStatus, UnknownCategory};

use thiserror::Error;

/// Errors that can occur during listing operations.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Invalid domain name: {name}")]
    InvalidName { name: String },

    #[error("Invalid price: {cents} cents (must be greater than 0 and at most $1,000,000,000)")]
    InvalidPrice { cents: i64 },

    #[error("Invalid minimum offer: {cents} cents (must be positive and not above the price)")]
    InvalidMinimumOffer { cents: i64 },

    #[error("Domain {name} is already listed")]
    AlreadyListed { name: String },

    /// The domain has been sold; its listing can no longer change.
    #[error("Domain is already sold")]
    AlreadySold,

    #[error("Domain is not available (status: {status})")]
    NotAvailable { status: DomainStatus },

    #[error("Domain has been delisted")]
    Delisted,

    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: DomainStatus,
        action: &'static str,
    },
}
