//! Marketplace core for the domain-name marketplace.
//!
//! This crate provides:
//! - Aggregate trait and CommandHandler for event-sourced entities
//! - Domain listing aggregate with its sale status guard
//! - Offer aggregate and the offer workflow
//! - Transaction aggregate and the atomic purchase commit
//! - Session and Notice types shared with the transport layer

pub mod aggregate;
pub mod command;
pub mod domain;
pub mod error;
pub mod money;
pub mod notice;
pub mod offer;
pub mod purchase;
pub mod session;
pub mod transaction;
pub mod validation;

pub use aggregate::{Aggregate, AggregateEvent};
pub use command::{Command, CommandHandler, CommandResult, Staged};
pub use domain::{
    Category, Domain, DomainEvent, DomainService, DomainStatus, ListDomain, ListingError,
    UpdateListing,
};
pub use error::MarketError;
pub use money::Money;
pub use notice::{Notice, NoticeKind};
pub use offer::{
    Decision, Offer, OfferError, OfferEvent, OfferForm, OfferService, OfferStatus, ResolveOffer,
    SubmitOffer,
};
pub use purchase::{PaymentConfirmation, PurchaseOutcome, PurchaseService};
pub use session::{Caller, Role, Session};
pub use transaction::{
    FailureReason, PaymentMethod, Transaction, TransactionError, TransactionEvent,
    TransactionStatus,
};
