//! Read models, projections and owner notifications for the marketplace.
//!
//! This crate provides the query side of the CQRS pattern:
//! - [`Projection`] trait for processing events into read models
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - Three read model views: the domain catalog, user dashboards and the
//!   refund queue
//! - The [`notify`] subscriber that mails domain owners about offers and sales

pub mod error;
pub mod notify;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use notify::{
    FeedbackMessage, HttpMailer, InMemoryMailer, Mailer, MailerConfig, Notification,
    NotifyError, OwnerNotifier, run_dispatcher,
};
pub use processor::ProjectionProcessor;
pub use projection::{MarketEvent, Projection, ProjectionPosition, ReadModel};
pub use views::{
    CatalogEntry, CatalogFilter, Dashboard, DashboardView, DomainCatalogView, PriceSort,
    RefundEntry, RefundQueueView,
};
