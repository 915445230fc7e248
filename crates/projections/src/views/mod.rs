//! Read model views for the marketplace query side.

pub mod catalog;
pub mod dashboard;
pub mod refunds;

pub use catalog::{CatalogEntry, CatalogFilter, DomainCatalogView, PriceSort, UnknownSort};
pub use dashboard::{Dashboard, DashboardView, OfferSummary, OwnedDomain, PurchaseSummary};
pub use refunds::{RefundEntry, RefundQueueView};
