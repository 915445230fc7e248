//! Identifier types shared across the marketplace crates.

mod types;

pub use types::{AggregateId, UserId};
