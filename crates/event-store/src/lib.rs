//! Append-only event storage for the marketplace aggregates.
//!
//! Every listing, offer, transaction and checkout is an event stream keyed by
//! an [`AggregateId`]. Writes are guarded by optimistic concurrency on the
//! stream version, and several streams can be written in one atomic commit.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{AggregateId, UserId};
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream, StreamWrite};
