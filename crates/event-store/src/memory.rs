use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{EventStore, EventStream, StreamWrite, validate_writes},
};

#[derive(Default)]
struct State {
    /// Every event in insertion order.
    log: Vec<EventEnvelope>,
    /// Current version of each stream.
    versions: HashMap<AggregateId, Version>,
}

impl State {
    fn version_of(&self, aggregate_id: AggregateId) -> Version {
        self.versions
            .get(&aggregate_id)
            .copied()
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store implementation for tests and local runs.
///
/// Provides the same interface and guarantees as the PostgreSQL store.
/// [`set_unavailable`](Self::set_unavailable) makes every call fail with a
/// retryable error, which lets callers exercise their outage paths.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<State>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.log.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.log.clear();
        state.versions.clear();
    }

    /// Simulates an outage: while set, every call returns `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable(
                "in-memory store is switched off".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_streams(&self, writes: Vec<StreamWrite>) -> Result<Vec<Version>> {
        self.check_available()?;
        validate_writes(&writes)?;

        let mut state = self.state.write().await;

        // Check every expectation before touching the log.
        for write in &writes {
            let first = &write.events[0];
            let aggregate_id = first.aggregate_id;
            let current = state.version_of(aggregate_id);

            if let Some(expected) = write.options.expected_version
                && current != expected
            {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual: current,
                });
            }

            // Unique (stream, version) constraint.
            if first.version != current.next() {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: write.options.expected_version.unwrap_or(current),
                    actual: current,
                });
            }
        }

        let mut versions = Vec::with_capacity(writes.len());
        for write in writes {
            let aggregate_id = write.events[0].aggregate_id;
            let last = write
                .events
                .last()
                .map(|e| e.version)
                .unwrap_or(Version::initial());
            state.versions.insert(aggregate_id, last);
            state.log.extend(write.events);
            versions.push(last);
        }

        metrics::counter!("event_store_appends_total", "backend" => "memory").increment(1);
        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .log
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .log
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        self.check_available()?;
        let events = self.state.read().await.log.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        self.check_available()?;
        Ok(self.state.read().await.versions.get(&aggregate_id).copied())
    }
}
