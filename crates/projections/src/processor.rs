//! Feeds the store's global event stream to the registered projections.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Keeps the catalog, dashboards, refund queue and owner notifier in step
/// with the event store.
///
/// Catch-up is incremental: each projection only receives the events past
/// its own position. Runs are serialized, so every write may trigger one
/// without an event being handled twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        tracing::debug!(projection = projection.name(), "projection registered");
        self.projections.push(projection);
    }

    /// Delivers every event the projections have not seen yet and returns
    /// how many deliveries were made.
    ///
    /// A store outage surfaces as a retryable error; projections keep what
    /// they had and resume from their positions on the next run.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;

        let mut stream = self.store.stream_all_events().await?;
        let mut index: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            index += 1;

            for projection in &self.projections {
                if projection.position().await.is_behind(index) {
                    projection.handle(&event).await?;
                    delivered += 1;
                    metrics::counter!(
                        "projection_events_total",
                        "projection" => projection.name()
                    )
                    .increment(1);
                }
            }
        }

        if delivered > 0 {
            tracing::debug!(events = index, delivered, "read models caught up");
        }
        Ok(delivered)
    }

    /// Drops every read model and replays the whole store into it.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
            tracing::info!(projection = projection.name(), "projection reset");
        }
        self.run_catch_up().await
    }
}
