//! Command handling infrastructure.

use std::marker::PhantomData;

use common::{AggregateId, UserId};
use event_store::{AppendOptions, EventEnvelope, EventStore, StreamWrite, Version};
use serde::{Serialize, de::DeserializeOwned};

use crate::aggregate::{Aggregate, AggregateEvent};
use crate::error::MarketError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Events produced against a loaded aggregate but not yet persisted.
///
/// Several staged commands can be committed together with
/// [`EventStore::append_streams`]; each carries the version its aggregate was
/// read at, so the commit fails if any of them moved in the meantime.
#[derive(Debug)]
pub struct Staged<A: Aggregate> {
    aggregate: A,
    events: Vec<A::Event>,
    write: StreamWrite,
}

impl<A: Aggregate> Staged<A> {
    /// The stream write to hand to the store.
    pub fn write(&self) -> &StreamWrite {
        &self.write
    }

    /// Moves the stream write out, leaving the staged events in place.
    pub fn take_write(&mut self) -> StreamWrite {
        StreamWrite::new(
            std::mem::take(&mut self.write.events),
            self.write.options.clone(),
        )
    }

    /// Applies the staged events once the store accepted them.
    pub fn committed(mut self, new_version: Version) -> CommandResult<A> {
        for event in &self.events {
            self.aggregate.apply(event.clone());
        }
        self.aggregate.set_version(new_version);
        CommandResult {
            aggregate: self.aggregate,
            events: self.events,
            new_version,
        }
    }
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate from the event store
/// 2. Executing the command to produce events
/// 3. Persisting the events under optimistic concurrency
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
    A::Event: DeserializeOwned + Serialize,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, MarketError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, MarketError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Loads an aggregate that must exist.
    pub async fn load_required(&self, aggregate_id: AggregateId) -> Result<A, MarketError> {
        self.load_existing(aggregate_id)
            .await?
            .ok_or(MarketError::NotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            })
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error. `actor` is recorded in
    /// the metadata of every event.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        actor: Option<UserId>,
        command_fn: F,
    ) -> Result<CommandResult<A>, MarketError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        MarketError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        let events = command_fn(&aggregate)?;
        self.persist(aggregate_id, aggregate, events, actor).await
    }

    /// Persists `events` produced against an aggregate the caller already
    /// loaded, guarded by the version it was loaded at.
    pub async fn persist(
        &self,
        aggregate_id: AggregateId,
        aggregate: A,
        events: Vec<A::Event>,
        actor: Option<UserId>,
    ) -> Result<CommandResult<A>, MarketError> {
        if events.is_empty() {
            let new_version = aggregate.version();
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version,
            });
        }

        let mut staged = self.stage(aggregate_id, aggregate, events, actor)?;
        let write = staged.take_write();
        let new_version = self.store.append(write.events, write.options).await?;
        Ok(staged.committed(new_version))
    }

    /// Builds the write for `events` against an already loaded aggregate
    /// without persisting it.
    pub fn stage(
        &self,
        aggregate_id: AggregateId,
        aggregate: A,
        events: Vec<A::Event>,
        actor: Option<UserId>,
    ) -> Result<Staged<A>, MarketError> {
        let current_version = aggregate.version();
        let envelopes = Self::build_envelopes(aggregate_id, current_version, &events, actor)?;

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };

        Ok(Staged {
            aggregate,
            events,
            write: StreamWrite::new(envelopes, options),
        })
    }

    fn build_envelopes(
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
        actor: Option<UserId>,
    ) -> Result<Vec<EventEnvelope>, MarketError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .actor(actor)
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}

impl<S, A> Clone for CommandHandler<S, A>
where
    S: EventStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}
