//! Listing service: administrative operations on the catalog.

use common::AggregateId;
use event_store::{EventEnvelope, EventStore};

use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult};
use crate::error::MarketError;
use crate::session::Session;

use super::{Domain, DomainEvent, ListDomain, ListingError, UpdateListing};

/// Service for managing domain listings.
///
/// Admins may manage any listing. Members may list domains they own and
/// manage their own listings.
pub struct DomainService<S: EventStore> {
    handler: CommandHandler<S, Domain>,
}

impl<S: EventStore> DomainService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Domain> {
        &self.handler
    }

    /// Puts a domain up for sale.
    ///
    /// Platform inventory (no owner) can only be listed by an admin. A member
    /// listing without an owner lists it as their own.
    #[tracing::instrument(skip(self, session), fields(name = %cmd.name))]
    pub async fn list_domain(
        &self,
        session: &Session,
        mut cmd: ListDomain,
    ) -> Result<CommandResult<Domain>, MarketError> {
        let caller = session.require_user()?;
        if !session.is_admin() {
            match cmd.owner_id {
                None => cmd.owner_id = Some(caller.user_id),
                Some(owner) if owner != caller.user_id => return Err(MarketError::Forbidden),
                Some(_) => {}
            }
            if cmd.owner_email.is_none() {
                cmd.owner_email = caller.email.clone();
            }
        }

        let domain_id = ListDomain::id_for_name(&cmd.name);
        let result = self
            .handler
            .execute(domain_id, Some(caller.user_id), |domain| domain.list(&cmd))
            .await?;

        tracing::info!(%domain_id, price = %cmd.price, "domain listed");
        Ok(result)
    }

    /// Changes the terms of a listing.
    #[tracing::instrument(skip(self, session))]
    pub async fn update_listing(
        &self,
        session: &Session,
        cmd: UpdateListing,
    ) -> Result<CommandResult<Domain>, MarketError> {
        self.manage(session, cmd.domain_id, |domain| domain.update_listing(&cmd))
            .await
    }

    /// Holds a domain back from offers and purchase.
    #[tracing::instrument(skip(self, session))]
    pub async fn reserve(
        &self,
        session: &Session,
        domain_id: AggregateId,
    ) -> Result<CommandResult<Domain>, MarketError> {
        self.manage(session, domain_id, Domain::reserve).await
    }

    /// Returns a reserved domain to the market.
    #[tracing::instrument(skip(self, session))]
    pub async fn release(
        &self,
        session: &Session,
        domain_id: AggregateId,
    ) -> Result<CommandResult<Domain>, MarketError> {
        self.manage(session, domain_id, Domain::release).await
    }

    /// Removes an unsold domain from the catalog.
    #[tracing::instrument(skip(self, session))]
    pub async fn delist(
        &self,
        session: &Session,
        domain_id: AggregateId,
    ) -> Result<CommandResult<Domain>, MarketError> {
        self.manage(session, domain_id, Domain::delist).await
    }

    /// Loads a domain by ID.
    ///
    /// Returns None if the domain was never listed.
    #[tracing::instrument(skip(self))]
    pub async fn get_domain(&self, domain_id: AggregateId) -> Result<Option<Domain>, MarketError> {
        self.handler.load_existing(domain_id).await
    }

    /// The full event history of a domain, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn history(&self, domain_id: AggregateId) -> Result<Vec<EventEnvelope>, MarketError> {
        let events = self
            .handler
            .store()
            .get_events_for_aggregate(domain_id)
            .await?;
        if events.is_empty() {
            return Err(MarketError::NotFound {
                aggregate_type: Domain::aggregate_type(),
                aggregate_id: domain_id,
            });
        }
        Ok(events)
    }

    async fn manage<F>(
        &self,
        session: &Session,
        domain_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<Domain>, MarketError>
    where
        F: FnOnce(&Domain) -> Result<Vec<DomainEvent>, ListingError>,
    {
        let caller = session.require_user()?;
        let domain = self.handler.load_required(domain_id).await?;

        if !session.is_admin() && domain.owner_id() != Some(caller.user_id) {
            return Err(MarketError::Forbidden);
        }

        let events = command_fn(&domain)?;
        self.handler
            .persist(domain_id, domain, events, Some(caller.user_id))
            .await
    }
}

impl<S: EventStore + Clone> Clone for DomainService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}
