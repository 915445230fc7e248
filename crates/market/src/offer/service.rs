//! Offer service: submitting and resolving offers.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::domain::Domain;
use crate::error::MarketError;
use crate::session::Session;
use crate::validation::{is_valid_email, is_valid_phone};

use super::aggregate::check_amount_shape;
use super::{Offer, ResolveOffer, SubmitOffer};

/// Service for the offer workflow.
///
/// Reads the target domain from its own stream and records each offer on a
/// stream of its own; submitting an offer never writes to the domain.
pub struct OfferService<S: EventStore> {
    domains: CommandHandler<S, Domain>,
    handler: CommandHandler<S, Offer>,
}

impl<S: EventStore + Clone> OfferService<S> {
    pub fn new(store: S) -> Self {
        Self {
            domains: CommandHandler::new(store.clone()),
            handler: CommandHandler::new(store),
        }
    }
}

impl<S: EventStore> OfferService<S> {
    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Offer> {
        &self.handler
    }

    /// Submits an offer on behalf of the session's caller.
    ///
    /// Input is validated before anything is read. Nothing is persisted
    /// unless every check passes.
    #[tracing::instrument(skip(self, session), fields(domain_id = %cmd.domain_id, amount = %cmd.amount))]
    pub async fn submit_offer(
        &self,
        session: &Session,
        cmd: SubmitOffer,
    ) -> Result<CommandResult<Offer>, MarketError> {
        let caller = session.require_user()?;
        validate_input(&cmd)?;

        let domain = self.domains.load_required(cmd.domain_id).await?;
        let offer = self.handler.load(cmd.offer_id).await?;
        let events = offer.submit(&domain, caller.user_id, &cmd)?;

        let result = self
            .handler
            .persist(cmd.offer_id, offer, events, Some(caller.user_id))
            .await?;

        metrics::counter!("offers_submitted_total", "form" => cmd.form.as_str()).increment(1);
        tracing::info!(offer_id = %cmd.offer_id, buyer_id = %caller.user_id, "offer submitted");

        Ok(result)
    }

    /// Accepts or rejects a pending offer. Only the seller of record may.
    #[tracing::instrument(skip(self, session))]
    pub async fn resolve_offer(
        &self,
        session: &Session,
        cmd: ResolveOffer,
    ) -> Result<CommandResult<Offer>, MarketError> {
        let caller = session.require_user()?;
        let offer = self.handler.load_required(cmd.offer_id).await?;
        let events = offer.resolve(caller.user_id, cmd.decision)?;

        let result = self
            .handler
            .persist(cmd.offer_id, offer, events, Some(caller.user_id))
            .await?;

        tracing::info!(
            offer_id = %cmd.offer_id,
            status = %result.aggregate.status(),
            "offer resolved"
        );
        Ok(result)
    }

    /// Loads an offer by ID.
    ///
    /// Returns None if the offer doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_offer(&self, offer_id: AggregateId) -> Result<Option<Offer>, MarketError> {
        self.handler.load_existing(offer_id).await
    }
}

impl<S: EventStore + Clone> Clone for OfferService<S> {
    fn clone(&self) -> Self {
        Self {
            domains: self.domains.clone(),
            handler: self.handler.clone(),
        }
    }
}

fn validate_input(cmd: &SubmitOffer) -> Result<(), MarketError> {
    check_amount_shape(cmd.amount)?;
    if !is_valid_email(&cmd.contact_email) {
        return Err(MarketError::Validation(format!(
            "invalid contact email: {}",
            cmd.contact_email
        )));
    }
    if let Some(phone) = &cmd.contact_phone
        && !is_valid_phone(phone)
    {
        return Err(MarketError::Validation(format!(
            "invalid contact phone: {phone}"
        )));
    }
    Ok(())
}
