//! Offer aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::domain::Domain;
use crate::money::Money;

use super::{
    Decision, OfferError, OfferEvent, OfferForm, OfferStatus, SubmitOffer,
    events::{OfferResolvedData, OfferSubmittedData},
};

/// Offer aggregate root: one buyer's proposal for one domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Offer {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    domain_id: Option<AggregateId>,
    domain_name: String,
    buyer_id: Option<UserId>,
    seller_id: Option<UserId>,
    amount: Money,
    message: Option<String>,
    contact_email: String,
    contact_phone: Option<String>,
    form: OfferForm,
    status: OfferStatus,
    created_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
}

impl Aggregate for Offer {
    type Event = OfferEvent;
    type Error = OfferError;

    fn aggregate_type() -> &'static str {
        "Offer"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OfferEvent::OfferSubmitted(data) => self.apply_submitted(data),
            OfferEvent::OfferAccepted(data) => self.apply_resolved(OfferStatus::Accepted, data),
            OfferEvent::OfferRejected(data) => self.apply_resolved(OfferStatus::Rejected, data),
        }
    }
}

// Query methods
impl Offer {
    pub fn domain_id(&self) -> Option<AggregateId> {
        self.domain_id
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn seller_id(&self) -> Option<UserId> {
        self.seller_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn contact_email(&self) -> &str {
        &self.contact_email
    }

    pub fn contact_phone(&self) -> Option<&str> {
        self.contact_phone.as_deref()
    }

    pub fn form(&self) -> OfferForm {
        self.form
    }

    pub fn status(&self) -> OfferStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }
}

// Command methods (return events)
impl Offer {
    /// Submits an offer from `buyer_id` on `domain`.
    ///
    /// Checks, in order: the domain has a seller, the buyer is not that
    /// seller, the domain is open for offers, and the amount clears the floor
    /// of the chosen form.
    pub fn submit(
        &self,
        domain: &Domain,
        buyer_id: UserId,
        cmd: &SubmitOffer,
    ) -> Result<Vec<OfferEvent>, OfferError> {
        if self.id.is_some() {
            return Err(OfferError::AlreadySubmitted);
        }

        let (Some(domain_id), Some(seller_id)) = (domain.id(), domain.owner_id()) else {
            return Err(OfferError::NoOwner);
        };
        if seller_id == buyer_id {
            return Err(OfferError::SelfOffer);
        }
        if !domain.can_receive_offer() {
            return Err(OfferError::DomainUnavailable {
                name: domain.name().to_string(),
            });
        }

        check_amount(cmd.amount, cmd.form, domain)?;

        Ok(vec![OfferEvent::OfferSubmitted(OfferSubmittedData {
            offer_id: cmd.offer_id,
            domain_id,
            domain_name: domain.name().to_string(),
            buyer_id,
            seller_id,
            amount: cmd.amount,
            message: cmd.message.clone(),
            contact_email: cmd.contact_email.clone(),
            contact_phone: cmd.contact_phone.clone(),
            form: cmd.form,
            submitted_at: Utc::now(),
        })])
    }

    /// Records the seller's decision. Resolving never moves the domain.
    pub fn resolve(
        &self,
        resolved_by: UserId,
        decision: Decision,
    ) -> Result<Vec<OfferEvent>, OfferError> {
        if self.seller_id != Some(resolved_by) {
            return Err(OfferError::NotSeller);
        }
        if !self.status.can_resolve() {
            return Err(OfferError::InvalidStateTransition {
                current_state: self.status,
                action: match decision {
                    Decision::Accept => "accept",
                    Decision::Reject => "reject",
                },
            });
        }

        Ok(vec![match decision {
            Decision::Accept => OfferEvent::offer_accepted(resolved_by),
            Decision::Reject => OfferEvent::offer_rejected(resolved_by),
        }])
    }
}

// Apply event helpers
impl Offer {
    fn apply_submitted(&mut self, data: OfferSubmittedData) {
        self.id = Some(data.offer_id);
        self.domain_id = Some(data.domain_id);
        self.domain_name = data.domain_name;
        self.buyer_id = Some(data.buyer_id);
        self.seller_id = Some(data.seller_id);
        self.amount = data.amount;
        self.message = data.message;
        self.contact_email = data.contact_email;
        self.contact_phone = data.contact_phone;
        self.form = data.form;
        self.status = OfferStatus::Pending;
        self.created_at = Some(data.submitted_at);
    }

    fn apply_resolved(&mut self, status: OfferStatus, data: OfferResolvedData) {
        self.status = status;
        self.resolved_at = Some(data.resolved_at);
    }
}

/// Validates `amount` against the floor of `form`.
///
/// Exposed so callers can reject bad input before loading anything.
pub(crate) fn check_amount(
    amount: Money,
    form: OfferForm,
    domain: &Domain,
) -> Result<(), OfferError> {
    check_amount_shape(amount)?;
    if form == OfferForm::Detailed {
        let minimum = domain.effective_minimum_offer();
        if amount < minimum {
            return Err(OfferError::BelowMinimum { amount, minimum });
        }
    }
    Ok(())
}

/// The part of the amount check that does not depend on the listing.
pub(crate) fn check_amount_shape(amount: Money) -> Result<(), OfferError> {
    if amount < Money::MIN_SIMPLE_OFFER {
        return Err(OfferError::InvalidAmount {
            cents: amount.cents(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, ListDomain};

    fn domain(owner: Option<UserId>, price: i64) -> Domain {
        let mut cmd = ListDomain::new("shop.com", Money::from_dollars(price), Category::Premium);
        if let Some(owner) = owner {
            cmd = cmd.owned_by(owner);
        }
        let mut domain = Domain::default();
        domain.apply_events(domain.list(&cmd).unwrap());
        domain
    }

    fn offer(domain: &Domain, dollars: i64) -> SubmitOffer {
        SubmitOffer::new(domain.id().unwrap(), Money::from_dollars(dollars), "buyer@example.com")
            .detailed()
    }

    #[test]
    fn test_submit_offer() {
        let seller = UserId::new();
        let buyer = UserId::new();
        let d = domain(Some(seller), 1000);
        let cmd = offer(&d, 900);

        let mut o = Offer::default();
        o.apply_events(o.submit(&d, buyer, &cmd).unwrap());

        assert_eq!(o.id(), Some(cmd.offer_id));
        assert_eq!(o.status(), OfferStatus::Pending);
        assert_eq!(o.seller_id(), Some(seller));
        assert_eq!(o.buyer_id(), Some(buyer));
        assert_eq!(o.amount(), Money::from_dollars(900));
        assert!(o.created_at().is_some());
        assert!(o.resolved_at().is_none());
    }

    #[test]
    fn test_detailed_form_enforces_minimum() {
        let d = domain(Some(UserId::new()), 1000);

        let result = Offer::default().submit(&d, UserId::new(), &offer(&d, 700));
        assert!(matches!(
            result,
            Err(OfferError::BelowMinimum { minimum, .. }) if minimum == Money::from_dollars(800)
        ));

        // The boundary itself is accepted.
        assert!(Offer::default().submit(&d, UserId::new(), &offer(&d, 800)).is_ok());
    }

    #[test]
    fn test_simple_form_only_requires_a_dollar() {
        let d = domain(Some(UserId::new()), 1000);
        let low = SubmitOffer::new(d.id().unwrap(), Money::from_dollars(1), "b@example.com");
        assert!(Offer::default().submit(&d, UserId::new(), &low).is_ok());

        let cents = SubmitOffer::new(d.id().unwrap(), Money::from_cents(99), "b@example.com");
        assert!(matches!(
            Offer::default().submit(&d, UserId::new(), &cents),
            Err(OfferError::InvalidAmount { cents: 99 })
        ));
    }

    #[test]
    fn test_unowned_domain_rejects_offers() {
        let d = domain(None, 1000);
        for dollars in [1, 800, 5000] {
            assert!(matches!(
                Offer::default().submit(&d, UserId::new(), &offer(&d, dollars)),
                Err(OfferError::NoOwner)
            ));
        }
    }

    #[test]
    fn test_owner_cannot_offer_on_own_domain() {
        let seller = UserId::new();
        let d = domain(Some(seller), 1000);
        assert!(matches!(
            Offer::default().submit(&d, seller, &offer(&d, 900)),
            Err(OfferError::SelfOffer)
        ));
    }

    #[test]
    fn test_reserved_domain_rejects_offers() {
        let mut d = domain(Some(UserId::new()), 1000);
        d.apply_events(d.reserve().unwrap());
        assert!(matches!(
            Offer::default().submit(&d, UserId::new(), &offer(&d, 900)),
            Err(OfferError::DomainUnavailable { .. })
        ));
    }

    #[test]
    fn test_resolve_offer() {
        let seller = UserId::new();
        let d = domain(Some(seller), 1000);
        let mut o = Offer::default();
        o.apply_events(o.submit(&d, UserId::new(), &offer(&d, 900)).unwrap());

        assert!(matches!(
            o.resolve(UserId::new(), Decision::Accept),
            Err(OfferError::NotSeller)
        ));

        o.apply_events(o.resolve(seller, Decision::Accept).unwrap());
        assert_eq!(o.status(), OfferStatus::Accepted);
        assert!(o.resolved_at().is_some());

        assert!(matches!(
            o.resolve(seller, Decision::Reject),
            Err(OfferError::InvalidStateTransition {
                current_state: OfferStatus::Accepted,
                action: "reject",
            })
        ));
    }

    #[test]
    fn test_cannot_submit_twice_on_one_stream() {
        let d = domain(Some(UserId::new()), 1000);
        let cmd = offer(&d, 900);
        let mut o = Offer::default();
        o.apply_events(o.submit(&d, UserId::new(), &cmd).unwrap());

        assert!(matches!(
            o.submit(&d, UserId::new(), &cmd),
            Err(OfferError::AlreadySubmitted)
        ));
    }
}
