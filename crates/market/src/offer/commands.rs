//! Offer commands.

use common::AggregateId;

use crate::command::Command;
use crate::money::Money;

use super::{Decision, Offer, OfferForm};

/// Command to propose a price for a listed domain.
///
/// The buyer is the caller of the session the command runs under.
#[derive(Debug, Clone)]
pub struct SubmitOffer {
    pub offer_id: AggregateId,
    pub domain_id: AggregateId,
    pub amount: Money,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub message: Option<String>,
    pub form: OfferForm,
}

impl SubmitOffer {
    pub fn new(domain_id: AggregateId, amount: Money, contact_email: impl Into<String>) -> Self {
        Self {
            offer_id: AggregateId::new(),
            domain_id,
            amount,
            contact_email: contact_email.into().trim().to_string(),
            contact_phone: None,
            message: None,
            form: OfferForm::Simple,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.contact_phone = Some(phone.into().trim().to_string()).filter(|p| !p.is_empty());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into().trim().to_string()).filter(|m| !m.is_empty());
        self
    }

    /// Holds the amount to the listing's minimum offer.
    pub fn detailed(mut self) -> Self {
        self.form = OfferForm::Detailed;
        self
    }
}

impl Command for SubmitOffer {
    type Aggregate = Offer;

    fn aggregate_id(&self) -> AggregateId {
        self.offer_id
    }
}

/// Command to accept or reject a pending offer.
#[derive(Debug, Clone)]
pub struct ResolveOffer {
    pub offer_id: AggregateId,
    pub decision: Decision,
}

impl ResolveOffer {
    pub fn new(offer_id: AggregateId, decision: Decision) -> Self {
        Self { offer_id, decision }
    }

    pub fn accept(offer_id: AggregateId) -> Self {
        Self::new(offer_id, Decision::Accept)
    }

    pub fn reject(offer_id: AggregateId) -> Self {
        Self::new(offer_id, Decision::Reject)
    }
}

impl Command for ResolveOffer {
    type Aggregate = Offer;

    fn aggregate_id(&self) -> AggregateId {
        self.offer_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_optional_fields_are_dropped() {
        let cmd = SubmitOffer::new(AggregateId::new(), Money::from_dollars(5), " a@b.co ")
            .with_phone("   ")
            .with_message("");
        assert_eq!(cmd.contact_email, "a@b.co");
        assert!(cmd.contact_phone.is_none());
        assert!(cmd.message.is_none());
        assert_eq!(cmd.form, OfferForm::Simple);
    }

    #[test]
    fn each_submission_gets_its_own_stream() {
        let domain = AggregateId::new();
        let a = SubmitOffer::new(domain, Money::from_dollars(5), "a@b.co");
        let b = SubmitOffer::new(domain, Money::from_dollars(5), "a@b.co");
        assert_ne!(a.aggregate_id(), b.aggregate_id());
    }
}
