//! Offer events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateEvent;
use crate::money::Money;

use super::OfferForm;

/// Events that can occur on an offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OfferEvent {
    /// A buyer proposed a price for a domain.
    OfferSubmitted(OfferSubmittedData),

    /// The seller accepted the offer.
    OfferAccepted(OfferResolvedData),

    /// The seller declined the offer.
    OfferRejected(OfferResolvedData),
}

impl AggregateEvent for OfferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OfferEvent::OfferSubmitted(_) => "OfferSubmitted",
            OfferEvent::OfferAccepted(_) => "OfferAccepted",
            OfferEvent::OfferRejected(_) => "OfferRejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferSubmittedData {
    pub offer_id: AggregateId,
    pub domain_id: AggregateId,

    /// Name of the domain at submission, carried for notifications.
    pub domain_name: String,

    pub buyer_id: UserId,

    /// Owner of the domain when the offer was made.
    pub seller_id: UserId,

    pub amount: Money,
    pub message: Option<String>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub form: OfferForm,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferResolvedData {
    pub resolved_by: UserId,
    pub resolved_at: DateTime<Utc>,
}

impl OfferEvent {
    pub fn offer_accepted(resolved_by: UserId) -> Self {
        OfferEvent::OfferAccepted(OfferResolvedData {
            resolved_by,
            resolved_at: Utc::now(),
        })
    }

    pub fn offer_rejected(resolved_by: UserId) -> Self {
        OfferEvent::OfferRejected(OfferResolvedData {
            resolved_by,
            resolved_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let seller = UserId::new();
        assert_eq!(OfferEvent::offer_accepted(seller).event_type(), "OfferAccepted");
        assert_eq!(OfferEvent::offer_rejected(seller).event_type(), "OfferRejected");
    }

    #[test]
    fn test_submitted_serialization() {
        let event = OfferEvent::OfferSubmitted(OfferSubmittedData {
            offer_id: AggregateId::new(),
            domain_id: AggregateId::new(),
            domain_name: "shop.com".to_string(),
            buyer_id: UserId::new(),
            seller_id: UserId::new(),
            amount: Money::from_dollars(900),
            message: Some("Would love this one".to_string()),
            contact_email: "buyer@example.com".to_string(),
            contact_phone: None,
            form: OfferForm::Detailed,
            submitted_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OfferSubmitted");
        assert_eq!(json["data"]["amount"], 90000);
        assert_eq!(json["data"]["form"], "detailed");

        let back: OfferEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type(), "OfferSubmitted");
    }
}
