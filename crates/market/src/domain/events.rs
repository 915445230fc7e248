//! Domain listing events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateEvent;
use crate::money::Money;

use super::Category;

/// Events that can occur on a domain listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    /// Domain was put up for sale.
    DomainListed(DomainListedData),

    /// Price, minimum offer, description, category or featured flag changed.
    ListingUpdated(ListingUpdatedData),

    /// Domain was held back from sale.
    DomainReserved(DomainReservedData),

    /// A reserved domain was made available again.
    DomainReleased(DomainReleasedData),

    /// Domain was taken out of the catalog.
    DomainDelisted(DomainDelistedData),

    /// Domain was purchased and now belongs to the buyer.
    DomainSold(DomainSoldData),
}

impl AggregateEvent for DomainEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::DomainListed(_) => "DomainListed",
            DomainEvent::ListingUpdated(_) => "ListingUpdated",
            DomainEvent::DomainReserved(_) => "DomainReserved",
            DomainEvent::DomainReleased(_) => "DomainReleased",
            DomainEvent::DomainDelisted(_) => "DomainDelisted",
            DomainEvent::DomainSold(_) => "DomainSold",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainListedData {
    pub domain_id: AggregateId,

    /// Domain name as entered, e.g. `"shop.com"`.
    pub name: String,

    pub description: Option<String>,

    pub price: Money,

    /// Explicit offer floor. When absent, offers are held to 80% of the price.
    pub minimum_offer: Option<Money>,

    pub category: Category,

    /// Seller of record. `None` for platform inventory.
    pub owner_id: Option<UserId>,

    /// Where offer and sale notifications for this listing go.
    #[serde(default)]
    pub owner_email: Option<String>,

    pub is_featured: bool,

    pub listed_at: DateTime<Utc>,
}

/// Full listing terms after an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingUpdatedData {
    pub price: Money,
    pub minimum_offer: Option<Money>,
    pub description: Option<String>,
    pub category: Category,
    pub is_featured: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainReservedData {
    pub reserved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainReleasedData {
    pub released_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDelistedData {
    pub delisted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSoldData {
    /// New owner.
    pub buyer_id: UserId,

    /// Owner before the sale, if any.
    pub previous_owner_id: Option<UserId>,

    /// The completed transaction that is this domain's sale of record.
    pub transaction_id: AggregateId,

    /// Payment provider reference.
    pub payment_id: String,

    /// Price paid.
    pub price: Money,

    pub sold_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn domain_reserved() -> Self {
        DomainEvent::DomainReserved(DomainReservedData {
            reserved_at: Utc::now(),
        })
    }

    pub fn domain_released() -> Self {
        DomainEvent::DomainReleased(DomainReleasedData {
            released_at: Utc::now(),
        })
    }

    pub fn domain_delisted() -> Self {
        DomainEvent::DomainDelisted(DomainDelistedData {
            delisted_at: Utc::now(),
        })
    }

    pub fn domain_sold(
        buyer_id: UserId,
        previous_owner_id: Option<UserId>,
        transaction_id: AggregateId,
        payment_id: impl Into<String>,
        price: Money,
    ) -> Self {
        DomainEvent::DomainSold(DomainSoldData {
            buyer_id,
            previous_owner_id,
            transaction_id,
            payment_id: payment_id.into(),
            price,
            sold_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        assert_eq!(DomainEvent::domain_reserved().event_type(), "DomainReserved");
        assert_eq!(DomainEvent::domain_released().event_type(), "DomainReleased");
        assert_eq!(DomainEvent::domain_delisted().event_type(), "DomainDelisted");

        let sold = DomainEvent::domain_sold(
            UserId::new(),
            None,
            AggregateId::new(),
            "PAY123",
            Money::from_dollars(1000),
        );
        assert_eq!(sold.event_type(), "DomainSold");
    }

    #[test]
    fn test_sold_serialization() {
        let buyer = UserId::new();
        let event = DomainEvent::domain_sold(
            buyer,
            Some(UserId::new()),
            AggregateId::new(),
            "PAY123",
            Money::from_dollars(1000),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DomainSold");
        assert_eq!(json["data"]["payment_id"], "PAY123");
        assert_eq!(json["data"]["price"], 100000);

        let back: DomainEvent = serde_json::from_value(json).unwrap();
        match back {
            DomainEvent::DomainSold(data) => assert_eq!(data.buyer_id, buyer),
            other => panic!("Expected DomainSold, got {other:?}"),
        }
    }
}
