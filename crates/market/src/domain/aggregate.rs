//! Domain listing aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    Category, DomainEvent, DomainStatus, ListDomain, ListingError, UpdateListing,
    events::{DomainListedData, DomainSoldData, ListingUpdatedData},
    guard,
};

/// The completed purchase that took a domain off the market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub transaction_id: AggregateId,
    pub payment_id: String,
    pub buyer_id: UserId,
    pub price: Money,
    pub sold_at: DateTime<Utc>,
}

/// Domain aggregate root: one sellable name in the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Domain {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    name: String,
    description: Option<String>,
    price: Money,
    minimum_offer: Option<Money>,
    category: Category,
    status: DomainStatus,
    owner_id: Option<UserId>,
    owner_email: Option<String>,
    is_featured: bool,

    /// Taken out of the catalog; may be listed again.
    delisted: bool,

    listed_at: Option<DateTime<Utc>>,
    sale: Option<SaleRecord>,
}

impl Aggregate for Domain {
    type Event = DomainEvent;
    type Error = ListingError;

    fn aggregate_type() -> &'static str {
        "Domain"
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
            DomainEvent::DomainListed(data) => self.apply_listed(data),
            DomainEvent::ListingUpdated(data) => self.apply_listing_updated(data),
            DomainEvent::DomainReserved(_) => self.status = DomainStatus::Reserved,
            DomainEvent::DomainReleased(_) => self.status = DomainStatus::Available,
            DomainEvent::DomainDelisted(_) => self.delisted = true,
            DomainEvent::DomainSold(data) => self.apply_sold(data),
        }
    }
}

// Query methods
impl Domain {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn price(&self) -> Money {
        self.price
    }

    /// The explicit minimum offer, if the seller set one.
    pub fn minimum_offer(&self) -> Option<Money> {
        self.minimum_offer
    }

    /// The floor the detailed offer form enforces.
    pub fn effective_minimum_offer(&self) -> Money {
        self.minimum_offer
            .unwrap_or_else(|| Money::default_minimum_offer(self.price))
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn status(&self) -> DomainStatus {
        self.status
    }

    pub fn owner_id(&self) -> Option<UserId> {
        self.owner_id
    }

    pub fn owner_email(&self) -> Option<&str> {
        self.owner_email.as_deref()
    }

    pub fn is_featured(&self) -> bool {
        self.is_featured
    }

    pub fn is_delisted(&self) -> bool {
        self.delisted
    }

    pub fn listed_at(&self) -> Option<DateTime<Utc>> {
        self.listed_at
    }

    pub fn sale(&self) -> Option<&SaleRecord> {
        self.sale.as_ref()
    }

    pub fn can_receive_offer(&self) -> bool {
        guard::can_receive_offer(self)
    }

    pub fn can_purchase(&self) -> bool {
        guard::can_purchase(self)
    }
}

// Command methods (return events)
impl Domain {
    /// Lists a domain for sale.
    ///
    /// A delisted domain can be listed again under fresh terms.
    pub fn list(&self, cmd: &ListDomain) -> Result<Vec<DomainEvent>, ListingError> {
        if self.id.is_some() && !self.delisted {
            return Err(ListingError::AlreadyListed {
                name: self.name.clone(),
            });
        }
        if self.status.is_terminal() {
            return Err(ListingError::AlreadySold);
        }

        validate_name(&cmd.name)?;
        validate_terms(cmd.price, cmd.minimum_offer)?;

        Ok(vec![DomainEvent::DomainListed(DomainListedData {
            domain_id: ListDomain::id_for_name(&cmd.name),
            name: cmd.name.clone(),
            description: normalize_description(cmd.description.clone()),
            price: cmd.price,
            minimum_offer: cmd.minimum_offer,
            category: cmd.category,
            owner_id: cmd.owner_id,
            owner_email: cmd.owner_id.and(cmd.owner_email.clone()),
            is_featured: cmd.is_featured,
            listed_at: Utc::now(),
        })])
    }

    /// Changes listing terms. Returns no events when nothing changes.
    pub fn update_listing(&self, cmd: &UpdateListing) -> Result<Vec<DomainEvent>, ListingError> {
        self.ensure_mutable()?;

        let price = cmd.price.unwrap_or(self.price);
        let minimum_offer = if cmd.clear_minimum_offer {
            None
        } else {
            cmd.minimum_offer.or(self.minimum_offer)
        };
        let description = match &cmd.description {
            Some(text) => normalize_description(Some(text.clone())),
            None => self.description.clone(),
        };
        let category = cmd.category.unwrap_or(self.category);
        let is_featured = cmd.is_featured.unwrap_or(self.is_featured);

        validate_terms(price, minimum_offer)?;

        if price == self.price
            && minimum_offer == self.minimum_offer
            && description == self.description
            && category == self.category
            && is_featured == self.is_featured
        {
            return Ok(vec![]);
        }

        Ok(vec![DomainEvent::ListingUpdated(ListingUpdatedData {
            price,
            minimum_offer,
            description,
            category,
            is_featured,
            updated_at: Utc::now(),
        })])
    }

    /// Holds the domain back from offers and purchase.
    pub fn reserve(&self) -> Result<Vec<DomainEvent>, ListingError> {
        self.ensure_mutable()?;
        if !self.status.can_reserve() {
            return Err(ListingError::InvalidStateTransition {
                current_state: self.status,
                action: "reserve",
            });
        }
        Ok(vec![DomainEvent::domain_reserved()])
    }

    /// Makes a reserved domain available again.
    pub fn release(&self) -> Result<Vec<DomainEvent>, ListingError> {
        self.ensure_mutable()?;
        if !self.status.can_release() {
            return Err(ListingError::InvalidStateTransition {
                current_state: self.status,
                action: "release",
            });
        }
        Ok(vec![DomainEvent::domain_released()])
    }

    /// Takes an unsold domain out of the catalog.
    pub fn delist(&self) -> Result<Vec<DomainEvent>, ListingError> {
        self.ensure_mutable()?;
        Ok(vec![DomainEvent::domain_delisted()])
    }

    /// Records the sale of the domain to `buyer_id`.
    ///
    /// Only an available domain can be sold. Losing the race to another
    /// purchase surfaces as `AlreadySold`.
    pub fn sell(
        &self,
        buyer_id: UserId,
        transaction_id: AggregateId,
        payment_id: &str,
    ) -> Result<Vec<DomainEvent>, ListingError> {
        if self.status.is_terminal() {
            return Err(ListingError::AlreadySold);
        }
        if !self.can_purchase() {
            return Err(ListingError::NotAvailable {
                status: self.status,
            });
        }

        Ok(vec![DomainEvent::domain_sold(
            buyer_id,
            self.owner_id,
            transaction_id,
            payment_id,
            self.price,
        )])
    }

    fn ensure_mutable(&self) -> Result<(), ListingError> {
        if self.status.is_terminal() {
            return Err(ListingError::AlreadySold);
        }
        if self.delisted {
            return Err(ListingError::Delisted);
        }
        Ok(())
    }
}

// Apply event helpers
impl Domain {
    fn apply_listed(&mut self, data: DomainListedData) {
        self.id = Some(data.domain_id);
        self.name = data.name;
        self.description = data.description;
        self.price = data.price;
        self.minimum_offer = data.minimum_offer;
        self.category = data.category;
        self.owner_id = data.owner_id;
        self.owner_email = data.owner_email;
        self.is_featured = data.is_featured;
        self.status = DomainStatus::Available;
        self.delisted = false;
        self.listed_at = Some(data.listed_at);
    }

    fn apply_listing_updated(&mut self, data: ListingUpdatedData) {
        self.price = data.price;
        self.minimum_offer = data.minimum_offer;
        self.description = data.description;
        self.category = data.category;
        self.is_featured = data.is_featured;
    }

    fn apply_sold(&mut self, data: DomainSoldData) {
        self.status = DomainStatus::Sold;
        self.owner_id = Some(data.buyer_id);
        self.owner_email = None;
        self.sale = Some(SaleRecord {
            transaction_id: data.transaction_id,
            payment_id: data.payment_id,
            buyer_id: data.buyer_id,
            price: data.price,
            sold_at: data.sold_at,
        });
    }
}

/// Accepts `label(.label)+` where labels are ASCII letters, digits and
/// inner hyphens, 1 to 63 characters each.
fn validate_name(name: &str) -> Result<(), ListingError> {
    let invalid = || ListingError::InvalidName {
        name: name.to_string(),
    };

    if name.is_empty() || name.len() > 253 {
        return Err(invalid());
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }

    for label in labels {
        let ok = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !ok {
            return Err(invalid());
        }
    }
    Ok(())
}

fn validate_terms(price: Money, minimum_offer: Option<Money>) -> Result<(), ListingError> {
    if !price.is_positive() || price > Money::MAX_PRICE {
        return Err(ListingError::InvalidPrice {
            cents: price.cents(),
        });
    }
    if let Some(minimum) = minimum_offer
        && (!minimum.is_positive() || minimum > price)
    {
        return Err(ListingError::InvalidMinimumOffer {
            cents: minimum.cents(),
        });
    }
    Ok(())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateEvent;

    fn listed(owner: Option<UserId>) -> Domain {
        let mut cmd = ListDomain::new("shop.com", Money::from_dollars(1000), Category::Premium);
        if let Some(owner) = owner {
            cmd = cmd.owned_by(owner);
        }
        let mut domain = Domain::default();
        domain.apply_events(domain.list(&cmd).unwrap());
        domain
    }

    #[test]
    fn test_list_domain() {
        let owner = UserId::new();
        let domain = listed(Some(owner));

        assert_eq!(domain.id(), Some(ListDomain::id_for_name("shop.com")));
        assert_eq!(domain.name(), "shop.com");
        assert_eq!(domain.status(), DomainStatus::Available);
        assert_eq!(domain.owner_id(), Some(owner));
        assert_eq!(domain.effective_minimum_offer(), Money::from_dollars(800));
    }

    #[test]
    fn test_list_twice_fails() {
        let domain = listed(None);
        let cmd = ListDomain::new("shop.com", Money::from_dollars(5), Category::Standard);
        assert!(matches!(
            domain.list(&cmd),
            Err(ListingError::AlreadyListed { .. })
        ));
    }

    #[test]
    fn test_list_rejects_bad_terms() {
        let domain = Domain::default();

        let free = ListDomain::new("free.com", Money::zero(), Category::Standard);
        assert!(matches!(
            domain.list(&free),
            Err(ListingError::InvalidPrice { .. })
        ));

        let at_cap = ListDomain::new("cap.com", Money::MAX_PRICE, Category::Premium);
        assert!(domain.list(&at_cap).is_ok());

        let over_cap = ListDomain::new(
            "big.com",
            Money::from_cents(Money::MAX_PRICE.cents() + 1),
            Category::Premium,
        );
        assert!(matches!(
            domain.list(&over_cap),
            Err(ListingError::InvalidPrice { .. })
        ));
        let absurd = ListDomain::new("huge.com", Money::from_cents(i64::MAX / 2), Category::Premium);
        assert!(matches!(
            domain.list(&absurd),
            Err(ListingError::InvalidPrice { .. })
        ));

        let inverted = ListDomain::new("odd.com", Money::from_dollars(10), Category::Standard)
            .with_minimum_offer(Money::from_dollars(11));
        assert!(matches!(
            domain.list(&inverted),
            Err(ListingError::InvalidMinimumOffer { .. })
        ));

        for name in ["nodot", "-bad.com", "sp ace.com", "a..com"] {
            let cmd = ListDomain::new(name, Money::from_dollars(10), Category::Standard);
            assert!(
                matches!(domain.list(&cmd), Err(ListingError::InvalidName { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_update_listing() {
        let mut domain = listed(None);
        let cmd = UpdateListing::new(domain.id().unwrap())
            .price(Money::from_dollars(2000))
            .minimum_offer(Money::from_dollars(1500))
            .description("  Short and brandable  ");

        domain.apply_events(domain.update_listing(&cmd).unwrap());

        assert_eq!(domain.price(), Money::from_dollars(2000));
        assert_eq!(domain.effective_minimum_offer(), Money::from_dollars(1500));
        assert_eq!(domain.description(), Some("Short and brandable"));

        let clear = UpdateListing::new(domain.id().unwrap()).clear_minimum_offer();
        domain.apply_events(domain.update_listing(&clear).unwrap());
        assert_eq!(domain.effective_minimum_offer(), Money::from_dollars(1600));
    }

    #[test]
    fn test_noop_update_emits_nothing() {
        let domain = listed(None);
        let cmd = UpdateListing::new(domain.id().unwrap()).price(domain.price());
        assert!(domain.update_listing(&cmd).unwrap().is_empty());
    }

    #[test]
    fn test_reserve_and_release() {
        let mut domain = listed(Some(UserId::new()));

        domain.apply_events(domain.reserve().unwrap());
        assert_eq!(domain.status(), DomainStatus::Reserved);
        assert!(!domain.can_purchase());
        assert!(matches!(
            domain.reserve(),
            Err(ListingError::InvalidStateTransition { .. })
        ));

        domain.apply_events(domain.release().unwrap());
        assert_eq!(domain.status(), DomainStatus::Available);
        assert!(domain.can_purchase());
    }

    #[test]
    fn test_sell_transfers_ownership() {
        let seller = UserId::new();
        let buyer = UserId::new();
        let tx = AggregateId::new();
        let mut domain = listed(Some(seller));

        let events = domain.sell(buyer, tx, "PAY123").unwrap();
        assert_eq!(events[0].event_type(), "DomainSold");
        domain.apply_events(events);

        assert_eq!(domain.status(), DomainStatus::Sold);
        assert_eq!(domain.owner_id(), Some(buyer));
        let sale = domain.sale().unwrap();
        assert_eq!(sale.transaction_id, tx);
        assert_eq!(sale.price, Money::from_dollars(1000));
    }

    #[test]
    fn test_sold_domain_rejects_everything() {
        let mut domain = listed(None);
        domain.apply_events(domain.sell(UserId::new(), AggregateId::new(), "PAY1").unwrap());

        assert!(matches!(
            domain.sell(UserId::new(), AggregateId::new(), "PAY2"),
            Err(ListingError::AlreadySold)
        ));
        assert!(matches!(domain.reserve(), Err(ListingError::AlreadySold)));
        assert!(matches!(domain.delist(), Err(ListingError::AlreadySold)));
        let update = UpdateListing::new(domain.id().unwrap()).price(Money::from_dollars(1));
        assert!(matches!(
            domain.update_listing(&update),
            Err(ListingError::AlreadySold)
        ));
    }

    #[test]
    fn test_reserved_domain_cannot_be_sold() {
        let mut domain = listed(None);
        domain.apply_events(domain.reserve().unwrap());

        assert!(matches!(
            domain.sell(UserId::new(), AggregateId::new(), "PAY1"),
            Err(ListingError::NotAvailable {
                status: DomainStatus::Reserved
            })
        ));
    }

    #[test]
    fn test_delisted_domain_can_be_listed_again() {
        let mut domain = listed(None);
        domain.apply_events(domain.delist().unwrap());
        assert!(domain.is_delisted());
        assert!(!domain.can_purchase());
        assert!(matches!(domain.reserve(), Err(ListingError::Delisted)));

        let relist = ListDomain::new("shop.com", Money::from_dollars(750), Category::Business);
        domain.apply_events(domain.list(&relist).unwrap());
        assert!(!domain.is_delisted());
        assert_eq!(domain.price(), Money::from_dollars(750));
    }
}
