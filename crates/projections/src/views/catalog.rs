//! Domain catalog read model: what is for sale, filtered and sorted.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::EventEnvelope;
use market::{Aggregate, Category, Domain, DomainStatus, Money};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{MarketEvent, Projection, ProjectionPosition, ReadModel};

/// One listing as the catalog shows it.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub domain_id: AggregateId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,

    /// The floor the detailed offer form enforces.
    pub minimum_offer: Money,

    pub category: Category,
    pub status: DomainStatus,
    pub owner_id: Option<UserId>,
    pub is_featured: bool,
    pub listed_at: DateTime<Utc>,

    /// Whether the offer form should be offered for this listing.
    pub accepts_offers: bool,

    #[serde(skip)]
    delisted: bool,
}

impl CatalogEntry {
    fn is_available(&self) -> bool {
        !self.delisted && self.status == DomainStatus::Available
    }

    fn matches(&self, filter: &CatalogFilter) -> bool {
        if let Some(category) = filter.category
            && self.category != category
        {
            return false;
        }
        match filter.search_text() {
            Some(needle) => {
                self.name.to_lowercase().contains(&needle)
                    || self
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

/// Catalog filter. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub category: Option<Category>,
    pub search: Option<String>,
}

impl CatalogFilter {
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    fn search_text(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Price ordering of catalog results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceSort {
    #[default]
    Ascending,
    Descending,
}

/// Error returned when parsing an unknown sort order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort order: {0} (expected price_asc or price_desc)")]
pub struct UnknownSort(pub String);

impl FromStr for PriceSort {
    type Err = UnknownSort;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "price_asc" | "asc" => Ok(PriceSort::Ascending),
            "price_desc" | "desc" => Ok(PriceSort::Descending),
            _ => Err(UnknownSort(s.to_string())),
        }
    }
}

struct CatalogState {
    domains: HashMap<AggregateId, Domain>,
    position: ProjectionPosition,
}

/// Read model view of the domain catalog.
///
/// Folds every domain stream with the aggregate's own `apply`, so the
/// catalog never disagrees with the write side about a domain's status.
#[derive(Clone)]
pub struct DomainCatalogView {
    state: Arc<RwLock<CatalogState>>,
}

impl DomainCatalogView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(CatalogState {
                domains: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Available domains matching `filter`, sorted by price.
    ///
    /// Domains with the same price keep name order.
    pub async fn list_available(&self, filter: &CatalogFilter, sort: PriceSort) -> Vec<CatalogEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<CatalogEntry> = state
            .domains
            .iter()
            .map(|(id, domain)| entry_for(*id, domain))
            .filter(|e| e.is_available() && e.matches(filter))
            .collect();

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        match sort {
            PriceSort::Ascending => entries.sort_by(|a, b| a.price.cmp(&b.price)),
            PriceSort::Descending => entries.sort_by(|a, b| b.price.cmp(&a.price)),
        }
        entries
    }

    /// Available domains flagged as featured, in name order.
    pub async fn list_featured(&self) -> Vec<CatalogEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<CatalogEntry> = state
            .domains
            .iter()
            .map(|(id, domain)| entry_for(*id, domain))
            .filter(|e| e.is_available() && e.is_featured)
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// A single listing in any status, unless it was delisted.
    pub async fn get(&self, domain_id: AggregateId) -> Option<CatalogEntry> {
        let state = self.state.read().await;
        state
            .domains
            .get(&domain_id)
            .map(|domain| entry_for(domain_id, domain))
            .filter(|e| !e.delisted)
    }
}

impl Default for DomainCatalogView {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_for(domain_id: AggregateId, domain: &Domain) -> CatalogEntry {
    CatalogEntry {
        domain_id,
        name: domain.name().to_string(),
        description: domain.description().map(str::to_string),
        price: domain.price(),
        minimum_offer: domain.effective_minimum_offer(),
        category: domain.category(),
        status: domain.status(),
        owner_id: domain.owner_id(),
        is_featured: domain.is_featured(),
        listed_at: domain.listed_at().unwrap_or_default(),
        accepts_offers: domain.can_receive_offer(),
        delisted: domain.is_delisted(),
    }
}

#[async_trait]
impl Projection for DomainCatalogView {
    fn name(&self) -> &'static str {
        "DomainCatalogView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;

        if let MarketEvent::Domain(domain_event) = MarketEvent::decode(event)? {
            let domain = state.domains.entry(event.aggregate_id).or_default();
            domain.apply(domain_event);
            domain.set_version(event.version);
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.domains.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for DomainCatalogView {
    fn name(&self) -> &'static str {
        "DomainCatalogView"
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.domains.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market::{AggregateEvent, DomainEvent, ListDomain};

    fn make_envelope(aggregate_id: AggregateId, version: i64, event: &DomainEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Domain")
            .event_type(event.event_type())
            .version(event_store::Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    struct Listing {
        id: AggregateId,
        version: i64,
        domain: Domain,
    }

    async fn list(view: &DomainCatalogView, cmd: ListDomain) -> Listing {
        let mut domain = Domain::default();
        let events = domain.list(&cmd).unwrap();
        let id = ListDomain::id_for_name(&cmd.name);
        for event in &events {
            view.handle(&make_envelope(id, 1, event)).await.unwrap();
        }
        domain.apply_events(events);
        Listing {
            id,
            version: 1,
            domain,
        }
    }

    async fn record(view: &DomainCatalogView, listing: &mut Listing, events: Vec<DomainEvent>) {
        for event in &events {
            listing.version += 1;
            view.handle(&make_envelope(listing.id, listing.version, event))
                .await
                .unwrap();
        }
        listing.domain.apply_events(events);
    }

    fn cmd(name: &str, dollars: i64, category: Category) -> ListDomain {
        ListDomain::new(name, Money::from_dollars(dollars), category)
    }

    fn names(entries: &[CatalogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_sort_by_price_keeps_name_order_for_ties() {
        let view = DomainCatalogView::new();
        list(&view, cmd("zeta.com", 500, Category::Standard)).await;
        list(&view, cmd("alpha.com", 500, Category::Standard)).await;
        list(&view, cmd("cheap.com", 100, Category::Standard)).await;
        list(&view, cmd("pricey.com", 900, Category::Premium)).await;

        let asc = view
            .list_available(&CatalogFilter::default(), PriceSort::Ascending)
            .await;
        assert_eq!(names(&asc), ["cheap.com", "alpha.com", "zeta.com", "pricey.com"]);

        let desc = view
            .list_available(&CatalogFilter::default(), PriceSort::Descending)
            .await;
        assert_eq!(names(&desc), ["pricey.com", "alpha.com", "zeta.com", "cheap.com"]);
    }

    #[tokio::test]
    async fn test_only_available_domains_are_listed() {
        let view = DomainCatalogView::new();
        list(&view, cmd("open.com", 100, Category::Standard)).await;

        let mut reserved = list(&view, cmd("held.com", 100, Category::Standard)).await;
        let events = reserved.domain.reserve().unwrap();
        record(&view, &mut reserved, events).await;

        let mut sold = list(&view, cmd("gone.com", 100, Category::Standard)).await;
        let events = sold
            .domain
            .sell(UserId::new(), AggregateId::new(), "PAY1")
            .unwrap();
        record(&view, &mut sold, events).await;

        let mut delisted = list(&view, cmd("pulled.com", 100, Category::Standard)).await;
        let events = delisted.domain.delist().unwrap();
        record(&view, &mut delisted, events).await;

        for sort in [PriceSort::Ascending, PriceSort::Descending] {
            let listed = view.list_available(&CatalogFilter::default(), sort).await;
            assert_eq!(names(&listed), ["open.com"]);
            assert!(listed.iter().all(|e| e.status == DomainStatus::Available));
        }

        assert_eq!(view.get(sold.id).await.unwrap().status, DomainStatus::Sold);
        assert!(view.get(delisted.id).await.is_none());
    }

    #[tokio::test]
    async fn test_filter_by_category_and_search() {
        let view = DomainCatalogView::new();
        list(
            &view,
            cmd("bakery.com", 300, Category::Business).with_description("Great for a Bread shop"),
        )
        .await;
        list(&view, cmd("BreadBox.io", 200, Category::Standard)).await;
        list(&view, cmd("law.com", 5000, Category::Premium)).await;

        let bread = view
            .list_available(&CatalogFilter::default().search("BREAD"), PriceSort::Ascending)
            .await;
        assert_eq!(names(&bread), ["BreadBox.io", "bakery.com"]);

        let business_bread = view
            .list_available(
                &CatalogFilter::default()
                    .category(Category::Business)
                    .search("bread"),
                PriceSort::Ascending,
            )
            .await;
        assert_eq!(names(&business_bread), ["bakery.com"]);

        let blank = view
            .list_available(&CatalogFilter::default().search("   "), PriceSort::Ascending)
            .await;
        assert_eq!(blank.len(), 3);
    }

    #[tokio::test]
    async fn test_featured_listing() {
        let view = DomainCatalogView::new();
        list(&view, cmd("plain.com", 100, Category::Standard)).await;
        list(&view, cmd("star.com", 100, Category::Premium).featured()).await;

        assert_eq!(names(&view.list_featured().await), ["star.com"]);
    }

    #[tokio::test]
    async fn test_entry_reports_offer_floor() {
        let view = DomainCatalogView::new();
        let owned = list(
            &view,
            cmd("shop.com", 1000, Category::Premium).owned_by(UserId::new()),
        )
        .await;
        let platform = list(&view, cmd("platform.com", 1000, Category::Premium)).await;

        let entry = view.get(owned.id).await.unwrap();
        assert_eq!(entry.minimum_offer, Money::from_dollars(800));
        assert!(entry.accepts_offers);
        assert!(!view.get(platform.id).await.unwrap().accepts_offers);
    }

    #[tokio::test]
    async fn test_reset() {
        let view = DomainCatalogView::new();
        list(&view, cmd("shop.com", 1000, Category::Premium)).await;

        view.reset().await.unwrap();
        assert_eq!(ReadModel::count(&view), 0);
        assert_eq!(view.position().await.events_processed, 0);
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("price_desc".parse::<PriceSort>(), Ok(PriceSort::Descending));
        assert_eq!("price_asc".parse::<PriceSort>(), Ok(PriceSort::Ascending));
        assert!("name".parse::<PriceSort>().is_err());
    }
}
