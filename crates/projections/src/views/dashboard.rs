//! Dashboard read model: what a user owns, offered, was offered and bought.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::EventEnvelope;
use market::{
    DomainEvent, DomainStatus, Money, OfferEvent, OfferForm, OfferStatus, TransactionEvent,
};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{MarketEvent, Projection, ProjectionPosition, ReadModel};

#[derive(Debug, Clone, Serialize)]
pub struct OwnedDomain {
    pub domain_id: AggregateId,
    pub name: String,
    pub price: Money,
    pub status: DomainStatus,
    pub delisted: bool,

    #[serde(skip)]
    owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferSummary {
    pub offer_id: AggregateId,
    pub domain_id: AggregateId,
    pub domain_name: String,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub amount: Money,
    pub form: OfferForm,
    pub status: OfferStatus,
    pub contact_email: String,
    pub message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseSummary {
    pub transaction_id: AggregateId,
    pub domain_id: AggregateId,
    pub domain_name: String,
    pub amount: Money,
    pub payment_id: String,
    pub completed_at: DateTime<Utc>,
}

/// Everything shown on one user's dashboard. Lists are newest first,
/// owned domains are in name order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub owned_domains: Vec<OwnedDomain>,
    pub submitted_offers: Vec<OfferSummary>,
    pub received_offers: Vec<OfferSummary>,
    pub purchases: Vec<PurchaseSummary>,
}

struct DashboardState {
    domains: HashMap<AggregateId, OwnedDomain>,
    offers: HashMap<AggregateId, OfferSummary>,
    purchases: HashMap<UserId, Vec<PurchaseSummary>>,
    position: ProjectionPosition,
}

impl DashboardState {
    fn domain_name(&self, domain_id: AggregateId) -> String {
        self.domains
            .get(&domain_id)
            .map(|d| d.name.clone())
            .unwrap_or_default()
    }

    fn apply_domain(&mut self, domain_id: AggregateId, event: DomainEvent) {
        match event {
            DomainEvent::DomainListed(data) => {
                self.domains.insert(
                    domain_id,
                    OwnedDomain {
                        domain_id,
                        name: data.name,
                        price: data.price,
                        status: DomainStatus::Available,
                        delisted: false,
                        owner_id: data.owner_id,
                    },
                );
            }
            DomainEvent::ListingUpdated(data) => {
                if let Some(domain) = self.domains.get_mut(&domain_id) {
                    domain.price = data.price;
                }
            }
            DomainEvent::DomainReserved(_) => self.set_status(domain_id, DomainStatus::Reserved),
            DomainEvent::DomainReleased(_) => self.set_status(domain_id, DomainStatus::Available),
            DomainEvent::DomainDelisted(_) => {
                if let Some(domain) = self.domains.get_mut(&domain_id) {
                    domain.delisted = true;
                }
            }
            DomainEvent::DomainSold(data) => {
                if let Some(domain) = self.domains.get_mut(&domain_id) {
                    domain.status = DomainStatus::Sold;
                    domain.owner_id = Some(data.buyer_id);
                }
            }
        }
    }

    fn set_status(&mut self, domain_id: AggregateId, status: DomainStatus) {
        if let Some(domain) = self.domains.get_mut(&domain_id) {
            domain.status = status;
        }
    }

    fn apply_offer(&mut self, offer_id: AggregateId, event: OfferEvent) {
        match event {
            OfferEvent::OfferSubmitted(data) => {
                self.offers.insert(
                    offer_id,
                    OfferSummary {
                        offer_id,
                        domain_id: data.domain_id,
                        domain_name: data.domain_name,
                        buyer_id: data.buyer_id,
                        seller_id: data.seller_id,
                        amount: data.amount,
                        form: data.form,
                        status: OfferStatus::Pending,
                        contact_email: data.contact_email,
                        message: data.message,
                        submitted_at: data.submitted_at,
                        resolved_at: None,
                    },
                );
            }
            OfferEvent::OfferAccepted(data) => {
                if let Some(offer) = self.offers.get_mut(&offer_id) {
                    offer.status = OfferStatus::Accepted;
                    offer.resolved_at = Some(data.resolved_at);
                }
            }
            OfferEvent::OfferRejected(data) => {
                if let Some(offer) = self.offers.get_mut(&offer_id) {
                    offer.status = OfferStatus::Rejected;
                    offer.resolved_at = Some(data.resolved_at);
                }
            }
        }
    }

    fn apply_transaction(&mut self, event: TransactionEvent) {
        // Failed transactions never bought anything.
        if let TransactionEvent::TransactionCompleted(data) = event {
            let summary = PurchaseSummary {
                transaction_id: data.transaction_id,
                domain_id: data.domain_id,
                domain_name: self.domain_name(data.domain_id),
                amount: data.amount,
                payment_id: data.payment_id,
                completed_at: data.completed_at,
            };
            self.purchases.entry(data.buyer_id).or_default().push(summary);
        }
    }
}

/// Read model view backing the per-user dashboard.
#[derive(Clone)]
pub struct DashboardView {
    state: Arc<RwLock<DashboardState>>,
}

impl DashboardView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(DashboardState {
                domains: HashMap::new(),
                offers: HashMap::new(),
                purchases: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Builds the dashboard for `user_id`. Unknown users get an empty one.
    pub async fn dashboard(&self, user_id: UserId) -> Dashboard {
        let state = self.state.read().await;

        let mut owned_domains: Vec<OwnedDomain> = state
            .domains
            .values()
            .filter(|d| d.owner_id == Some(user_id))
            .cloned()
            .collect();
        owned_domains.sort_by(|a, b| a.name.cmp(&b.name));

        let newest_first = |a: &OfferSummary, b: &OfferSummary| b.submitted_at.cmp(&a.submitted_at);

        let mut submitted_offers: Vec<OfferSummary> = state
            .offers
            .values()
            .filter(|o| o.buyer_id == user_id)
            .cloned()
            .collect();
        submitted_offers.sort_by(newest_first);

        let mut received_offers: Vec<OfferSummary> = state
            .offers
            .values()
            .filter(|o| o.seller_id == user_id)
            .cloned()
            .collect();
        received_offers.sort_by(newest_first);

        let mut purchases = state.purchases.get(&user_id).cloned().unwrap_or_default();
        purchases.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        Dashboard {
            owned_domains,
            submitted_offers,
            received_offers,
            purchases,
        }
    }

    /// Looks up a single offer.
    pub async fn offer(&self, offer_id: AggregateId) -> Option<OfferSummary> {
        self.state.read().await.offers.get(&offer_id).cloned()
    }
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for DashboardView {
    fn name(&self) -> &'static str {
        "DashboardView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;

        match MarketEvent::decode(event)? {
            MarketEvent::Domain(e) => state.apply_domain(event.aggregate_id, e),
            MarketEvent::Offer(e) => state.apply_offer(event.aggregate_id, e),
            MarketEvent::Transaction(e) => state.apply_transaction(e),
            MarketEvent::Checkout(_) | MarketEvent::Other => {}
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
        state.offers.clear();
        state.purchases.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for DashboardView {
    fn name(&self) -> &'static str {
        "DashboardView"
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.offers.len() + s.purchases.values().map(Vec::len).sum::<usize>())
            .unwrap_or(0)
    }
}
