//! Catalog queries and listing management.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::EventStore;
use market::{
    Category, Domain, DomainStatus, ListDomain, Money, Notice, UpdateListing,
};
use projections::{CatalogEntry, CatalogFilter, PriceSort};
use serde::{Deserialize, Serialize};

use super::{Outcome, parse_id};
use crate::error::ApiError;
use crate::session::CallerSession;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
}

#[derive(Deserialize)]
pub struct ListDomainRequest {
    pub name: String,
    /// Cents.
    pub price: Money,
    #[serde(default)]
    pub category: Category,
    pub description: Option<String>,
    pub minimum_offer: Option<Money>,
    pub owner_id: Option<UserId>,
    pub owner_email: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Deserialize)]
pub struct UpdateListingRequest {
    pub price: Option<Money>,
    pub minimum_offer: Option<Money>,
    #[serde(default)]
    pub clear_minimum_offer: bool,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub featured: Option<bool>,
}

// -- Response types --

#[derive(Serialize)]
pub struct DomainResponse {
    pub id: AggregateId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub minimum_offer: Money,
    pub category: Category,
    pub status: DomainStatus,
    pub owner_id: Option<UserId>,
    pub is_featured: bool,
    pub delisted: bool,
}

impl DomainResponse {
    fn from_domain(id: AggregateId, domain: &Domain) -> Self {
        Self {
            id,
            name: domain.name().to_string(),
            description: domain.description().map(String::from),
            price: domain.price(),
            minimum_offer: domain.effective_minimum_offer(),
            category: domain.category(),
            status: domain.status(),
            owner_id: domain.owner_id(),
            is_featured: domain.is_featured(),
            delisted: domain.is_delisted(),
        }
    }
}

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    pub actor: Option<UserId>,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// GET /domains — available domains, filtered and sorted by price.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<CatalogEntry>>, ApiError> {
    let mut filter = CatalogFilter::default();
    if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        let category: Category = category
            .parse()
            .map_err(|e: market::domain::UnknownCategory| ApiError::BadRequest(e.to_string()))?;
        filter = filter.category(category);
    }
    if let Some(q) = query.q {
        filter = filter.search(q);
    }
    let sort: PriceSort = match query.sort.as_deref() {
        Some(sort) => sort
            .parse()
            .map_err(|e: projections::views::UnknownSort| ApiError::BadRequest(e.to_string()))?,
        None => PriceSort::default(),
    };

    state.catch_up().await?;
    Ok(Json(state.catalog.list_available(&filter, sort).await))
}

/// GET /domains/featured
#[tracing::instrument(skip(state))]
pub async fn featured<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<CatalogEntry>>, ApiError> {
    state.catch_up().await?;
    Ok(Json(state.catalog.list_featured().await))
}

/// GET /domains/:id — one catalog entry, hidden once delisted.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CatalogEntry>, ApiError> {
    let domain_id = parse_id(&id)?;
    state.catch_up().await?;
    state
        .catalog
        .get(domain_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Domain {id} not found")))
}

/// POST /domains — put a domain up for sale.
#[tracing::instrument(skip(state, session, req), fields(name = %req.name))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Json(req): Json<ListDomainRequest>,
) -> Result<(StatusCode, Json<Outcome<DomainResponse>>), ApiError> {
    let domain_id = ListDomain::id_for_name(&req.name);
    let mut cmd = ListDomain::new(req.name, req.price, req.category);
    if let Some(owner_id) = req.owner_id {
        cmd = cmd.owned_by(owner_id);
    }
    if let Some(email) = req.owner_email {
        cmd = cmd.with_owner_email(email);
    }
    if let Some(description) = req.description {
        cmd = cmd.with_description(description);
    }
    if let Some(minimum_offer) = req.minimum_offer {
        cmd = cmd.with_minimum_offer(minimum_offer);
    }
    if req.featured {
        cmd = cmd.featured();
    }

    let result = state.domains.list_domain(&session, cmd).await?;
    state.publish().await;

    let notice = Notice::success(
        "Domain listed",
        format!("{} is now for sale.", result.aggregate.name()),
    );
    Ok((
        StatusCode::CREATED,
        Json(Outcome::new(
            DomainResponse::from_domain(domain_id, &result.aggregate),
            notice,
        )),
    ))
}

/// PATCH /domains/:id — change price, floor, description, category or featuring.
#[tracing::instrument(skip(state, session, req))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Path(id): Path<String>,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<Outcome<DomainResponse>>, ApiError> {
    let domain_id = parse_id(&id)?;
    let mut cmd = UpdateListing::new(domain_id);
    if let Some(price) = req.price {
        cmd = cmd.price(price);
    }
    if let Some(minimum_offer) = req.minimum_offer {
        cmd = cmd.minimum_offer(minimum_offer);
    }
    if req.clear_minimum_offer {
        cmd = cmd.clear_minimum_offer();
    }
    if let Some(description) = req.description {
        cmd = cmd.description(description);
    }
    if let Some(category) = req.category {
        cmd = cmd.category(category);
    }
    if let Some(featured) = req.featured {
        cmd = cmd.featured(featured);
    }

    let result = state.domains.update_listing(&session, cmd).await?;
    state.publish().await;
    Ok(Json(Outcome::new(
        DomainResponse::from_domain(domain_id, &result.aggregate),
        Notice::success("Listing updated", "Your changes are live."),
    )))
}

/// POST /domains/:id/reserve
#[tracing::instrument(skip(state, session))]
pub async fn reserve<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Path(id): Path<String>,
) -> Result<Json<Outcome<DomainResponse>>, ApiError> {
    let domain_id = parse_id(&id)?;
    let result = state.domains.reserve(&session, domain_id).await?;
    state.publish().await;
    Ok(Json(Outcome::new(
        DomainResponse::from_domain(domain_id, &result.aggregate),
        Notice::success("Domain reserved", "The domain is held back from sale."),
    )))
}

/// POST /domains/:id/release
#[tracing::instrument(skip(state, session))]
pub async fn release<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Path(id): Path<String>,
) -> Result<Json<Outcome<DomainResponse>>, ApiError> {
    let domain_id = parse_id(&id)?;
    let result = state.domains.release(&session, domain_id).await?;
    state.publish().await;
    Ok(Json(Outcome::new(
        DomainResponse::from_domain(domain_id, &result.aggregate),
        Notice::success("Domain released", "The domain is for sale again."),
    )))
}

/// DELETE /domains/:id — take a domain out of the catalog.
#[tracing::instrument(skip(state, session))]
pub async fn delist<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Path(id): Path<String>,
) -> Result<Json<Outcome<DomainResponse>>, ApiError> {
    let domain_id = parse_id(&id)?;
    let result = state.domains.delist(&session, domain_id).await?;
    state.publish().await;
    Ok(Json(Outcome::new(
        DomainResponse::from_domain(domain_id, &result.aggregate),
        Notice::success("Domain delisted", "The domain no longer appears in the catalog."),
    )))
}

/// GET /domains/:id/events — the listing's full history.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let domain_id = parse_id(&id)?;
    let envelopes = state.domains.history(domain_id).await?;

    let responses = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            actor: e.actor(),
            event_type: e.event_type,
            aggregate_id: e.aggregate_id.to_string(),
            version: e.version.as_i64(),
            timestamp: e.timestamp,
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}
