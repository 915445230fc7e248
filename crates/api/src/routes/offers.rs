//! Offer submission and resolution.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AggregateId;
use event_store::EventStore;
use market::{
    Decision, MarketError, Money, Notice, Offer, OfferForm, OfferStatus, ResolveOffer, Session,
    SubmitOffer,
};
use serde::{Deserialize, Serialize};

use super::{Outcome, parse_id};
use crate::error::ApiError;
use crate::session::CallerSession;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubmitOfferRequest {
    /// Cents.
    pub amount: Money,

    /// Defaults to the caller's account email.
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub form: OfferForm,
}

#[derive(Deserialize)]
pub struct ResolveOfferRequest {
    pub decision: Decision,
}

#[derive(Serialize)]
pub struct OfferResponse {
    pub offer_id: AggregateId,
    pub domain_id: Option<AggregateId>,
    pub amount: Money,
    pub status: OfferStatus,
}

impl OfferResponse {
    fn from_offer(offer_id: AggregateId, offer: &Offer) -> Self {
        Self {
            offer_id,
            domain_id: offer.domain_id(),
            amount: offer.amount(),
            status: offer.status(),
        }
    }
}

fn contact_email(session: &Session, requested: Option<String>) -> Result<String, MarketError> {
    let caller = session.require_user()?;
    requested
        .filter(|e| !e.trim().is_empty())
        .or_else(|| caller.email.clone())
        .ok_or_else(|| MarketError::Validation("a contact email is required".to_string()))
}

/// POST /domains/:id/offers — propose a price to the domain's owner.
#[tracing::instrument(skip(state, session, req), fields(amount = %req.amount))]
pub async fn submit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Path(id): Path<String>,
    Json(req): Json<SubmitOfferRequest>,
) -> Result<(StatusCode, Json<Outcome<OfferResponse>>), ApiError> {
    let domain_id = parse_id(&id)?;
    let email = contact_email(&session, req.contact_email)?;

    let mut cmd = SubmitOffer::new(domain_id, req.amount, email);
    if let Some(phone) = req.contact_phone.filter(|p| !p.trim().is_empty()) {
        cmd = cmd.with_phone(phone);
    }
    if let Some(message) = req.message.filter(|m| !m.trim().is_empty()) {
        cmd = cmd.with_message(message);
    }
    if req.form == OfferForm::Detailed {
        cmd = cmd.detailed();
    }
    let offer_id = cmd.offer_id;

    let result = state.offers.submit_offer(&session, cmd).await?;
    state.publish().await;

    Ok((
        StatusCode::CREATED,
        Json(Outcome::new(
            OfferResponse::from_offer(offer_id, &result.aggregate),
            Notice::success(
                "Offer sent",
                "Your offer has been recorded. The seller will review it.",
            ),
        )),
    ))
}

/// POST /offers/:id/resolve — the seller accepts or rejects.
#[tracing::instrument(skip(state, session, req))]
pub async fn resolve<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Path(id): Path<String>,
    Json(req): Json<ResolveOfferRequest>,
) -> Result<Json<Outcome<OfferResponse>>, ApiError> {
    let offer_id = parse_id(&id)?;
    let result = state
        .offers
        .resolve_offer(&session, ResolveOffer::new(offer_id, req.decision))
        .await?;
    state.publish().await;

    let notice = match req.decision {
        Decision::Accept => Notice::success(
            "Offer accepted",
            "Let the buyer know how to complete the purchase.",
        ),
        Decision::Reject => Notice::success("Offer rejected", "The offer has been declined."),
    };
    Ok(Json(Outcome::new(
        OfferResponse::from_offer(offer_id, &result.aggregate),
        notice,
    )))
}
