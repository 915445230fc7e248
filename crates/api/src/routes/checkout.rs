//! Buy Now: checkouts and payment confirmations.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CheckoutOutcome, CheckoutState, StartCheckout};
use common::{AggregateId, UserId};
use event_store::EventStore;
use market::{Aggregate, MarketError, Money, Notice, PaymentConfirmation};
use serde::Serialize;

use super::{Outcome, parse_id};
use crate::error::ApiError;
use crate::session::CallerSession;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub checkout_id: AggregateId,
    pub domain_id: Option<AggregateId>,
    pub transaction_id: Option<AggregateId>,
    pub payment_id: String,
    pub amount: Money,
    pub replayed: bool,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        Self {
            checkout_id: outcome.checkout_id,
            domain_id: outcome.transaction.domain_id(),
            transaction_id: outcome.transaction.id(),
            payment_id: outcome.transaction.payment_id().to_string(),
            amount: outcome.transaction.amount(),
            replayed: outcome.replayed,
        }
    }
}

#[derive(Serialize)]
pub struct RefundResponse {
    pub payment_id: String,
    pub amount: Money,
    pub reason: String,
}

#[derive(Serialize)]
pub struct CheckoutStatusResponse {
    pub checkout_id: AggregateId,
    pub domain_id: Option<AggregateId>,
    pub buyer_id: Option<UserId>,
    pub state: CheckoutState,
    pub amount: Money,
    pub currency: String,
    pub completed_steps: Vec<String>,
    pub payment_id: Option<String>,
    pub transaction_id: Option<AggregateId>,
    pub failure_code: Option<String>,
    pub failure_reason: Option<String>,
    pub refund: Option<RefundResponse>,
}

fn purchased(outcome: CheckoutOutcome) -> Json<Outcome<CheckoutResponse>> {
    let notice = if outcome.replayed {
        Notice::success("Already purchased", "This payment was already recorded.")
    } else {
        Notice::success("Purchase complete", "The domain is now yours.")
    };
    Json(Outcome::new(outcome.into(), notice))
}

/// POST /domains/:id/checkout — charge the caller and sell them the domain.
///
/// The checkout runs on its own task, so a client that disconnects does
/// not abandon a captured payment halfway. Shutdown still cancels it.
#[tracing::instrument(skip(state, session))]
pub async fn pay_now<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Outcome<CheckoutResponse>>), ApiError> {
    let domain_id = parse_id(&id)?;
    let cancel = state.shutdown.child_token();

    let task_state = state.clone();
    let outcome = tokio::spawn(async move {
        task_state
            .checkout
            .pay_now(&session, StartCheckout::new(domain_id), &cancel)
            .await
    })
    .await
    .map_err(|e| ApiError::Internal(format!("checkout task failed: {e}")))?;

    state.publish().await;
    Ok((StatusCode::CREATED, purchased(outcome?)))
}

/// POST /domains/:id/checkout/confirm — record a payment the client-side
/// widget already captured.
#[tracing::instrument(skip(state, session, confirmation), fields(payment_id = %confirmation.payment_id))]
pub async fn confirm<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Path(id): Path<String>,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Result<Json<Outcome<CheckoutResponse>>, ApiError> {
    let domain_id = parse_id(&id)?;

    let task_state = state.clone();
    let outcome = tokio::spawn(async move {
        task_state
            .checkout
            .confirm(&session, StartCheckout::new(domain_id), confirmation)
            .await
    })
    .await
    .map_err(|e| ApiError::Internal(format!("checkout task failed: {e}")))?;

    state.publish().await;
    Ok(purchased(outcome?))
}

/// GET /checkouts/:id — a checkout as its buyer (or an operator) sees it.
#[tracing::instrument(skip(state, session))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
    Path(id): Path<String>,
) -> Result<Json<CheckoutStatusResponse>, ApiError> {
    let checkout_id = parse_id(&id)?;
    let caller = session.require_user()?;

    let checkout = state
        .checkout
        .get_checkout(checkout_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Checkout {id} not found")))?;
    if !session.is_admin() && checkout.buyer_id() != Some(caller.user_id) {
        return Err(MarketError::Forbidden.into());
    }

    Ok(Json(CheckoutStatusResponse {
        checkout_id,
        domain_id: checkout.domain_id(),
        buyer_id: checkout.buyer_id(),
        state: checkout.state(),
        amount: checkout.amount(),
        currency: checkout.currency().to_string(),
        completed_steps: checkout.completed_steps().to_vec(),
        payment_id: checkout.payment_id().map(String::from),
        transaction_id: checkout.transaction_id(),
        failure_code: checkout.failure_code().map(String::from),
        failure_reason: checkout.failure_reason().map(String::from),
        refund: checkout.refund().map(|r| RefundResponse {
            payment_id: r.payment_id.clone(),
            amount: r.amount,
            reason: r.reason.clone(),
        }),
    }))
}
