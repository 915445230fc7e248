//! Dashboard, operator refund queue and the feedback form.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use market::validation::is_valid_email;
use market::{MarketError, Notice};
use projections::{Dashboard, FeedbackMessage, NotifyError, RefundEntry};
use serde::{Deserialize, Serialize};

use super::Outcome;
use crate::error::ApiError;
use crate::session::CallerSession;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct FeedbackReceipt {
    pub recipients: usize,
}

impl FeedbackRequest {
    fn validate(&self) -> Result<(), MarketError> {
        if self.name.trim().is_empty() {
            return Err(MarketError::Validation("name is required".to_string()));
        }
        if !is_valid_email(&self.email) {
            return Err(MarketError::Validation(format!(
                "invalid email address: {}",
                self.email.trim()
            )));
        }
        if self.message.trim().is_empty() {
            return Err(MarketError::Validation("message is required".to_string()));
        }
        Ok(())
    }
}

/// GET /dashboard — the caller's domains, offers and purchases.
#[tracing::instrument(skip(state, session))]
pub async fn dashboard<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
) -> Result<Json<Dashboard>, ApiError> {
    let user_id = session.require_user()?.user_id;
    state.catch_up().await?;
    Ok(Json(state.dashboards.dashboard(user_id).await))
}

/// GET /admin/refunds — payments that bought nothing, oldest first.
#[tracing::instrument(skip(state, session))]
pub async fn refunds<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CallerSession(session): CallerSession,
) -> Result<Json<Vec<RefundEntry>>, ApiError> {
    session.require_admin()?;
    state.catch_up().await?;
    Ok(Json(state.refunds.pending().await))
}

/// POST /feedback — forward a contact form message to the site's inbox.
#[tracing::instrument(skip(state, req))]
pub async fn feedback<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<Outcome<FeedbackReceipt>>, ApiError> {
    req.validate()?;
    if state.feedback_recipients.is_empty() {
        return Err(NotifyError::NotConfigured("feedback").into());
    }

    let message = FeedbackMessage {
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        message: req.message.trim().to_string(),
        to: state.feedback_recipients.clone(),
    };
    if let Err(e) = state.mailer.send_feedback(&message).await {
        metrics::counter!("notifications_failed_total", "kind" => "feedback").increment(1);
        tracing::warn!(error = %e, "feedback not delivered");
        return Err(e.into());
    }

    Ok(Json(Outcome::new(
        FeedbackReceipt {
            recipients: message.to.len(),
        },
        Notice::success("Message sent", "Thanks for getting in touch."),
    )))
}
