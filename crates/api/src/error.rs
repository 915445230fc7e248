//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use common::AggregateId;
use market::{MarketError, Notice};
use projections::{NotifyError, ProjectionError};
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request, rejected before reaching any service.
    BadRequest(String),
    /// Resource not found in a read model.
    NotFound(String),
    Market(MarketError),
    Checkout(CheckoutError),
    /// Read models could not be brought up to date.
    Projection(ProjectionError),
    /// Feedback mail could not be sent.
    Notify(NotifyError),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    title: String,
    message: String,
    retryable: bool,

    /// Set when a payment was captured without a sale: confirm this payment
    /// instead of paying again.
    #[serde(skip_serializing_if = "Option::is_none")]
    checkout_id: Option<AggregateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_id: Option<String>,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Market(e) => e.code(),
            ApiError::Checkout(e) => e.code(),
            ApiError::Projection(_) => "STORE_ERROR",
            ApiError::Notify(_) => "NOTIFICATION_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Market(e) => e.is_retryable(),
            ApiError::Checkout(e) => e.is_retryable(),
            ApiError::Projection(e) => e.is_retryable(),
            ApiError::Notify(e) => e.is_retryable(),
            ApiError::BadRequest(_) | ApiError::NotFound(_) | ApiError::Internal(_) => false,
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            ApiError::BadRequest(msg) => Notice::error("Please check your input", msg.clone()),
            ApiError::NotFound(msg) => Notice::error("Not found", msg.clone()),
            ApiError::Market(e) => e.notice(),
            ApiError::Checkout(e) => e.notice(),
            ApiError::Projection(_) => Notice::error(
                "Something went wrong",
                "We could not reach the marketplace. Please try again shortly.",
            ),
            ApiError::Notify(_) => Notice::error(
                "Message not sent",
                "We could not send your message. Please try again later.",
            ),
            ApiError::Internal(_) => Notice::error(
                "Something went wrong",
                "Please try again. If the problem persists, contact support.",
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "UNAUTHENTICATED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "NOT_SELLER" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "BELOW_MINIMUM" => StatusCode::UNPROCESSABLE_ENTITY,
            "NO_OWNER"
            | "DOMAIN_UNAVAILABLE"
            | "ALREADY_SOLD"
            | "ALREADY_LISTED"
            | "ALREADY_RECORDED"
            | "INVALID_STATE_TRANSITION"
            | "CONFLICT" => StatusCode::CONFLICT,
            "PAYMENT_ERROR" => StatusCode::PAYMENT_REQUIRED,
            "PAYMENT_TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
            "NOTIFICATION_ERROR" => StatusCode::BAD_GATEWAY,
            "CANCELLED" | "PAYMENT_UNSETTLED" => StatusCode::SERVICE_UNAVAILABLE,
            _ if self.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = ?self, "request failed");
        } else {
            tracing::debug!(code = self.code(), "request rejected");
        }

        let notice = self.notice();
        let unsettled = match &self {
            ApiError::Checkout(e) => e.unsettled_payment(),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                title: notice.title,
                message: notice.message,
                retryable: self.is_retryable(),
                checkout_id: unsettled.map(|(checkout_id, _)| checkout_id),
                payment_id: unsettled.map(|(_, payment_id)| payment_id.to_string()),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        ApiError::Market(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}

impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        ApiError::Notify(err)
    }
}
