//! Caller session from request headers.
//!
//! Authentication happens in front of this service; the gateway forwards
//! the verified caller as `x-user-id`, `x-user-email` and `x-user-role`.
//! A request without `x-user-id` is anonymous.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::UserId;
use market::Session;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor for the [`Session`] of the caller.
#[derive(Debug, Clone)]
pub struct CallerSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for CallerSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_from_headers(&parts.headers).map(CallerSession)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
            .map_err(|_| ApiError::BadRequest(format!("{name} is not valid text"))),
    }
}

fn session_from_headers(headers: &HeaderMap) -> Result<Session, ApiError> {
    let Some(raw_id) = header(headers, USER_ID_HEADER)? else {
        return Ok(Session::anonymous());
    };
    let user_id: UserId = raw_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{USER_ID_HEADER} must be a UUID")))?;
    let email = header(headers, USER_EMAIL_HEADER)?.map(String::from);

    match header(headers, USER_ROLE_HEADER)? {
        Some(role) if role.eq_ignore_ascii_case("admin") => Ok(Session::admin(user_id, email)),
        _ => Ok(Session::user(user_id, email)),
    }
}
