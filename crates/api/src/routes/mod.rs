//! HTTP route handlers.

pub mod account;
pub mod checkout;
pub mod domains;
pub mod health;
pub mod metrics;
pub mod offers;

use common::AggregateId;
use market::Notice;
use serde::Serialize;

use crate::error::ApiError;

/// A successful write: what changed plus the notice to show.
#[derive(Serialize)]
pub struct Outcome<T: Serialize> {
    #[serde(flatten)]
    pub body: T,
    pub notice: Notice,
}

impl<T: Serialize> Outcome<T> {
    pub fn new(body: T, notice: Notice) -> Self {
        Self { body, notice }
    }
}

pub(crate) fn parse_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid id: {id}")))
}
