//! Offer lifecycle status.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of an offer.
///
/// State transitions:
/// ```text
/// Pending ──► Accepted
///    │
///    └──────► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    /// Waiting for the seller's decision.
    #[default]
    Pending,

    /// Seller accepted the offer (terminal state).
    Accepted,

    /// Seller declined the offer (terminal state).
    Rejected,
}

impl OfferStatus {
    /// Returns true if the seller can still decide on the offer.
    pub fn can_resolve(&self) -> bool {
        matches!(self, OfferStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferStatus::Accepted | OfferStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which submission path an offer came through.
///
/// The simple form only requires a positive amount of at least $1; the
/// detailed form also holds the amount to the listing's minimum offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OfferForm {
    #[default]
    Simple,
    Detailed,
}

impl OfferForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferForm::Simple => "simple",
            OfferForm::Detailed => "detailed",
        }
    }
}

/// The seller's answer to a pending offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    /// The status an offer ends up in after this decision.
    pub fn outcome(&self) -> OfferStatus {
        match self {
            Decision::Accept => OfferStatus::Accepted,
            Decision::Reject => OfferStatus::Rejected,
        }
    }
}

/// Error returned when parsing an unknown decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown decision: {0} (expected accept or reject)")]
pub struct UnknownDecision(pub String);

impl FromStr for Decision {
    type Err = UnknownDecision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Decision::Accept),
            "reject" => Ok(Decision::Reject),
            _ => Err(UnknownDecision(s.to_string())),
        }
    }
}
