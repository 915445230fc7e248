//! Listing status and category.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sale status of a listed domain.
///
/// State transitions:
/// ```text
/// Available ◄──► Reserved
///     │
///     └──► Sold
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    /// Open for offers and direct purchase.
    #[default]
    Available,

    /// Held back by the seller or an operator; no offers, no purchase.
    Reserved,

    /// Purchased (terminal state).
    Sold,
}

impl DomainStatus {
    pub fn can_reserve(&self) -> bool {
        matches!(self, DomainStatus::Available)
    }

    pub fn can_release(&self) -> bool {
        matches!(self, DomainStatus::Reserved)
    }

    pub fn can_sell(&self) -> bool {
        matches!(self, DomainStatus::Available)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DomainStatus::Sold)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Available => "available",
            DomainStatus::Reserved => "reserved",
            DomainStatus::Sold => "sold",
        }
    }
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Catalog category of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Premium,
    Business,
    #[default]
    Standard,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Premium => "premium",
            Category::Business => "business",
            Category::Standard => "standard",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "premium" => Ok(Category::Premium),
            "business" => Ok(Category::Business),
            "standard" => Ok(Category::Standard),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_available_domains_can_be_sold_or_reserved() {
        assert!(DomainStatus::Available.can_sell());
        assert!(DomainStatus::Available.can_reserve());
        assert!(!DomainStatus::Reserved.can_sell());
        assert!(!DomainStatus::Reserved.can_reserve());
        assert!(!DomainStatus::Sold.can_sell());
        assert!(!DomainStatus::Sold.can_reserve());
    }

    #[test]
    fn only_reserved_domains_can_be_released() {
        assert!(DomainStatus::Reserved.can_release());
        assert!(!DomainStatus::Available.can_release());
        assert!(!DomainStatus::Sold.can_release());
    }

    #[test]
    fn sold_is_terminal() {
        assert!(DomainStatus::Sold.is_terminal());
        assert!(!DomainStatus::Available.is_terminal());
        assert!(!DomainStatus::Reserved.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DomainStatus::Sold).unwrap(),
            "\"sold\""
        );
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Premium".parse::<Category>().unwrap(), Category::Premium);
        assert_eq!(" business ".parse::<Category>().unwrap(), Category::Business);
        assert!("luxury".parse::<Category>().is_err());
    }
}
