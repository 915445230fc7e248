//! Listing commands.

use common::{AggregateId, UserId};

use crate::command::Command;
use crate::money::Money;

use super::{Category, Domain};

/// Command to put a domain up for sale.
///
/// The target stream is derived from the lower-cased name, so a second
/// listing of the same name lands on the existing stream and is rejected.
#[derive(Debug, Clone)]
pub struct ListDomain {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub minimum_offer: Option<Money>,
    pub category: Category,
    pub owner_id: Option<UserId>,
    pub owner_email: Option<String>,
    pub is_featured: bool,
}

impl ListDomain {
    pub fn new(name: impl Into<String>, price: Money, category: Category) -> Self {
        Self {
            name: name.into().trim().to_string(),
            description: None,
            price,
            minimum_offer: None,
            category,
            owner_id: None,
            owner_email: None,
            is_featured: false,
        }
    }

    pub fn owned_by(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_owner_email(mut self, email: impl Into<String>) -> Self {
        self.owner_email = Some(email.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_minimum_offer(mut self, minimum_offer: Money) -> Self {
        self.minimum_offer = Some(minimum_offer);
        self
    }

    pub fn featured(mut self) -> Self {
        self.is_featured = true;
        self
    }

    /// Stream ID for a domain name.
    pub fn id_for_name(name: &str) -> AggregateId {
        AggregateId::derived("domain", &name.trim().to_lowercase())
    }
}

impl Command for ListDomain {
    type Aggregate = Domain;

    fn aggregate_id(&self) -> AggregateId {
        Self::id_for_name(&self.name)
    }
}

/// Command to change the terms of a listing. Unset fields stay as they are.
#[derive(Debug, Clone, Default)]
pub struct UpdateListing {
    pub domain_id: AggregateId,
    pub price: Option<Money>,
    pub minimum_offer: Option<Money>,
    /// Drops an explicit minimum offer so the 80% default applies again.
    pub clear_minimum_offer: bool,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub is_featured: Option<bool>,
}

impl UpdateListing {
    pub fn new(domain_id: AggregateId) -> Self {
        Self {
            domain_id,
            ..Default::default()
        }
    }

    pub fn price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn minimum_offer(mut self, minimum_offer: Money) -> Self {
        self.minimum_offer = Some(minimum_offer);
        self
    }

    pub fn clear_minimum_offer(mut self) -> Self {
        self.clear_minimum_offer = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn featured(mut self, is_featured: bool) -> Self {
        self.is_featured = Some(is_featured);
        self
    }
}

impl Command for UpdateListing {
    type Aggregate = Domain;

    fn aggregate_id(&self) -> AggregateId {
        self.domain_id
    }
}
