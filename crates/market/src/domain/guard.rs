//! Status predicates shared by the offer and purchase paths.
//!
//! Both are checked again inside the aggregate commands, so a stale client
//! view cannot slip an offer or a purchase past them.

use crate::aggregate::Aggregate;

use super::{Domain, DomainStatus};

/// An offer needs a seller of record and an open listing.
pub fn can_receive_offer(domain: &Domain) -> bool {
    domain.owner_id().is_some() && is_open(domain)
}

/// Anyone may buy an open listing, owned or platform inventory.
pub fn can_purchase(domain: &Domain) -> bool {
    is_open(domain)
}

fn is_open(domain: &Domain) -> bool {
    domain.id().is_some() && !domain.is_delisted() && domain.status() == DomainStatus::Available
}
