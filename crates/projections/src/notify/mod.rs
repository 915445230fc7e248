//! Owner notifications and feedback mail.
//!
//! Notifications are a side effect of the event log: [`OwnerNotifier`] is a
//! projection that turns new `OfferSubmitted` and `DomainSold` events into
//! [`Notification`]s, and [`run_dispatcher`] delivers them through a
//! [`Mailer`] on its own task. A failed delivery is logged and counted but
//! never reaches the command that caused it.

mod http;
mod memory;
mod subscriber;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use http::{HttpMailer, MailerConfig};
pub use memory::InMemoryMailer;
pub use subscriber::{DELIVERY_ATTEMPTS, OwnerNotifier, run_dispatcher};

/// Email to a domain owner about a new offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferNotification {
    pub domain_name: String,

    /// Offered amount in dollars, e.g. `"900.00"`.
    pub amount: String,

    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub message: Option<String>,
    pub owner_email: String,
}

/// Email to the previous owner of a domain that was just bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleNotification {
    pub domain_name: String,
    pub amount: String,
    pub payment_id: String,
    pub owner_email: String,
}

/// Something the dispatcher has to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Offer(OfferNotification),
    Sale(SaleNotification),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Offer(_) => "offer",
            Notification::Sale(_) => "sale",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::Offer(n) => &n.owner_email,
            Notification::Sale(n) => &n.owner_email,
        }
    }
}

/// A message from the site's contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    pub to: Vec<String>,
}

/// Errors that can occur while delivering mail.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No endpoint is configured for this kind of mail.
    #[error("no endpoint configured for {0} mail")]
    NotConfigured(&'static str),

    /// The mail endpoint could not be reached or rejected the request.
    #[error("mail delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    /// The in-memory mailer was told to fail.
    #[error("mail delivery failed: {0}")]
    Rejected(String),
}

impl NotifyError {
    /// Returns true when trying the same delivery again may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NotifyError::NotConfigured(_))
    }
}

/// Outbound mail.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn notify_offer(&self, notification: &OfferNotification) -> Result<(), NotifyError>;

    async fn notify_sale(&self, notification: &SaleNotification) -> Result<(), NotifyError>;

    async fn send_feedback(&self, feedback: &FeedbackMessage) -> Result<(), NotifyError>;

    /// Delivers any owner notification.
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::Offer(n) => self.notify_offer(n).await,
            Notification::Sale(n) => self.notify_sale(n).await,
        }
    }
}

#[async_trait]
impl<M: Mailer + ?Sized> Mailer for Arc<M> {
    async fn notify_offer(&self, notification: &OfferNotification) -> Result<(), NotifyError> {
        (**self).notify_offer(notification).await
    }

    async fn notify_sale(&self, notification: &SaleNotification) -> Result<(), NotifyError> {
        (**self).notify_sale(notification).await
    }

    async fn send_feedback(&self, feedback: &FeedbackMessage) -> Result<(), NotifyError> {
        (**self).send_feedback(feedback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_notification_body() {
        let notification = OfferNotification {
            domain_name: "shop.com".to_string(),
            amount: "900.00".to_string(),
            buyer_email: "buyer@example.com".to_string(),
            buyer_phone: None,
            message: Some("Still for sale?".to_string()),
            owner_email: "owner@example.com".to_string(),
        };

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["domainName"], "shop.com");
        assert_eq!(json["amount"], "900.00");
        assert_eq!(json["buyerEmail"], "buyer@example.com");
        assert!(json["buyerPhone"].is_null());
        assert_eq!(json["message"], "Still for sale?");
        assert_eq!(json["ownerEmail"], "owner@example.com");
    }

    #[test]
    fn test_feedback_body() {
        let feedback = FeedbackMessage {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            message: "Love the catalog".to_string(),
            to: vec!["support@example.com".to_string()],
        };

        let json = serde_json::to_value(&feedback).unwrap();
        assert_eq!(json["to"][0], "support@example.com");
        assert_eq!(json["name"], "Ada");
    }
}
