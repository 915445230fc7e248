//! Payment widget trait and implementations.

pub mod memory;
pub mod paypal;

use std::sync::Arc;

use async_trait::async_trait;
use market::{Money, PaymentConfirmation};
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;

pub use memory::InMemoryPaymentWidget;
pub use paypal::{PayPalConfig, PayPalWidget};

/// Currencies the marketplace charges in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment order opened with the provider, not yet captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub order_id: String,
    pub amount: Money,
    pub currency: Currency,

    /// Where the buyer approves the payment, for providers that need it.
    pub approve_url: Option<String>,
}

/// The external payment round trip: open an order, then capture it.
///
/// Implementations own their network timeouts; the checkout coordinator
/// applies an overall deadline and cancellation on top.
#[async_trait]
pub trait PaymentWidget: Send + Sync {
    /// Opens a payment order for `amount`.
    async fn create_order(
        &self,
        amount: Money,
        currency: Currency,
    ) -> Result<PaymentOrder, CheckoutError>;

    /// Captures an approved order and returns the provider's payment reference.
    async fn capture(&self, order: &PaymentOrder) -> Result<PaymentConfirmation, CheckoutError>;

    /// Opens and captures an order in one go.
    async fn charge(
        &self,
        amount: Money,
        currency: Currency,
    ) -> Result<PaymentConfirmation, CheckoutError> {
        let order = self.create_order(amount, currency).await?;
        self.capture(&order).await
    }
}

#[async_trait]
impl<W: PaymentWidget + ?Sized> PaymentWidget for Arc<W> {
    async fn create_order(
        &self,
        amount: Money,
        currency: Currency,
    ) -> Result<PaymentOrder, CheckoutError> {
        (**self).create_order(amount, currency).await
    }

    async fn capture(&self, order: &PaymentOrder) -> Result<PaymentConfirmation, CheckoutError> {
        (**self).capture(order).await
    }

    async fn charge(
        &self,
        amount: Money,
        currency: Currency,
    ) -> Result<PaymentConfirmation, CheckoutError> {
        (**self).charge(amount, currency).await
    }
}
