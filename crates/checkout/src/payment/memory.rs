//! In-memory payment widget for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use market::{Money, PaymentConfirmation};
use tokio::sync::Mutex;

use super::{Currency, PaymentOrder, PaymentWidget};
use crate::error::CheckoutError;

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    orders: HashMap<String, Money>,
    captures: HashMap<String, Money>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_capture: bool,
    capture_delay: Option<Duration>,
}

/// Payment widget that approves everything instantly unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentWidget {
    state: Arc<Mutex<InMemoryPaymentState>>,
}

impl InMemoryPaymentWidget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following order creation fail.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.lock().await.fail_on_create = fail;
    }

    /// Makes every following capture fail as declined.
    pub async fn set_fail_on_capture(&self, fail: bool) {
        self.state.lock().await.fail_on_capture = fail;
    }

    /// Delays every following capture, to simulate a slow provider.
    pub async fn set_capture_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.capture_delay = delay;
    }

    pub async fn capture_count(&self) -> usize {
        self.state.lock().await.captures.len()
    }

    /// Amount captured under `payment_id`, if any.
    pub async fn captured(&self, payment_id: &str) -> Option<Money> {
        self.state.lock().await.captures.get(payment_id).copied()
    }
}

#[async_trait]
impl PaymentWidget for InMemoryPaymentWidget {
    async fn create_order(
        &self,
        amount: Money,
        currency: Currency,
    ) -> Result<PaymentOrder, CheckoutError> {
        let mut state = self.state.lock().await;
        if state.fail_on_create {
            return Err(CheckoutError::Payment("payment provider unavailable".into()));
        }

        state.next_id += 1;
        let order_id = format!("ORDER-{:04}", state.next_id);
        state.orders.insert(order_id.clone(), amount);

        Ok(PaymentOrder {
            order_id,
            amount,
            currency,
            approve_url: None,
        })
    }

    async fn capture(&self, order: &PaymentOrder) -> Result<PaymentConfirmation, CheckoutError> {
        let delay = self.state.lock().await.capture_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if state.fail_on_capture {
            return Err(CheckoutError::Payment("payment declined".into()));
        }
        let amount = state
            .orders
            .remove(&order.order_id)
            .ok_or_else(|| CheckoutError::Payment(format!("unknown order {}", order.order_id)))?;

        let payment_id = order.order_id.replacen("ORDER", "PAY", 1);
        state.captures.insert(payment_id.clone(), amount);

        Ok(PaymentConfirmation {
            payment_id,
            order_id: Some(order.order_id.clone()),
        })
    }
}
