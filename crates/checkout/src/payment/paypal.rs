//! PayPal Orders v2 payment widget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use market::{Money, PaymentConfirmation};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{Currency, PaymentOrder, PaymentWidget};
use crate::error::CheckoutError;

pub const SANDBOX_API_BASE: &str = "https://api-m.sandbox.paypal.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials and endpoint for the PayPal REST API.
#[derive(Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub api_base: String,
}

impl PayPalConfig {
    pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            api_base: SANDBOX_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("client_id", &self.client_id)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

struct AccessToken {
    token: SecretString,
    expires_at: Instant,
}

/// Payment widget backed by PayPal's Orders v2 API.
///
/// Capture succeeds once the buyer has approved the order at
/// [`PaymentOrder::approve_url`].
#[derive(Clone)]
pub struct PayPalWidget {
    client: Client,
    config: PayPalConfig,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl PayPalWidget {
    pub fn new(config: PayPalConfig) -> Result<Self, CheckoutError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CheckoutError::Payment(format!("http client: {e}")))?;
        Ok(Self {
            client,
            config,
            token: Arc::new(Mutex::new(None)),
        })
    }

    async fn access_token(&self) -> Result<SecretString, CheckoutError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.token.clone());
        }

        let response: TokenResponse = self
            .client
            .post(format!("{}/v1/oauth2/token", self.config.api_base))
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(provider_error)?
            .error_for_status()
            .map_err(provider_error)?
            .json()
            .await
            .map_err(provider_error)?;

        // Refresh a minute early so a token never expires mid-request.
        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(60));
        let token = SecretString::from(response.access_token);
        *cached = Some(AccessToken {
            token: token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token)
    }
}

fn provider_error(e: reqwest::Error) -> CheckoutError {
    tracing::warn!(error = %e, "paypal request failed");
    CheckoutError::Payment(format!("paypal: {e}"))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Serialize)]
struct CreateOrderRequest {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Serialize)]
struct PurchaseUnit {
    amount: Amount,
}

#[derive(Serialize)]
struct Amount {
    currency_code: &'static str,
    value: String,
}

impl CreateOrderRequest {
    fn capture(amount: Money, currency: Currency) -> Self {
        Self {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnit {
                amount: Amount {
                    currency_code: currency.as_str(),
                    value: amount.to_decimal_string(),
                },
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    purchase_units: Vec<CapturedUnit>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct CapturedUnit {
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    status: String,
}

impl OrderResponse {
    fn approve_url(&self) -> Option<String> {
        self.links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.clone())
    }

    /// The completed capture of a captured order.
    fn completed_capture(&self) -> Result<&Capture, CheckoutError> {
        if self.status != "COMPLETED" {
            return Err(CheckoutError::Payment(format!(
                "order {} is {}",
                self.id, self.status
            )));
        }
        self.purchase_units
            .iter()
            .filter_map(|u| u.payments.as_ref())
            .flat_map(|p| p.captures.iter())
            .find(|c| c.status == "COMPLETED")
            .ok_or_else(|| CheckoutError::Payment(format!("order {} has no capture", self.id)))
    }
}

#[async_trait]
impl PaymentWidget for PayPalWidget {
    #[tracing::instrument(skip(self))]
    async fn create_order(
        &self,
        amount: Money,
        currency: Currency,
    ) -> Result<PaymentOrder, CheckoutError> {
        let token = self.access_token().await?;
        let order: OrderResponse = self
            .client
            .post(format!("{}/v2/checkout/orders", self.config.api_base))
            .bearer_auth(token.expose_secret())
            .json(&CreateOrderRequest::capture(amount, currency))
            .send()
            .await
            .map_err(provider_error)?
            .error_for_status()
            .map_err(provider_error)?
            .json()
            .await
            .map_err(provider_error)?;

        tracing::debug!(order_id = %order.id, status = %order.status, "paypal order created");
        Ok(PaymentOrder {
            approve_url: order.approve_url(),
            order_id: order.id,
            amount,
            currency,
        })
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn capture(&self, order: &PaymentOrder) -> Result<PaymentConfirmation, CheckoutError> {
        let token = self.access_token().await?;
        let captured: OrderResponse = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.config.api_base, order.order_id
            ))
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(provider_error)?
            .error_for_status()
            .map_err(provider_error)?
            .json()
            .await
            .map_err(provider_error)?;

        let capture = captured.completed_capture()?;
        Ok(PaymentConfirmation {
            payment_id: capture.id.clone(),
            order_id: Some(captured.id.clone()),
        })
    }
}
