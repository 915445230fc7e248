//! Mailer that posts to the site's notification functions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{FeedbackMessage, Mailer, NotifyError, OfferNotification, SaleNotification};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Endpoints for each kind of outbound mail. Unset endpoints are skipped.
#[derive(Debug, Clone, Default)]
pub struct MailerConfig {
    pub offer_url: Option<String>,
    pub sale_url: Option<String>,
    pub feedback_url: Option<String>,
}

#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    config: MailerConfig,
}

impl HttpMailer {
    pub fn new(config: MailerConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, body: &T) -> Result<(), NotifyError> {
        self.client
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[tracing::instrument(skip(self, notification), fields(domain = %notification.domain_name))]
    async fn notify_offer(&self, notification: &OfferNotification) -> Result<(), NotifyError> {
        let url = self
            .config
            .offer_url
            .as_deref()
            .ok_or(NotifyError::NotConfigured("offer"))?;
        self.post(url, notification).await
    }

    #[tracing::instrument(skip(self, notification), fields(domain = %notification.domain_name))]
    async fn notify_sale(&self, notification: &SaleNotification) -> Result<(), NotifyError> {
        // Sale mail is optional; without an endpoint there is nothing to do.
        let Some(url) = self.config.sale_url.as_deref() else {
            tracing::debug!("no sale notification endpoint, skipping");
            return Ok(());
        };
        self.post(url, notification).await
    }

    #[tracing::instrument(skip(self, feedback))]
    async fn send_feedback(&self, feedback: &FeedbackMessage) -> Result<(), NotifyError> {
        let url = self
            .config
            .feedback_url
            .as_deref()
            .ok_or(NotifyError::NotConfigured("feedback"))?;
        self.post(url, feedback).await
    }
}
