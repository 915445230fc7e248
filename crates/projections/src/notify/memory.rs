//! In-memory mailer for tests and local development.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{FeedbackMessage, Mailer, Notification, NotifyError, OfferNotification, SaleNotification};

#[derive(Debug, Default)]
struct InMemoryMailerState {
    delivered: Vec<Notification>,
    feedback: Vec<FeedbackMessage>,
    attempts: usize,
    failures_left: usize,
}

/// Mailer that keeps every message it is given.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    state: Arc<Mutex<InMemoryMailerState>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` deliveries fail.
    pub async fn fail_next(&self, count: usize) {
        self.state.lock().await.failures_left = count;
    }

    pub async fn delivered(&self) -> Vec<Notification> {
        self.state.lock().await.delivered.clone()
    }

    pub async fn feedback(&self) -> Vec<FeedbackMessage> {
        self.state.lock().await.feedback.clone()
    }

    /// Every delivery attempt, successful or not.
    pub async fn attempts(&self) -> usize {
        self.state.lock().await.attempts
    }

    async fn accept(&self, notification: Option<Notification>) -> Result<(), NotifyError> {
        let mut state = self.state.lock().await;
        state.attempts += 1;
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(NotifyError::Rejected("mail endpoint unavailable".into()));
        }
        if let Some(notification) = notification {
            state.delivered.push(notification);
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn notify_offer(&self, notification: &OfferNotification) -> Result<(), NotifyError> {
        self.accept(Some(Notification::Offer(notification.clone())))
            .await
    }

    async fn notify_sale(&self, notification: &SaleNotification) -> Result<(), NotifyError> {
        self.accept(Some(Notification::Sale(notification.clone())))
            .await
    }

    async fn send_feedback(&self, feedback: &FeedbackMessage) -> Result<(), NotifyError> {
        self.accept(None).await?;
        self.state.lock().await.feedback.push(feedback.clone());
        Ok(())
    }
}
