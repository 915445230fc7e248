//! Direct purchase: turning a confirmed payment into a sale.
//!
//! A sale writes two streams at once: the transaction keyed on the payment
//! and the domain it buys. Both go through a single multi-stream append, and
//! the domain write is conditional on the version the sale was decided
//! against, so a domain is sold at most once however many buyers race for it.

use common::{AggregateId, UserId};
use event_store::{EventStore, EventStoreError};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::command::CommandHandler;
use crate::domain::{Domain, ListingError};
use crate::error::MarketError;
use crate::session::Session;
use crate::transaction::{
    FailureReason, PaymentRecord, Transaction, TransactionError, TransactionStatus,
};

/// How often a sale is re-staged after losing an append race to an
/// unrelated write on one of its streams.
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// What the payment widget hands back once the buyer has paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Provider reference for the captured payment.
    pub payment_id: String,

    /// Provider order the payment was captured from, when known.
    #[serde(default)]
    pub order_id: Option<String>,
}

impl PaymentConfirmation {
    pub fn new(payment_id: impl Into<String>) -> Self {
        Self {
            payment_id: payment_id.into(),
            order_id: None,
        }
    }
}

/// Result of confirming a payment.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub transaction: Transaction,

    /// True when the payment had already been recorded and nothing new
    /// was written.
    pub replayed: bool,
}

/// Service for the direct purchase path.
pub struct PurchaseService<S: EventStore> {
    domains: CommandHandler<S, Domain>,
    transactions: CommandHandler<S, Transaction>,
}

impl<S: EventStore + Clone> PurchaseService<S> {
    pub fn new(store: S) -> Self {
        Self {
            domains: CommandHandler::new(store.clone()),
            transactions: CommandHandler::new(store),
        }
    }
}

impl<S: EventStore> PurchaseService<S> {
    /// Checks that the caller may start paying for `domain_id`.
    ///
    /// Run before the payment widget is invoked; the sale itself checks
    /// again when the payment is confirmed.
    #[tracing::instrument(skip(self, session))]
    pub async fn check_purchasable(
        &self,
        session: &Session,
        domain_id: AggregateId,
    ) -> Result<Domain, MarketError> {
        session.require_user()?;
        let domain = self.domains.load_required(domain_id).await?;

        if domain.status().is_terminal() {
            return Err(ListingError::AlreadySold.into());
        }
        if domain.is_delisted() {
            return Err(ListingError::Delisted.into());
        }
        if !domain.can_purchase() {
            return Err(ListingError::NotAvailable {
                status: domain.status(),
            }
            .into());
        }
        Ok(domain)
    }

    /// Records a confirmed payment for `domain_id` as its sale.
    ///
    /// Confirming the same payment again returns the transaction recorded
    /// the first time. A payment that arrives after the domain was sold, or
    /// taken off the market, is recorded as a failed transaction and the
    /// listing error is returned so the payment can be refunded.
    #[tracing::instrument(skip(self, session, confirmation), fields(payment_id = %confirmation.payment_id))]
    pub async fn confirm_payment(
        &self,
        session: &Session,
        domain_id: AggregateId,
        confirmation: &PaymentConfirmation,
    ) -> Result<PurchaseOutcome, MarketError> {
        let buyer_id = session.require_user()?.user_id;
        let payment_id = confirmation.payment_id.trim();
        if payment_id.is_empty() {
            return Err(TransactionError::EmptyPaymentId.into());
        }
        let transaction_id = Transaction::id_for_payment(payment_id);

        let mut attempt = 0;
        loop {
            attempt += 1;

            let transaction = self.transactions.load(transaction_id).await?;
            if transaction.id().is_some() {
                return self.replay(transaction, domain_id).await;
            }

            let domain = self.domains.load_required(domain_id).await?;
            let payment = PaymentRecord {
                domain_id,
                buyer_id,
                amount: domain.price(),
                payment_id: payment_id.to_string(),
            };

            let sale = match domain.sell(buyer_id, transaction_id, payment_id) {
                Ok(events) => events,
                Err(e) => {
                    self.record_failure(transaction, &payment, &e, buyer_id)
                        .await;
                    return Err(e.into());
                }
            };

            let events = transaction.complete(&payment)?;
            let mut transaction = self.transactions.stage(
                transaction_id,
                transaction,
                events,
                Some(buyer_id),
            )?;
            let mut domain = self
                .domains
                .stage(domain_id, domain, sale, Some(buyer_id))?;

            let result = self
                .transactions
                .store()
                .append_streams(vec![transaction.take_write(), domain.take_write()])
                .await;

            match result {
                Ok(versions) => {
                    let transaction = transaction.committed(versions[0]).aggregate;
                    domain.committed(versions[1]);

                    metrics::counter!("purchases_completed_total").increment(1);
                    tracing::info!(
                        %domain_id,
                        %transaction_id,
                        buyer_id = %buyer_id,
                        amount = %transaction.amount(),
                        "domain sold"
                    );
                    return Ok(PurchaseOutcome {
                        transaction,
                        replayed: false,
                    });
                }
                Err(e @ EventStoreError::ConcurrencyConflict { .. })
                    if attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    tracing::debug!(
                        attempt,
                        conflict = ?e.conflicting_aggregate(),
                        "sale lost an append race, re-reading"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Loads the transaction recorded for `payment_id`, if any.
    #[tracing::instrument(skip(self))]
    pub async fn get_transaction(
        &self,
        payment_id: &str,
    ) -> Result<Option<Transaction>, MarketError> {
        self.transactions
            .load_existing(Transaction::id_for_payment(payment_id))
            .await
    }

    async fn replay(
        &self,
        transaction: Transaction,
        domain_id: AggregateId,
    ) -> Result<PurchaseOutcome, MarketError> {
        if transaction.domain_id() != Some(domain_id) {
            return Err(TransactionError::PaymentReused {
                payment_id: transaction.payment_id().to_string(),
            }
            .into());
        }

        match (transaction.status(), transaction.failure_reason()) {
            (Some(TransactionStatus::Completed), _) => {
                tracing::info!(payment_id = transaction.payment_id(), "payment already recorded");
                Ok(PurchaseOutcome {
                    transaction,
                    replayed: true,
                })
            }
            (_, Some(FailureReason::AlreadySold)) => Err(ListingError::AlreadySold.into()),
            // Refused once, refused for good: the domain may be back on sale,
            // but this payment is already queued for a refund.
            _ => Err(TransactionError::AlreadyRecorded {
                payment_id: transaction.payment_id().to_string(),
            }
            .into()),
        }
    }

    /// Writes the failed transaction for a payment that could not buy the
    /// domain. The listing error is what the caller sees either way.
    async fn record_failure(
        &self,
        transaction: Transaction,
        payment: &PaymentRecord,
        error: &ListingError,
        buyer_id: UserId,
    ) {
        let reason = match error {
            ListingError::AlreadySold => {
                metrics::counter!("purchases_already_sold_total").increment(1);
                FailureReason::AlreadySold
            }
            _ => FailureReason::Unavailable,
        };

        let events = match transaction.fail(payment, reason) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "could not record failed transaction");
                return;
            }
        };

        let transaction_id = Transaction::id_for_payment(&payment.payment_id);
        match self
            .transactions
            .persist(transaction_id, transaction, events, Some(buyer_id))
            .await
        {
            Ok(_) => tracing::warn!(
                domain_id = %payment.domain_id,
                payment_id = %payment.payment_id,
                %reason,
                "payment captured for a domain that could not be sold"
            ),
            Err(e) => tracing::error!(
                domain_id = %payment.domain_id,
                payment_id = %payment.payment_id,
                error = %e,
                "failed to record failed transaction"
            ),
        }
    }
}

impl<S: EventStore + Clone> Clone for PurchaseService<S> {
    fn clone(&self) -> Self {
        Self {
            domains: self.domains.clone(),
            transactions: self.transactions.clone(),
        }
    }
}
