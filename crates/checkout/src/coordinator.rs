//! Checkout coordinator: drives one purchase from payment to sale.

use std::time::{Duration, Instant};

use common::{AggregateId, UserId};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use market::{
    Aggregate, AggregateEvent, DomainService, MarketError, Money, PaymentConfirmation,
    PurchaseService, Session, Transaction, TransactionError,
};
use tokio_util::sync::CancellationToken;

use crate::aggregate::Checkout;
use crate::error::{CheckoutError, Result};
use crate::events::{CheckoutEvent, RefundFlaggedData};
use crate::payment::{Currency, PaymentWidget};
use crate::purchase;

/// How long the payment round trip may take when not configured otherwise.
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Starts a checkout for one domain.
#[derive(Debug, Clone)]
pub struct StartCheckout {
    pub checkout_id: AggregateId,
    pub domain_id: AggregateId,
}

impl StartCheckout {
    pub fn new(domain_id: AggregateId) -> Self {
        Self {
            checkout_id: AggregateId::new(),
            domain_id,
        }
    }
}

/// A checkout that bought its domain.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub checkout_id: AggregateId,
    pub transaction: Transaction,

    /// True when the payment had already been recorded by an earlier call.
    pub replayed: bool,
}

/// The saga being recorded by one coordinator call.
struct Run {
    checkout: Checkout,
    checkout_id: AggregateId,
    domain_id: AggregateId,
    version: Version,
    actor: UserId,
}

impl Run {
    fn new(checkout_id: AggregateId, domain_id: AggregateId, actor: UserId) -> Self {
        Self {
            checkout: Checkout::default(),
            checkout_id,
            domain_id,
            version: Version::initial(),
            actor,
        }
    }
}

/// Orchestrates checkouts as event-sourced purchase sagas.
///
/// Steps are `capture_payment` then `commit_sale`. When the sale cannot be
/// committed after the payment was captured, the compensation `flag_refund`
/// records the payment for an operator to refund. A failure that leaves the
/// payment neither sold nor flagged is returned as
/// [`CheckoutError::Unsettled`].
pub struct CheckoutCoordinator<S, W>
where
    S: EventStore,
    W: PaymentWidget,
{
    store: S,
    domains: DomainService<S>,
    purchases: PurchaseService<S>,
    widget: W,
    payment_timeout: Duration,
}

impl<S, W> CheckoutCoordinator<S, W>
where
    S: EventStore + Clone,
    W: PaymentWidget,
{
    pub fn new(store: S, widget: W) -> Self {
        Self {
            domains: DomainService::new(store.clone()),
            purchases: PurchaseService::new(store.clone()),
            store,
            widget,
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
        }
    }

    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }
}

impl<S, W> CheckoutCoordinator<S, W>
where
    S: EventStore,
    W: PaymentWidget,
{
    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn purchases(&self) -> &PurchaseService<S> {
        &self.purchases
    }

    /// Charges the caller the domain's price and sells them the domain.
    ///
    /// The payment round trip is bounded by the configured timeout and
    /// abandoned when `cancel` fires. Nothing has been captured in either
    /// case, so the checkout simply fails.
    #[tracing::instrument(skip(self, session, cancel), fields(checkout_id = %cmd.checkout_id))]
    pub async fn pay_now(
        &self,
        session: &Session,
        cmd: StartCheckout,
        cancel: &CancellationToken,
    ) -> Result<CheckoutOutcome> {
        let started = Instant::now();
        let domain = self
            .purchases
            .check_purchasable(session, cmd.domain_id)
            .await?;
        let buyer_id = session.require_user()?.user_id;
        let amount = domain.price();

        let mut run = self
            .start(cmd.checkout_id, cmd.domain_id, buyer_id, amount)
            .await?;

        tracing::info!(step = purchase::STEP_CAPTURE_PAYMENT, "checkout step started");
        self.record(&mut run, CheckoutEvent::step_started(purchase::STEP_CAPTURE_PAYMENT))
            .await?;

        let confirmation = match self.capture(amount, cancel).await {
            Ok(confirmation) => confirmation,
            Err(e) => {
                self.fail(&mut run, purchase::STEP_CAPTURE_PAYMENT, &e).await?;
                observe(started, "failed");
                return Err(e);
            }
        };
        let result = self.settle(&mut run, session, &confirmation).await;
        observe(started, outcome_label(&result));
        result
    }

    /// Records a payment the buyer completed in the client-side widget and
    /// sells them the domain.
    ///
    /// Unlike [`pay_now`](Self::pay_now) there is no availability check up
    /// front: the money is already taken, so a domain that is no longer for
    /// sale must still leave a failed transaction and a flagged refund.
    #[tracing::instrument(
        skip(self, session, confirmation),
        fields(checkout_id = %cmd.checkout_id, payment_id = %confirmation.payment_id)
    )]
    pub async fn confirm(
        &self,
        session: &Session,
        cmd: StartCheckout,
        confirmation: PaymentConfirmation,
    ) -> Result<CheckoutOutcome> {
        let started = Instant::now();
        let buyer_id = session.require_user()?.user_id;
        if confirmation.payment_id.trim().is_empty() {
            return Err(MarketError::from(TransactionError::EmptyPaymentId).into());
        }
        let domain = self
            .domains
            .get_domain(cmd.domain_id)
            .await?
            .ok_or(MarketError::NotFound {
                aggregate_type: "Domain",
                aggregate_id: cmd.domain_id,
            })?;

        let mut run = Run::new(cmd.checkout_id, cmd.domain_id, buyer_id);
        let result = match self.begin(&mut run, buyer_id, domain.price()).await {
            Ok(()) => self.settle(&mut run, session, &confirmation).await,
            Err(e) => Err(unsettled(&run, &confirmation, e)),
        };
        observe(started, outcome_label(&result));
        result
    }

    /// Loads a checkout by ID from the event store.
    pub async fn get_checkout(&self, checkout_id: AggregateId) -> Result<Option<Checkout>> {
        let events = self.store.get_events_for_aggregate(checkout_id).await?;

        if events.is_empty() {
            return Ok(None);
        }

        let mut checkout = Checkout::default();
        for envelope in events {
            let version = envelope.version;
            let event: CheckoutEvent = serde_json::from_value(envelope.payload)?;
            checkout.apply(event);
            checkout.set_version(version);
        }
        Ok(Some(checkout))
    }

    async fn capture(
        &self,
        amount: Money,
        cancel: &CancellationToken,
    ) -> Result<PaymentConfirmation> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CheckoutError::Cancelled),
            result = tokio::time::timeout(
                self.payment_timeout,
                self.widget.charge(amount, Currency::Usd),
            ) => result.map_err(|_| CheckoutError::PaymentTimeout {
                seconds: self.payment_timeout.as_secs(),
            })?,
        }
    }

    /// Records a captured payment and commits the sale.
    ///
    /// Every failure from here on concerns money already taken, see
    /// [`unsettled`].
    async fn settle(
        &self,
        run: &mut Run,
        session: &Session,
        confirmation: &PaymentConfirmation,
    ) -> Result<CheckoutOutcome> {
        let captured = CheckoutEvent::payment_captured(
            purchase::STEP_CAPTURE_PAYMENT,
            confirmation.payment_id.trim(),
            confirmation.order_id.clone(),
        );
        let result = match self.record(run, captured).await {
            Ok(()) => self.commit(run, session, confirmation).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(unsettled(run, confirmation, e)),
        }
    }

    async fn commit(
        &self,
        run: &mut Run,
        session: &Session,
        confirmation: &PaymentConfirmation,
    ) -> Result<CheckoutOutcome> {
        let domain_id = run.domain_id;
        tracing::info!(step = purchase::STEP_COMMIT_SALE, "checkout step started");
        self.record(run, CheckoutEvent::step_started(purchase::STEP_COMMIT_SALE))
            .await?;

        match self
            .purchases
            .confirm_payment(session, domain_id, confirmation)
            .await
        {
            Ok(outcome) => {
                let transaction_id = Transaction::id_for_payment(&confirmation.payment_id);
                self.record(
                    run,
                    CheckoutEvent::sale_committed(purchase::STEP_COMMIT_SALE, transaction_id),
                )
                .await?;
                self.record(run, CheckoutEvent::checkout_completed()).await?;

                tracing::info!(
                    checkout_id = %run.checkout_id,
                    %transaction_id,
                    replayed = outcome.replayed,
                    "checkout completed"
                );
                Ok(CheckoutOutcome {
                    checkout_id: run.checkout_id,
                    transaction: outcome.transaction,
                    replayed: outcome.replayed,
                })
            }
            Err(e) => {
                let err = CheckoutError::from(e);
                self.compensate(run, &err, confirmation).await?;
                Err(err)
            }
        }
    }

    /// Fails a checkout whose sale could not be committed.
    ///
    /// A retryable failure leaves the payment unrefunded: confirming the same
    /// payment again is idempotent and may still buy the domain.
    #[tracing::instrument(skip(self, run, err, confirmation), fields(checkout_id = %run.checkout_id))]
    async fn compensate(
        &self,
        run: &mut Run,
        err: &CheckoutError,
        confirmation: &PaymentConfirmation,
    ) -> Result<()> {
        self.record(
            run,
            CheckoutEvent::step_failed(purchase::STEP_COMMIT_SALE, err.code(), err.to_string()),
        )
        .await?;

        if err.is_retryable() {
            self.record(run, CheckoutEvent::checkout_failed(err.to_string()))
                .await?;
            tracing::warn!(
                payment_id = %confirmation.payment_id,
                error = %err,
                "sale not committed, payment may be confirmed again"
            );
            return Ok(());
        }

        self.record(
            run,
            CheckoutEvent::compensation_started(purchase::STEP_COMMIT_SALE),
        )
        .await?;

        let flagged = CheckoutEvent::RefundFlagged(RefundFlaggedData {
            checkout_id: run.checkout_id,
            domain_id: run.domain_id,
            buyer_id: run.actor,
            payment_id: confirmation.payment_id.trim().to_string(),
            amount: run.checkout.amount(),
            reason: err.code().to_string(),
            flagged_at: chrono::Utc::now(),
        });
        self.record(run, flagged).await?;
        self.record(run, CheckoutEvent::checkout_failed(err.to_string()))
            .await?;

        metrics::counter!("refunds_flagged_total").increment(1);
        tracing::warn!(
            step = purchase::STEP_FLAG_REFUND,
            payment_id = %confirmation.payment_id,
            reason = err.code(),
            "payment flagged for manual refund"
        );
        Ok(())
    }

    async fn fail(&self, run: &mut Run, step: &str, err: &CheckoutError) -> Result<()> {
        self.record(run, CheckoutEvent::step_failed(step, err.code(), err.to_string()))
            .await?;
        self.record(run, CheckoutEvent::checkout_failed(err.to_string()))
            .await?;
        tracing::warn!(checkout_id = %run.checkout_id, step, error = %err, "checkout failed");
        Ok(())
    }

    async fn start(
        &self,
        checkout_id: AggregateId,
        domain_id: AggregateId,
        buyer_id: UserId,
        amount: Money,
    ) -> Result<Run> {
        let mut run = Run::new(checkout_id, domain_id, buyer_id);
        self.begin(&mut run, buyer_id, amount).await?;
        Ok(run)
    }

    async fn begin(&self, run: &mut Run, buyer_id: UserId, amount: Money) -> Result<()> {
        let started = CheckoutEvent::checkout_started(
            run.checkout_id,
            run.domain_id,
            buyer_id,
            amount,
            Currency::Usd.as_str(),
        );
        self.record(run, started).await
    }

    /// Appends a single checkout event and applies it to the run.
    async fn record(&self, run: &mut Run, event: CheckoutEvent) -> Result<()> {
        let next_version = run.version.next();

        let envelope = EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(run.checkout_id)
            .aggregate_type(Checkout::aggregate_type())
            .version(next_version)
            .actor(Some(run.actor))
            .payload(&event)?
            .build()?;

        let options = if run.version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(run.version)
        };
        run.version = self.store.append(vec![envelope], options).await?;
        run.checkout.apply(event);
        run.checkout.set_version(run.version);
        Ok(())
    }
}

/// Maps a failure that happened after the buyer's money was taken.
///
/// A flagged refund already accounts for the payment. Anything else leaves
/// the payment without a sale, so the error carries the ids the buyer needs
/// to confirm it again and an operator needs to find it.
fn unsettled(run: &Run, confirmation: &PaymentConfirmation, err: CheckoutError) -> CheckoutError {
    if run.checkout.refund().is_some() {
        return err;
    }
    let payment_id = confirmation.payment_id.trim().to_string();
    tracing::error!(
        checkout_id = %run.checkout_id,
        %payment_id,
        domain_id = %run.domain_id,
        buyer_id = %run.actor,
        error = %err,
        "payment captured but sale not settled"
    );
    CheckoutError::Unsettled {
        checkout_id: run.checkout_id,
        payment_id,
        source: Box::new(err),
    }
}

fn outcome_label(result: &Result<CheckoutOutcome>) -> &'static str {
    match result {
        Ok(_) => "completed",
        Err(e) if e.is_already_sold() => "already_sold",
        Err(_) => "failed",
    }
}

fn observe(started: Instant, outcome: &'static str) {
    metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
    metrics::counter!("checkouts_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::InMemoryPaymentWidget;
    use crate::state::CheckoutState;
    use event_store::InMemoryEventStore;
    use market::{Category, ListDomain, TransactionStatus};

    struct Harness {
        store: InMemoryEventStore,
        coordinator: CheckoutCoordinator<InMemoryEventStore, InMemoryPaymentWidget>,
        widget: InMemoryPaymentWidget,
        admin: Session,
    }

    impl Harness {
        fn new() -> Self {
            let store = InMemoryEventStore::new();
            let widget = InMemoryPaymentWidget::new();
            let coordinator = CheckoutCoordinator::new(store.clone(), widget.clone())
                .with_payment_timeout(Duration::from_millis(100));
            Self {
                store,
                coordinator,
                widget,
                admin: Session::admin(UserId::new(), None),
            }
        }

        async fn list(&self, name: &str) -> AggregateId {
            DomainService::new(self.store.clone())
                .list_domain(
                    &self.admin,
                    ListDomain::new(name, Money::from_dollars(1000), Category::Premium),
                )
                .await
                .unwrap()
                .aggregate
                .id()
                .unwrap()
        }
    }

    fn buyer() -> Session {
        Session::user(UserId::new(), Some("buyer@example.com".into()))
    }

    #[tokio::test]
    async fn test_pay_now_sells_the_domain() {
        let h = Harness::new();
        let domain_id = h.list("shop.com").await;
        let cmd = StartCheckout::new(domain_id);
        let checkout_id = cmd.checkout_id;

        let outcome = h
            .coordinator
            .pay_now(&buyer(), cmd, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.checkout_id, checkout_id);
        assert!(!outcome.replayed);
        assert_eq!(outcome.transaction.amount(), Money::from_dollars(1000));
        assert_eq!(h.widget.capture_count().await, 1);

        let checkout = h.coordinator.get_checkout(checkout_id).await.unwrap().unwrap();
        assert_eq!(checkout.state(), CheckoutState::Completed);
        assert_eq!(checkout.completed_steps(), &["capture_payment", "commit_sale"]);
        assert_eq!(checkout.payment_id(), Some("PAY-0001"));
        assert_eq!(
            checkout.transaction_id(),
            Some(Transaction::id_for_payment("PAY-0001"))
        );
        assert!(checkout.refund().is_none());
    }

    #[tokio::test]
    async fn test_pay_now_guards_before_charging() {
        let h = Harness::new();
        let domain_id = h.list("held.com").await;
        DomainService::new(h.store.clone())
            .reserve(&h.admin, domain_id)
            .await
            .unwrap();

        let err = h
            .coordinator
            .pay_now(&buyer(), StartCheckout::new(domain_id), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "DOMAIN_UNAVAILABLE");
        assert_eq!(h.widget.capture_count().await, 0);
    }

    #[tokio::test]
    async fn test_anonymous_cannot_pay() {
        let h = Harness::new();
        let domain_id = h.list("shop.com").await;

        let err = h
            .coordinator
            .pay_now(
                &Session::anonymous(),
                StartCheckout::new(domain_id),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_declined_payment_fails_without_refund() {
        let h = Harness::new();
        let domain_id = h.list("shop.com").await;
        h.widget.set_fail_on_capture(true).await;
        let cmd = StartCheckout::new(domain_id);
        let checkout_id = cmd.checkout_id;

        let err = h
            .coordinator
            .pay_now(&buyer(), cmd, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PAYMENT_ERROR");

        let checkout = h.coordinator.get_checkout(checkout_id).await.unwrap().unwrap();
        assert_eq!(checkout.state(), CheckoutState::Failed);
        assert_eq!(checkout.failure_code(), Some("PAYMENT_ERROR"));
        assert!(checkout.refund().is_none());
    }

    #[tokio::test]
    async fn test_slow_payment_times_out() {
        let h = Harness::new();
        let domain_id = h.list("shop.com").await;
        h.widget
            .set_capture_delay(Some(Duration::from_secs(5)))
            .await;
        let cmd = StartCheckout::new(domain_id);
        let checkout_id = cmd.checkout_id;

        let err = h
            .coordinator
            .pay_now(&buyer(), cmd, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::PaymentTimeout { .. }));
        assert!(err.is_retryable());
        let checkout = h.coordinator.get_checkout(checkout_id).await.unwrap().unwrap();
        assert_eq!(checkout.failure_code(), Some("PAYMENT_TIMEOUT"));

        let domain = DomainService::new(h.store.clone())
            .get_domain(domain_id)
            .await
            .unwrap()
            .unwrap();
        assert!(domain.can_purchase());
    }

    #[tokio::test]
    async fn test_cancelled_checkout() {
        let h = Harness::new();
        let domain_id = h.list("shop.com").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h
            .coordinator
            .pay_now(&buyer(), StartCheckout::new(domain_id), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Cancelled));
        assert_eq!(h.widget.capture_count().await, 0);
    }

    #[tokio::test]
    async fn test_confirm_after_sale_flags_refund() {
        let h = Harness::new();
        let domain_id = h.list("shop.com").await;
        h.coordinator
            .confirm(
                &buyer(),
                StartCheckout::new(domain_id),
                PaymentConfirmation::new("PAY-FIRST"),
            )
            .await
            .unwrap();

        let late = StartCheckout::new(domain_id);
        let late_id = late.checkout_id;
        let err = h
            .coordinator
            .confirm(&buyer(), late, PaymentConfirmation::new("PAY-LATE"))
            .await
            .unwrap_err();
        assert!(err.is_already_sold());

        let checkout = h.coordinator.get_checkout(late_id).await.unwrap().unwrap();
        assert_eq!(checkout.state(), CheckoutState::Failed);
        let refund = checkout.refund().unwrap();
        assert_eq!(refund.payment_id, "PAY-LATE");
        assert_eq!(refund.amount, Money::from_dollars(1000));
        assert_eq!(refund.reason, "ALREADY_SOLD");

        let failed = h
            .coordinator
            .purchases()
            .get_transaction("PAY-LATE")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status(), Some(TransactionStatus::Failed));
    }

    #[tokio::test]
    async fn test_confirm_same_payment_twice_is_replayed() {
        let h = Harness::new();
        let domain_id = h.list("shop.com").await;
        let buyer = buyer();

        let first = h
            .coordinator
            .confirm(
                &buyer,
                StartCheckout::new(domain_id),
                PaymentConfirmation::new("PAY-1"),
            )
            .await
            .unwrap();
        let again = h
            .coordinator
            .confirm(
                &buyer,
                StartCheckout::new(domain_id),
                PaymentConfirmation::new("PAY-1"),
            )
            .await
            .unwrap();

        assert!(!first.replayed);
        assert!(again.replayed);
        assert_eq!(first.transaction.id(), again.transaction.id());
    }

    #[tokio::test]
    async fn test_confirm_rejects_blank_payment() {
        let h = Harness::new();
        let domain_id = h.list("shop.com").await;

        let err = h
            .coordinator
            .confirm(
                &buyer(),
                StartCheckout::new(domain_id),
                PaymentConfirmation::new("  "),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "PAYMENT_ERROR");
        assert_eq!(h.store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_confirm_unknown_domain() {
        let h = Harness::new();

        let err = h
            .coordinator
            .confirm(
                &buyer(),
                StartCheckout::new(AggregateId::new()),
                PaymentConfirmation::new("PAY-1"),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_nonexistent_checkout() {
        let h = Harness::new();
        assert!(
            h.coordinator
                .get_checkout(AggregateId::new())
                .await
                .unwrap()
                .is_none()
        );
    }
}
