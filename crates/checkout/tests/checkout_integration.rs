//! Integration tests for the purchase saga.

use std::time::Duration;

use async_trait::async_trait;
use checkout::{
    CheckoutCoordinator, CheckoutError, CheckoutEvent, CheckoutState, Currency,
    InMemoryPaymentWidget, PaymentOrder, PaymentWidget, StartCheckout,
};
use common::{AggregateId, UserId};
use event_store::{EventStore, InMemoryEventStore};
use market::{
    Aggregate, Category, DomainService, DomainStatus, ListDomain, Money, PaymentConfirmation,
    Session,
};
use tokio_util::sync::CancellationToken;

type TestCoordinator = CheckoutCoordinator<InMemoryEventStore, InMemoryPaymentWidget>;

struct TestHarness {
    store: InMemoryEventStore,
    coordinator: TestCoordinator,
    widget: InMemoryPaymentWidget,
    domains: DomainService<InMemoryEventStore>,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryEventStore::new();
        let widget = InMemoryPaymentWidget::new();
        let coordinator = CheckoutCoordinator::new(store.clone(), widget.clone())
            .with_payment_timeout(Duration::from_secs(5));

        Self {
            domains: DomainService::new(store.clone()),
            store,
            coordinator,
            widget,
        }
    }

    async fn list(&self, name: &str, dollars: i64) -> AggregateId {
        let admin = Session::admin(UserId::new(), None);
        self.domains
            .list_domain(
                &admin,
                ListDomain::new(name, Money::from_dollars(dollars), Category::Business),
            )
            .await
            .unwrap()
            .aggregate
            .id()
            .unwrap()
    }

    async fn refunds_flagged(&self) -> Vec<String> {
        self.store
            .get_events_by_type("RefundFlagged")
            .await
            .unwrap()
            .into_iter()
            .map(|e| match serde_json::from_value(e.payload).unwrap() {
                CheckoutEvent::RefundFlagged(data) => data.payment_id,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }
}

#[tokio::test]
async fn test_happy_path_buyer_owns_domain() {
    let h = TestHarness::new();
    let domain_id = h.list("bakery.com", 2500).await;
    let buyer_id = UserId::new();
    let cmd = StartCheckout::new(domain_id);
    let checkout_id = cmd.checkout_id;

    let outcome = h
        .coordinator
        .pay_now(
            &Session::user(buyer_id, None),
            cmd,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.transaction.amount(), Money::from_dollars(2500));

    let domain = h.domains.get_domain(domain_id).await.unwrap().unwrap();
    assert_eq!(domain.status(), DomainStatus::Sold);
    assert_eq!(domain.owner_id(), Some(buyer_id));

    let checkout = h.coordinator.get_checkout(checkout_id).await.unwrap().unwrap();
    assert_eq!(checkout.state(), CheckoutState::Completed);
    assert_eq!(checkout.buyer_id(), Some(buyer_id));
    assert_eq!(checkout.domain_id(), Some(domain_id));
    assert_eq!(checkout.amount(), Money::from_dollars(2500));
    assert!(h.refunds_flagged().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_checkouts_sell_once_and_refund_the_rest() {
    let h = TestHarness::new();
    let domain_id = h.list("contested.com", 900).await;
    let alice = Session::user(UserId::new(), None);
    let bob = Session::user(UserId::new(), None);
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        h.coordinator
            .pay_now(&alice, StartCheckout::new(domain_id), &cancel),
        h.coordinator
            .pay_now(&bob, StartCheckout::new(domain_id), &cancel),
    );

    let wins = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    let loser = [a, b].into_iter().find_map(Result::err).unwrap();
    assert!(loser.is_already_sold() || loser.code() == "DOMAIN_UNAVAILABLE");

    // Every captured payment either bought the domain or is queued for refund.
    let refunds = h.refunds_flagged().await;
    assert_eq!(h.widget.capture_count().await, 1 + refunds.len());

    let completed = h
        .store
        .get_events_by_type("TransactionCompleted")
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
}

#[tokio::test]
async fn test_widget_confirmation_after_sale_is_refunded() {
    let h = TestHarness::new();
    let domain_id = h.list("late.com", 400).await;

    h.coordinator
        .pay_now(
            &Session::user(UserId::new(), None),
            StartCheckout::new(domain_id),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let err = h
        .coordinator
        .confirm(
            &Session::user(UserId::new(), None),
            StartCheckout::new(domain_id),
            PaymentConfirmation::new("PAY-CLIENT-9"),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "ALREADY_SOLD");
    assert_eq!(h.refunds_flagged().await, ["PAY-CLIENT-9"]);
}

#[tokio::test]
async fn test_store_outage_fails_checkout_retryably() {
    let h = TestHarness::new();
    let domain_id = h.list("offline.com", 400).await;
    h.store.set_unavailable(true);

    let err = h
        .coordinator
        .pay_now(
            &Session::user(UserId::new(), None),
            StartCheckout::new(domain_id),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "STORE_ERROR");
    assert!(err.is_retryable());
    assert_eq!(h.widget.capture_count().await, 0);
}

/// Captures through the in-memory widget, then takes the store down.
struct StoreFailsAfterCapture {
    inner: InMemoryPaymentWidget,
    store: InMemoryEventStore,
}

#[async_trait]
impl PaymentWidget for StoreFailsAfterCapture {
    async fn create_order(
        &self,
        amount: Money,
        currency: Currency,
    ) -> Result<PaymentOrder, CheckoutError> {
        self.inner.create_order(amount, currency).await
    }

    async fn capture(&self, order: &PaymentOrder) -> Result<PaymentConfirmation, CheckoutError> {
        let confirmation = self.inner.capture(order).await?;
        self.store.set_unavailable(true);
        Ok(confirmation)
    }
}

#[tokio::test]
async fn test_outage_after_capture_hands_back_the_payment() {
    let h = TestHarness::new();
    let domain_id = h.list("captured.com", 700).await;
    let coordinator = CheckoutCoordinator::new(
        h.store.clone(),
        StoreFailsAfterCapture {
            inner: h.widget.clone(),
            store: h.store.clone(),
        },
    );
    let buyer = Session::user(UserId::new(), None);
    let cmd = StartCheckout::new(domain_id);
    let checkout_id = cmd.checkout_id;

    let err = coordinator
        .pay_now(&buyer, cmd, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_UNSETTLED");
    assert!(err.is_retryable());
    let (unsettled_checkout, payment_id) = err.unsettled_payment().unwrap();
    assert_eq!(unsettled_checkout, checkout_id);
    assert_eq!(payment_id, "PAY-0001");
    assert_eq!(h.widget.capture_count().await, 1);

    // Confirming the reported payment finishes the sale without a second charge.
    h.store.set_unavailable(false);
    let outcome = h
        .coordinator
        .confirm(
            &buyer,
            StartCheckout::new(domain_id),
            PaymentConfirmation::new(payment_id),
        )
        .await
        .unwrap();
    assert!(!outcome.replayed);
    assert_eq!(h.widget.capture_count().await, 1);

    let domain = h.domains.get_domain(domain_id).await.unwrap().unwrap();
    assert_eq!(domain.status(), DomainStatus::Sold);
    assert!(h.refunds_flagged().await.is_empty());
}

#[tokio::test]
async fn test_already_sold_after_capture_is_refunded_not_unsettled() {
    let h = TestHarness::new();
    let domain_id = h.list("raced.com", 300).await;
    let buyer = Session::user(UserId::new(), None);
    h.coordinator
        .confirm(
            &buyer,
            StartCheckout::new(domain_id),
            PaymentConfirmation::new("PAY-EARLY"),
        )
        .await
        .unwrap();

    let err = h
        .coordinator
        .confirm(
            &Session::user(UserId::new(), None),
            StartCheckout::new(domain_id),
            PaymentConfirmation::new("PAY-SECOND"),
        )
        .await
        .unwrap_err();

    assert!(err.is_already_sold());
    assert!(err.unsettled_payment().is_none());
    assert_eq!(h.refunds_flagged().await, vec!["PAY-SECOND".to_string()]);
}

#[tokio::test]
async fn test_independent_checkouts() {
    let h = TestHarness::new();
    let first = h.list("one.com", 100).await;
    let second = h.list("two.com", 200).await;
    let buyer = Session::user(UserId::new(), None);
    let cancel = CancellationToken::new();

    let a = h
        .coordinator
        .pay_now(&buyer, StartCheckout::new(first), &cancel)
        .await
        .unwrap();
    let b = h
        .coordinator
        .pay_now(&buyer, StartCheckout::new(second), &cancel)
        .await
        .unwrap();

    assert_ne!(a.checkout_id, b.checkout_id);
    assert_ne!(a.transaction.id(), b.transaction.id());
    assert_eq!(h.widget.capture_count().await, 2);
}
