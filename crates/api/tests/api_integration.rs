//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::session::{USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use api::{AppState, Services};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::InMemoryMailer;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

/// Who is making a request.
#[derive(Clone, Copy)]
enum As {
    Anonymous,
    User(UserId),
    Admin(UserId),
}

struct TestApp {
    app: axum::Router,
    state: Arc<AppState<InMemoryEventStore>>,
    mailer: Arc<InMemoryMailer>,
    admin: UserId,
}

impl TestApp {
    fn new() -> Self {
        Self::with_recipients(Vec::new())
    }

    fn with_recipients(recipients: Vec<String>) -> Self {
        let mailer = Arc::new(InMemoryMailer::new());
        let mut services = Services::in_memory();
        services.mailer = mailer.clone();
        services.feedback_recipients = recipients;

        let (state, _dispatcher) = AppState::build(InMemoryEventStore::new(), services);
        let app = api::create_app(state.clone(), get_metrics_handle());
        Self {
            app,
            state,
            mailer,
            admin: UserId::new(),
        }
    }

    async fn send(&self, method: &str, uri: &str, who: As, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        match who {
            As::Anonymous => {}
            As::User(id) => {
                builder = builder
                    .header(USER_ID_HEADER, id.to_string())
                    .header(USER_EMAIL_HEADER, format!("{id}@example.com"));
            }
            As::Admin(id) => {
                builder = builder
                    .header(USER_ID_HEADER, id.to_string())
                    .header(USER_ROLE_HEADER, "admin");
            }
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Lists a domain as the operator, optionally on behalf of `owner`.
    async fn list(&self, name: &str, dollars: i64, owner: Option<UserId>) -> String {
        let mut body = json!({ "name": name, "price": dollars * 100, "category": "premium" });
        if let Some(owner) = owner {
            body["owner_id"] = json!(owner);
            body["owner_email"] = json!("owner@example.com");
        }
        let (status, json) = self
            .send("POST", "/domains", As::Admin(self.admin), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let t = TestApp::new();
    let (status, json) = t.send("GET", "/health", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["read_models"]["DomainCatalogView"], 0);
}

#[tokio::test]
async fn test_list_and_browse_domains() {
    let t = TestApp::new();
    let id = t.list("shop.com", 1000, None).await;
    t.list("cheap.io", 50, None).await;

    let (status, json) = t.send("GET", "/domains?sort=price_asc", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["cheap.io", "shop.com"]);

    let (status, json) = t.send("GET", &format!("/domains/{id}"), As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["price"], 100_000);
    assert_eq!(json["minimum_offer"], 80_000);
}

#[tokio::test]
async fn test_listing_twice_is_a_conflict() {
    let t = TestApp::new();
    t.list("shop.com", 1000, None).await;

    let (status, json) = t
        .send(
            "POST",
            "/domains",
            As::Admin(t.admin),
            Some(json!({ "name": "SHOP.com", "price": 100 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "ALREADY_LISTED");
}

#[tokio::test]
async fn test_price_above_the_cap_is_rejected() {
    let t = TestApp::new();

    let (status, json) = t
        .send(
            "POST",
            "/domains",
            As::Admin(t.admin),
            Some(json!({ "name": "big.com", "price": i64::MAX / 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = t.send("GET", "/domains", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_cannot_list() {
    let t = TestApp::new();
    let (status, json) = t
        .send(
            "POST",
            "/domains",
            As::Anonymous,
            Some(json!({ "name": "shop.com", "price": 100 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_bad_sort_and_bad_id() {
    let t = TestApp::new();
    let (status, _) = t.send("GET", "/domains?sort=sideways", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = t.send("GET", "/domains/not-a-uuid", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_reserved_domain_leaves_the_catalog() {
    let t = TestApp::new();
    let owner = UserId::new();
    let id = t.list("shop.com", 1000, Some(owner)).await;

    let (status, json) = t
        .send("POST", &format!("/domains/{id}/reserve"), As::User(UserId::new()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{json}");

    let (status, json) = t
        .send("POST", &format!("/domains/{id}/reserve"), As::User(owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "reserved");
    assert_eq!(json["notice"]["kind"], "success");

    let (_, json) = t.send("GET", "/domains", As::Anonymous, None).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_offer_workflow() {
    let t = TestApp::new();
    let owner = UserId::new();
    let buyer = UserId::new();
    let id = t.list("shop.com", 1000, Some(owner)).await;

    // Detailed offers must clear the 80% floor
    let (status, json) = t
        .send(
            "POST",
            &format!("/domains/{id}/offers"),
            As::User(buyer),
            Some(json!({ "amount": 50_000, "form": "detailed" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "BELOW_MINIMUM");

    let (status, json) = t
        .send(
            "POST",
            &format!("/domains/{id}/offers"),
            As::User(buyer),
            Some(json!({ "amount": 90_000, "message": "Interested" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["status"], "pending");
    assert_eq!(json["notice"]["title"], "Offer sent");
    let offer_id = json["offer_id"].as_str().unwrap().to_string();

    // Only the seller resolves
    let (status, json) = t
        .send(
            "POST",
            &format!("/offers/{offer_id}/resolve"),
            As::User(buyer),
            Some(json!({ "decision": "accept" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "NOT_SELLER");

    let (status, json) = t
        .send(
            "POST",
            &format!("/offers/{offer_id}/resolve"),
            As::User(owner),
            Some(json!({ "decision": "accept" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "accepted");

    let (status, json) = t.send("GET", "/dashboard", As::User(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received_offers"].as_array().unwrap().len(), 1);
    assert_eq!(json["received_offers"][0]["status"], "accepted");

    let (_, json) = t.send("GET", "/dashboard", As::User(buyer), None).await;
    assert_eq!(json["submitted_offers"][0]["contact_email"], format!("{buyer}@example.com"));
}

#[tokio::test]
async fn test_offer_on_unowned_domain() {
    let t = TestApp::new();
    let id = t.list("shop.com", 1000, None).await;

    let (status, json) = t
        .send(
            "POST",
            &format!("/domains/{id}/offers"),
            As::User(UserId::new()),
            Some(json!({ "amount": 90_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "NO_OWNER");
    assert_eq!(json["error"]["retryable"], false);
}

#[tokio::test]
async fn test_owner_is_mailed_about_an_offer() {
    let t = TestApp::new();
    let owner = UserId::new();
    let id = t.list("shop.com", 1000, Some(owner)).await;

    t.send(
        "POST",
        &format!("/domains/{id}/offers"),
        As::User(UserId::new()),
        Some(json!({ "amount": 90_000 })),
    )
    .await;

    for _ in 0..50 {
        if !t.mailer.delivered().await.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let delivered = t.mailer.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].recipient(), "owner@example.com");
}

#[tokio::test]
async fn test_offer_notice_does_not_promise_mail_without_owner_email() {
    let t = TestApp::new();
    let (status, json) = t
        .send(
            "POST",
            "/domains",
            As::Admin(t.admin),
            Some(json!({ "name": "quiet.com", "price": 100_000, "owner_id": UserId::new() })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let id = json["id"].as_str().unwrap().to_string();

    let (status, json) = t
        .send(
            "POST",
            &format!("/domains/{id}/offers"),
            As::User(UserId::new()),
            Some(json!({ "amount": 90_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let message = json["notice"]["message"].as_str().unwrap();
    assert!(!message.contains("notified"), "{message}");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(t.mailer.delivered().await.is_empty());
}

#[tokio::test]
async fn test_buy_now_sells_once() {
    let t = TestApp::new();
    let owner = UserId::new();
    let first = UserId::new();
    let id = t.list("shop.com", 1000, Some(owner)).await;

    let (status, json) = t
        .send("POST", &format!("/domains/{id}/checkout"), As::User(first), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["amount"], 100_000);
    assert_eq!(json["replayed"], false);
    let checkout_id = json["checkout_id"].as_str().unwrap().to_string();

    let (status, json) = t
        .send("POST", &format!("/domains/{id}/checkout"), As::User(UserId::new()), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "ALREADY_SOLD");

    // Sold domains leave the catalog and show up as the buyer's purchase
    let (_, json) = t.send("GET", "/domains", As::Anonymous, None).await;
    assert!(json.as_array().unwrap().is_empty());
    let (_, json) = t.send("GET", "/dashboard", As::User(first), None).await;
    assert_eq!(json["purchases"].as_array().unwrap().len(), 1);
    assert_eq!(json["owned_domains"][0]["name"], "shop.com");

    let (status, json) = t
        .send("GET", &format!("/checkouts/{checkout_id}"), As::User(first), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "Completed");

    let (status, _) = t
        .send("GET", &format!("/checkouts/{checkout_id}"), As::User(UserId::new()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_late_confirmation_lands_in_refund_queue() {
    let t = TestApp::new();
    let id = t.list("shop.com", 1000, Some(UserId::new())).await;
    let buyer = UserId::new();

    let (status, _) = t
        .send(
            "POST",
            &format!("/domains/{id}/checkout/confirm"),
            As::User(buyer),
            Some(json!({ "payment_id": "PAY-FIRST" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The same payment again is recorded once
    let (status, json) = t
        .send(
            "POST",
            &format!("/domains/{id}/checkout/confirm"),
            As::User(buyer),
            Some(json!({ "payment_id": "PAY-FIRST" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["replayed"], true);

    let (status, json) = t
        .send(
            "POST",
            &format!("/domains/{id}/checkout/confirm"),
            As::User(UserId::new()),
            Some(json!({ "payment_id": "PAY-LATE" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "ALREADY_SOLD");

    let (status, _) = t
        .send("GET", "/admin/refunds", As::User(UserId::new()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = t.send("GET", "/admin/refunds", As::Admin(t.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let queue = json.as_array().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["payment_id"], "PAY-LATE");
    assert_eq!(queue[0]["reason"], "already_sold");
}

#[tokio::test]
async fn test_domain_history() {
    let t = TestApp::new();
    let owner = UserId::new();
    let id = t.list("shop.com", 1000, Some(owner)).await;
    t.send(
        "PATCH",
        &format!("/domains/{id}"),
        As::User(owner),
        Some(json!({ "price": 120_000 })),
    )
    .await;

    let (status, json) = t
        .send("GET", &format!("/domains/{id}/events"), As::Anonymous, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let events = json.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event_type"], "DomainListed");
    assert_eq!(events[1]["version"], 2);
    assert_eq!(events[1]["actor"], json!(owner));
}

#[tokio::test]
async fn test_feedback() {
    let t = TestApp::new();
    let body = json!({ "name": "Ada", "email": "ada@example.com", "message": "Hello" });
    let (status, json) = t.send("POST", "/feedback", As::Anonymous, Some(body.clone())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "NOTIFICATION_ERROR");
    assert_eq!(json["error"]["retryable"], false);

    let t = TestApp::with_recipients(vec!["team@example.com".to_string()]);
    let (status, json) = t.send("POST", "/feedback", As::Anonymous, Some(body)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["notice"]["kind"], "success");
    let sent = t.mailer.feedback().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["team@example.com".to_string()]);

    let (status, json) = t
        .send(
            "POST",
            "/feedback",
            As::Anonymous,
            Some(json!({ "name": "Ada", "email": "nope", "message": "Hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_store_outage_is_retryable() {
    let t = TestApp::new();
    t.list("shop.com", 1000, None).await;
    t.state.store.set_unavailable(true);

    let (status, json) = t.send("GET", "/domains", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["retryable"], true);
    let (status, json) = t.send("GET", "/health", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "degraded");

    t.state.store.set_unavailable(false);
    let (status, json) = t.send("GET", "/domains", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = TestApp::new();
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
