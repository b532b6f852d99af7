use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use payment_ledger::adapters::InMemoryLedgerStore;
use payment_ledger::clients::ExchangeRateClient;
use payment_ledger::fx::BaseRateProvider;
use payment_ledger::providers::Normalizer;
use payment_ledger::{create_app, AppState};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_app() -> Router {
    let store = Arc::new(InMemoryLedgerStore::new());
    let state = AppState::new(
        store,
        Arc::new(BaseRateProvider::parity_only("USD")),
        Normalizer::default(),
    );
    create_app(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn post_webhook(app: &Router, header: &str, payload: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/payment")
        .header("content-type", "application/json")
        .header(header, "t=1700000000,v1=unverified")
        .body(Body::from(payload.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

fn stripe_event(event_type: &str, intent: &str, amount: u64, currency: &str) -> Value {
    json!({
        "id": format!("evt_{}_{}", intent, event_type),
        "type": event_type,
        "created": 1_767_225_600,
        "data": {
            "object": {
                "id": format!("ch_{}", intent),
                "amount": amount,
                "currency": currency,
                "payment_intent": intent
            }
        }
    })
}

fn airwallex_event(name: &str, attempt: &str, amount: Value, currency: &str) -> Value {
    json!({
        "id": format!("evt_{}", attempt),
        "name": name,
        "data": {
            "object": {
                "id": attempt,
                "amount": amount,
                "currency": currency,
                "created_at": "2026-01-01T10:00:00Z"
            }
        }
    })
}

fn decimal(value: &Value) -> BigDecimal {
    match value {
        Value::String(s) => BigDecimal::from_str(s).unwrap(),
        other => BigDecimal::from_str(&other.to_string()).unwrap(),
    }
}

#[tokio::test]
async fn test_stripe_payment_then_refund_moves_the_balance() {
    let app = test_app();

    let (status, body) = post_webhook(
        &app,
        "stripe-signature",
        stripe_event("payment_intent.succeeded", "pi_100", 10_000, "usd"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["data"]["outcome"], "created");
    assert_eq!(body["data"]["transactionId"], "pi_100");
    assert!(body["data"]["ledgerEntryId"].is_string());

    let (_, balance) = get(&app, "/ledger/balance").await;
    assert_eq!(decimal(&balance["data"]["balance"]), BigDecimal::from(100));
    assert_eq!(balance["data"]["currency"], "USD");

    let (status, body) = post_webhook(
        &app,
        "stripe-signature",
        stripe_event("charge.refunded", "pi_100", 10_000, "usd"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "updated");

    let (_, balance) = get(&app, "/ledger/balance").await;
    assert_eq!(decimal(&balance["data"]["balance"]), BigDecimal::from(0));

    let (_, entries) = get(&app, "/ledger").await;
    let entries = entries["data"].as_array().unwrap().clone();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["entryType"], "REFUND");
    assert_eq!(entries[0]["description"], "Refund for transaction pi_100");
    assert_eq!(entries[1]["entryType"], "PAYMENT");
    assert_eq!(entries[1]["description"], "Payment from stripe");

    let (_, refunds) = get(&app, "/payments/refunds").await;
    assert_eq!(refunds["data"].as_array().unwrap().len(), 1);
    let (_, successful) = get(&app, "/payments/successful").await;
    assert!(successful["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_redelivered_event_is_rejected_as_duplicate() {
    let app = test_app();
    let event = stripe_event("payment_intent.succeeded", "pi_dup", 2_500, "usd");

    let (status, _) = post_webhook(&app, "stripe-signature", event.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_webhook(&app, "stripe-signature", event).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let (_, entries) = get(&app, "/ledger").await;
    assert_eq!(entries["data"].as_array().unwrap().len(), 1);
    let (_, payments) = get(&app, "/payments").await;
    assert_eq!(payments["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unsupported_event_type_is_acknowledged_and_ignored() {
    let app = test_app();

    let (status, body) = post_webhook(
        &app,
        "stripe-signature",
        stripe_event("payment_intent.created", "pi_new", 1_000, "usd"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "ignored");
    assert!(body["data"].get("transactionId").is_none());

    let (_, entries) = get(&app, "/ledger").await;
    assert!(entries["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_payment_events_are_acknowledged_and_ignored() {
    let app = test_app();

    let stripe_customer = json!({
        "type": "customer.created",
        "data": { "object": { "id": "cus_1", "object": "customer", "email": "a@b.c" } }
    });
    let stripe_invoice = json!({
        "id": "evt_inv",
        "type": "invoice.paid",
        "created": 1_767_225_600,
        "data": { "object": { "id": "in_1", "object": "invoice", "amount_paid": 1200 } }
    });
    let airwallex_customer = json!({
        "id": "evt_aw_cus",
        "name": "customer.created",
        "data": { "object": { "id": "cus_aw_1", "email": "a@b.c" } }
    });

    for (header, payload) in [
        ("stripe-signature", stripe_customer),
        ("stripe-signature", stripe_invoice),
        ("x-signature", airwallex_customer),
    ] {
        let (status, body) = post_webhook(&app, header, payload).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "ignored");
    }

    let (_, entries) = get(&app, "/ledger").await;
    assert!(entries["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_currency_code_longer_than_three_letters_is_ignored() {
    let app = test_app();

    let (status, body) = post_webhook(
        &app,
        "x-signature",
        airwallex_event("payment_attempt.paid", "att_usdc", json!(5), "usdc"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "ignored");

    let (_, payments) = get(&app, "/payments").await;
    assert!(payments["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_airwallex_failed_attempt_posts_zero_effect_entry() {
    let app = test_app();

    post_webhook(
        &app,
        "x-signature",
        airwallex_event("payment_attempt.paid", "att_1", json!(42.5), "usd"),
    )
    .await;
    let (status, _) = post_webhook(
        &app,
        "x-signature",
        airwallex_event("payment_attempt.failed_to_process", "att_2", json!(10), "usd"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, failed) = get(&app, "/ledger/status/failed").await;
    let failed = failed["data"].as_array().unwrap().clone();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["description"], "Failed payment from airwallex");
    assert_eq!(decimal(&failed[0]["creditBase"]), BigDecimal::from(0));
    assert_eq!(decimal(&failed[0]["debitBase"]), BigDecimal::from(0));

    let (_, balance) = get(&app, "/ledger/balance").await;
    assert_eq!(decimal(&balance["data"]["balance"]), BigDecimal::from_str("42.5").unwrap());

    let (_, failed_payments) = get(&app, "/payments/failed").await;
    assert_eq!(failed_payments["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_provider_header_is_bad_request() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/payment")
        .header("content-type", "application/json")
        .body(Body::from(
            stripe_event("payment_intent.succeeded", "pi_1", 100, "usd").to_string(),
        ))
        .unwrap();

    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid webhook type");
}

#[tokio::test]
async fn test_malformed_payload_is_bad_request() {
    let app = test_app();

    let (status, _) = post_webhook(&app, "x-signature", json!({ "name": "payment_attempt.paid" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ledger_filters() {
    let app = test_app();

    post_webhook(
        &app,
        "x-signature",
        airwallex_event("payment_attempt.paid", "att_eur", json!(20), "eur"),
    )
    .await;
    let (_, body) = post_webhook(
        &app,
        "stripe-signature",
        stripe_event("payment_intent.succeeded", "pi_usd", 500, "usd"),
    )
    .await;
    assert_eq!(body["data"]["outcome"], "created");

    let (_, eur) = get(&app, "/ledger/currency/eur").await;
    let eur = eur["data"].as_array().unwrap().clone();
    assert_eq!(eur.len(), 1);
    assert_eq!(eur[0]["currency"], "EUR");

    let payment_id = eur[0]["paymentId"].as_str().unwrap().to_string();
    let (status, by_payment) = get(&app, &format!("/ledger/payment/{}", payment_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_payment["data"].as_array().unwrap().len(), 1);

    let (_, payments) = get(&app, "/ledger/entry-type/payment").await;
    assert_eq!(payments["data"].as_array().unwrap().len(), 2);

    let (status, _) = get(&app, "/ledger/entry-type/chargeback").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/ledger/payment/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_store_connectivity() {
    let app = test_app();

    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["db"], "connected");
    assert_eq!(body["exchange_rates"], "disabled");
}

#[tokio::test]
async fn test_health_reports_open_rate_circuit() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", mockito::Matcher::Regex(r"^/latest\.json.*".into()))
        .with_status(500)
        .create_async()
        .await;

    let client = ExchangeRateClient::with_circuit_breaker(
        server.url(),
        "test-app".to_string(),
        Duration::from_secs(2),
        1,
        60,
    );
    let state = AppState::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(BaseRateProvider::parity_only("USD")),
        Normalizer::default(),
    )
    .with_rate_client(client.clone());
    let app = create_app(state);

    let (_, body) = get(&app, "/health").await;
    assert_eq!(body["exchange_rates"], "closed");

    let _ = client.latest("USD").await;

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exchange_rates"], "open");
}
