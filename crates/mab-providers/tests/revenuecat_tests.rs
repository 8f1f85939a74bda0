//! RevenueCat gate against a local HTTP double

use mab_core::{EntitlementConfig, EntitlementGate};
use mab_providers::RevenueCatGate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::Filter;

macro_rules! serve {
    ($filter:expr) => {{
        let (addr, server) = warp::serve($filter).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{addr}")
    }};
}

fn subscriber(entitlements: Value) -> Value {
    json!({
        "request_date": "2026-01-01T00:00:00Z",
        "subscriber": {
            "original_app_user_id": "user-1",
            "entitlements": entitlements
        }
    })
}

fn active() -> Value {
    subscriber(json!({"pro": {"expires_date": "2099-01-01T00:00:00Z", "product_identifier": "pro_monthly"}}))
}

fn expired() -> Value {
    subscriber(json!({"pro": {"expires_date": "2001-01-01T00:00:00Z"}}))
}

fn gate(base: &str) -> RevenueCatGate {
    RevenueCatGate::new(&EntitlementConfig {
        endpoint: format!("{base}/v1"),
        api_key_env: "MAB_TEST_RC_KEY_THAT_IS_NEVER_SET".to_string(),
        ..EntitlementConfig::default()
    })
    .unwrap()
    .with_api_key("rc-key")
    .with_app_user_id("user-1")
    .with_fetch_token("tok_checkout_1")
}

fn offerings_body() -> Value {
    json!({
        "current_offering_id": "default",
        "offerings": [{
            "identifier": "default",
            "description": "MAB Pro",
            "packages": [
                {"identifier": "$rc_monthly", "platform_product_identifier": "pro_monthly"},
                {"identifier": "$rc_annual", "platform_product_identifier": "pro_annual"}
            ]
        }]
    })
}

/// Double serving the offerings and recording every posted receipt
fn purchase_double(
    status: StatusCode,
) -> (
    impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone,
    Arc<Mutex<Vec<(String, Value)>>>,
) {
    let receipts = Arc::new(Mutex::new(Vec::new()));
    let log = receipts.clone();
    let offerings = warp::get()
        .and(warp::path!("v1" / "subscribers" / String / "offerings"))
        .map(|_user: String| warp::reply::json(&offerings_body()));
    let post = warp::post()
        .and(warp::path!("v1" / "receipts"))
        .and(warp::header::<String>("x-platform"))
        .and(warp::body::json())
        .map(move |platform: String, body: Value| {
            log.lock().unwrap().push((platform, body));
            warp::reply::with_status(warp::reply::json(&active()), status)
        });
    (offerings.or(post), receipts)
}

/// Double serving `GET /v1/subscribers/{id}` with `status` and `reply`,
/// recording the authorization header
fn subscriber_double(
    status: StatusCode,
    reply: Value,
) -> (
    impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone,
    Arc<Mutex<Vec<(String, String)>>>,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let filter = warp::get()
        .and(warp::path!("v1" / "subscribers" / String))
        .and(warp::header::<String>("authorization"))
        .map(move |user: String, auth: String| {
            log.lock().unwrap().push((user, auth));
            warp::reply::with_status(warp::reply::json(&reply), status)
        });
    (filter, seen)
}

#[tokio::test]
async fn test_active_entitlement() {
    let (filter, seen) = subscriber_double(StatusCode::OK, active());
    let base = serve!(filter);

    assert!(gate(&base).is_entitled().await);
    assert_eq!(
        seen.lock().unwrap().clone(),
        vec![("user-1".to_string(), "Bearer rc-key".to_string())]
    );
}

#[tokio::test]
async fn test_expired_entitlement() {
    let (filter, _seen) = subscriber_double(StatusCode::OK, expired());
    let base = serve!(filter);

    assert!(!gate(&base).is_entitled().await);
}

#[tokio::test]
async fn test_no_entitlements() {
    let (filter, _seen) = subscriber_double(StatusCode::OK, subscriber(json!({})));
    let base = serve!(filter);

    let gate = gate(&base);
    assert!(!gate.is_entitled().await);
    assert!(gate.subscriber().await.unwrap().entitlements.is_empty());
}

#[tokio::test]
async fn test_backend_error_is_not_entitled() {
    let (filter, _seen) =
        subscriber_double(StatusCode::INTERNAL_SERVER_ERROR, json!({"message": "down"}));
    let base = serve!(filter);

    assert!(!gate(&base).is_entitled().await);
    assert!(!gate(&base).restore().await);
}

#[tokio::test]
async fn test_unreachable_backend_is_not_entitled() {
    let gate = gate("http://127.0.0.1:9");
    assert!(!gate.is_entitled().await);
}

#[tokio::test]
async fn test_missing_user_is_not_entitled() {
    let gate = RevenueCatGate::new(&EntitlementConfig::default())
        .unwrap()
        .with_api_key("rc-key");
    assert!(gate.app_user_id().is_none());
    assert!(!gate.is_entitled().await);
}

#[tokio::test]
async fn test_restore_reads_subscriber() {
    let (filter, seen) = subscriber_double(StatusCode::OK, active());
    let base = serve!(filter);

    assert!(gate(&base).restore().await);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_purchase_posts_receipt_for_resolved_package() {
    let (filter, receipts) = purchase_double(StatusCode::OK);
    let base = serve!(filter);

    assert!(gate(&base).purchase("$rc_annual").await);

    let receipts = receipts.lock().unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].0, "stripe");
    assert_eq!(
        receipts[0].1,
        json!({"app_user_id": "user-1", "fetch_token": "tok_checkout_1", "product_id": "pro_annual"})
    );
}

#[tokio::test]
async fn test_purchase_by_product_id() {
    let (filter, receipts) = purchase_double(StatusCode::OK);
    let base = serve!(filter);

    assert!(gate(&base).purchase("pro_monthly").await);
    assert_eq!(receipts.lock().unwrap()[0].1["product_id"], "pro_monthly");
}

#[tokio::test]
async fn test_unknown_offer_posts_nothing() {
    let (filter, receipts) = purchase_double(StatusCode::OK);
    let base = serve!(filter);

    assert!(!gate(&base).purchase("lifetime").await);
    assert!(receipts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_purchase_without_token_posts_nothing() {
    let (filter, receipts) = purchase_double(StatusCode::OK);
    let base = serve!(filter);

    let gate = RevenueCatGate::new(&EntitlementConfig {
        endpoint: format!("{base}/v1"),
        api_key_env: "MAB_TEST_RC_KEY_THAT_IS_NEVER_SET".to_string(),
        fetch_token_env: "MAB_TEST_RC_TOKEN_THAT_IS_NEVER_SET".to_string(),
        ..EntitlementConfig::default()
    })
    .unwrap()
    .with_api_key("rc-key")
    .with_app_user_id("user-1");

    assert!(!gate.purchase("$rc_monthly").await);
    assert!(receipts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_purchase() {
    let (filter, receipts) = purchase_double(StatusCode::PAYMENT_REQUIRED);
    let base = serve!(filter);

    assert!(!gate(&base).purchase("$rc_monthly").await);
    assert_eq!(receipts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_offerings() {
    let filter = warp::get()
        .and(warp::path!("v1" / "subscribers" / String / "offerings"))
        .map(|_user: String| warp::reply::json(&offerings_body()));
    let base = serve!(filter);

    let offerings = gate(&base).offerings().await.unwrap();
    let current = offerings.current().unwrap();
    assert_eq!(current.description, "MAB Pro");
    assert_eq!(
        current.packages[0].platform_product_identifier.as_deref(),
        Some("pro_monthly")
    );
}
