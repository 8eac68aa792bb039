//! Integration tests for payment reads and the status webhook.

mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_completed_payment_marks_order_paid() {
    let store = common::memory_store();
    let app = common::build_test_app(store.clone());
    common::post_json(app, "/api/v1/checkout", &common::checkout_body()).await;

    // POST /api/v1/payments/status
    let app = common::build_test_app(store.clone());
    let (status, payment) = common::post_json(
        app,
        "/api/v1/payments/status",
        &json!({"orderId": "id-1", "payment": {"stripeId": "pi_1"}, "status": "completed"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["id"], "id-2");
    assert_eq!(payment["status"], "completed");

    let app = common::build_test_app(store.clone());
    let (_, order) = common::get_json(app, "/api/v1/orders/id-1").await;
    assert_eq!(order["status"], "paid");

    let app = common::build_test_app(store);
    let (status, payment) = common::get_json(app, "/api/v1/payments/id-2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "completed");
}

#[tokio::test]
async fn test_status_for_unknown_payment_returns_precondition_failed() {
    let store = common::memory_store();
    let app = common::build_test_app(store.clone());
    common::post_json(app, "/api/v1/checkout", &common::checkout_body()).await;

    let app = common::build_test_app(store);
    let (status, json) = common::post_json(
        app,
        "/api/v1/payments/status",
        &json!({"orderId": "id-1", "payment": {"id": "pay-404"}, "status": "failed"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "precondition_failed");
    assert!(json["message"].as_str().unwrap().contains("pay-404"));
}

#[tokio::test]
async fn test_pending_payments_before_cutoff() {
    let store = common::memory_store();
    let mut body = common::checkout_body();
    body["plan"] = json!({"type": "installments", "frequency": "weekly", "term": 3});
    let app = common::build_test_app(store.clone());
    common::post_json(app, "/api/v1/checkout", &body).await;

    let app = common::build_test_app(store);
    let (status, json) = common::get_json(
        app,
        "/api/v1/payments/pending?before=2026-01-25T00:00:00Z",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["id-2", "id-3"]);
}

#[tokio::test]
async fn test_unknown_payment_returns_404() {
    let app = common::build_test_app(common::memory_store());

    let (status, json) = common::get_json(app, "/api/v1/payments/pay-404").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}
