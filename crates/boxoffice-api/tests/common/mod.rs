//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use boxoffice_core::config::LedgerConfig;
use boxoffice_core::store::KeyValueStore;
use boxoffice_orders::application::repository::OrderRepository;
use boxoffice_test_support::{FixedClock, InMemoryKeyValueStore, SequenceIdGenerator};
use http_body_util::BodyExt;
use tower::ServiceExt;

use boxoffice_api::app;
use boxoffice_api::state::AppState;

/// Build the full app router over `store` with a fixed clock (2026-01-15
/// 10:00 UTC) and sequential ids (`id-1`, `id-2`, ...). Uses the same
/// router as `main.rs`.
pub fn build_test_app(store: Arc<dyn KeyValueStore>) -> Router {
    let clock = Arc::new(FixedClock::fixture());
    let ids = Arc::new(SequenceIdGenerator::default());
    let repository = OrderRepository::new(
        store,
        clock.clone(),
        ids.clone(),
        &LedgerConfig::default(),
    );
    app(AppState::new(repository, clock, ids))
}

/// A fresh in-memory store.
pub fn memory_store() -> Arc<InMemoryKeyValueStore> {
    Arc::new(InMemoryKeyValueStore::new())
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// A checkout request body for a 300.00 USD full pass.
pub fn checkout_body() -> serde_json::Value {
    serde_json::json!({
        "items": [{
            "id": "full-pass",
            "title": "Full Pass",
            "includes": ["workshops", "parties"],
            "amount": 1,
            "total": {"amount": 30000, "currency": "USD"}
        }],
        "total": {"amount": 30000, "currency": "USD"},
        "customer": {
            "email": "romain.asnar@gmail.com",
            "fullname": "Romain Asnar",
            "type": "leader"
        },
        "paymentIntent": {"id": "pi_1", "secret": "pi_1_secret", "customerId": "cus_1"}
    })
}
