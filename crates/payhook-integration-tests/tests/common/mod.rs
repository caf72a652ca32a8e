//! Common test utilities for payhook-api integration tests
//!
//! This module provides:
//! - A fully wired in-process application backed by in-memory stores
//! - Signed request builders for both gateways
//! - Shared payload builders

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use payhook_api::{
    create_router, AppState, PrometheusMetricsSink, ServiceConfig, RAZORPAY_SIGNATURE_HEADER,
    PHONEPE_SIGNATURE_HEADER,
};
use payhook_core::{
    signature::{sign_phonepe, sign_razorpay},
    BestEffortMetrics, HandlerRegistry, IdempotencyStore, InMemoryFailedWebhookStore,
    MemoryDocumentStore, Order, OrderStatus, OrderStore, ProcessingMode, SecretValue,
    WebhookService,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const RAZORPAY_SECRET: &str = "rzp_integration_secret";
pub const PHONEPE_SALT: &str = "phonepe_integration_salt";

// ============================================================================
// Application fixture
// ============================================================================

/// Router plus handles on the stores behind it
#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub orders: MemoryDocumentStore,
    pub failures: InMemoryFailedWebhookStore,
    pub metrics: Arc<PrometheusMetricsSink>,
    pub service: Arc<WebhookService>,
}

pub fn signed_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.signatures.razorpay_secret = Some(SecretValue::new(RAZORPAY_SECRET));
    config.signatures.phonepe_secret = Some(SecretValue::new(PHONEPE_SALT));
    config
}

/// App whose orders and processed markers share one in-memory store
pub fn test_app(config: ServiceConfig) -> TestApp {
    let orders = MemoryDocumentStore::new();
    test_app_with_idempotency(config, orders.clone(), Arc::new(orders))
}

/// App with a separate idempotency store
pub fn test_app_with_idempotency(
    config: ServiceConfig,
    orders: MemoryDocumentStore,
    idempotency: Arc<dyn IdempotencyStore>,
) -> TestApp {
    let failures = InMemoryFailedWebhookStore::new();
    let metrics = Arc::new(PrometheusMetricsSink::new().unwrap());

    let service = Arc::new(
        WebhookService::new(
            Arc::new(config.build_verifier()),
            HandlerRegistry::with_defaults(),
            idempotency,
            Arc::new(orders.clone()),
            Arc::new(failures.clone()),
            BestEffortMetrics::new(metrics.clone()),
        )
        .with_processing_mode(config.idempotency.processing_mode),
    );

    let router = create_router(AppState::new(config, service.clone(), metrics.clone()));

    TestApp {
        router,
        orders,
        failures,
        metrics,
        service,
    }
}

impl TestApp {
    pub async fn seed_order(&self, order_id: &str) {
        self.orders
            .insert_order(Order::new(order_id, OrderStatus::AwaitingPayment))
            .await
            .unwrap();
    }

    pub async fn order(&self, order_id: &str) -> Order {
        self.orders.get_order(order_id).await.unwrap().unwrap()
    }

    /// Send a request and decode the JSON body (`Value::Null` when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        self.service.processing_mode()
    }
}

// ============================================================================
// Request builders
// ============================================================================

pub fn razorpay_request(body: Vec<u8>) -> Request<Body> {
    let signature = sign_razorpay(RAZORPAY_SECRET, &body);
    Request::builder()
        .method("POST")
        .uri("/webhook/razorpay")
        .header("content-type", "application/json")
        .header(RAZORPAY_SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

pub fn phonepe_request(body: Vec<u8>) -> Request<Body> {
    let checksum = format!("{}###1", sign_phonepe(PHONEPE_SALT, &body));
    Request::builder()
        .method("POST")
        .uri("/webhook/phonepe")
        .header("content-type", "application/json")
        .header(PHONEPE_SIGNATURE_HEADER, checksum)
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// ============================================================================
// Payload builders
// ============================================================================

pub fn razorpay_captured(event_id: &str, order_id: &str, amount_paise: i64) -> Vec<u8> {
    json!({
        "entity": "event",
        "id": event_id,
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": format!("pay_{event_id}"),
            "amount": amount_paise,
            "currency": "INR",
            "notes": { "order_reference": order_id }
        } } }
    })
    .to_string()
    .into_bytes()
}

pub fn razorpay_failed(event_id: &str, order_id: &str, reason: &str) -> Vec<u8> {
    json!({
        "entity": "event",
        "id": event_id,
        "event": "payment.failed",
        "payload": { "payment": { "entity": {
            "id": format!("pay_{event_id}"),
            "amount": 50000,
            "error_description": reason,
            "notes": { "order_reference": order_id }
        } } }
    })
    .to_string()
    .into_bytes()
}

pub fn phonepe_callback(transaction_id: &str, order_id: &str, code: &str) -> Value {
    json!({
        "success": code == "PAYMENT_SUCCESS",
        "code": code,
        "message": "Your payment is successful.",
        "data": {
            "merchantId": "MERCHANTUAT",
            "merchantTransactionId": order_id,
            "transactionId": transaction_id,
            "amount": 25000,
            "state": "COMPLETED"
        }
    })
}
