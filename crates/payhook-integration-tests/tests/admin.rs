//! Integration tests for the failed-webhook ledger, health and metrics endpoints

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::StatusCode;
use common::*;
use payhook_core::{Counter, OrderStatus};

#[tokio::test]
async fn test_unknown_order_is_acknowledged_and_recorded_for_reconciliation() {
    let app = test_app(signed_config());

    let (status, body) = app
        .send(razorpay_request(razorpay_captured("evt_a1", "ord_late", 70000)))
        .await;

    // Acknowledged so the gateway stops redelivering
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(app.metrics.get(Counter::WebhookOrderNotFound), 1);

    // Marked processed: a redelivery is a duplicate, not a second failure
    let (_, redelivered) = app
        .send(razorpay_request(razorpay_captured("evt_a1", "ord_late", 70000)))
        .await;
    assert_eq!(redelivered["status"], "duplicate");

    let (status, listing) = app.send(get("/admin/failed-webhooks")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 1);

    let entry = &listing["failed_webhooks"][0];
    assert_eq!(entry["eventId"], "evt_a1");
    assert_eq!(entry["gateway"], "razorpay");
    assert_eq!(entry["orderId"], "ord_late");
    assert_eq!(entry["attempts"], 1);
    assert!(entry.get("resolvedAt").is_none());
}

#[tokio::test]
async fn test_retry_applies_event_once_order_exists() {
    let app = test_app(signed_config());

    app.send(razorpay_request(razorpay_captured("evt_a2", "ord_a2", 42000)))
        .await;

    // Still missing: retry fails and bumps the attempt count
    let (status, _) = app
        .send(post("/admin/failed-webhooks/evt_a2/retry"))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, listing) = app.send(get("/admin/failed-webhooks")).await;
    assert_eq!(listing["failed_webhooks"][0]["attempts"], 2);

    // Order shows up; replay succeeds
    app.seed_order("ord_a2").await;
    let (status, retried) = app
        .send(post("/admin/failed-webhooks/evt_a2/retry"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retried["event_id"], "evt_a2");
    assert_eq!(retried["result"]["status"], "success");

    let order = app.order("ord_a2").await;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_details.len(), 1);
    assert_eq!(order.payment_details[0].amount, 420.00);

    // Resolved entries drop out of the default listing
    let (_, open) = app.send(get("/admin/failed-webhooks")).await;
    assert_eq!(open["total"], 0);

    let (_, all) = app
        .send(get("/admin/failed-webhooks?include_resolved=true"))
        .await;
    assert_eq!(all["total"], 1);
    assert!(all["failed_webhooks"][0]["resolvedAt"].is_string());

    // A second retry is a no-op
    let (status, again) = app
        .send(post("/admin/failed-webhooks/evt_a2/retry"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["result"]["status"], "ignored");
    assert_eq!(app.order("ord_a2").await.payment_details.len(), 1);
}

#[tokio::test]
async fn test_retry_of_unknown_event_is_not_found() {
    let app = test_app(signed_config());

    let (status, body) = app
        .send(post("/admin/failed-webhooks/evt_missing/retry"))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("evt_missing"));
}

#[tokio::test]
async fn test_health_endpoint_reports_healthy_store() {
    let app = test_app(signed_config());

    let (status, body) = app.send(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["idempotency_store"]["healthy"], true);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint_tracks_outcomes() {
    let app = test_app(signed_config());
    app.seed_order("ord_m1").await;

    let body = razorpay_captured("evt_m1", "ord_m1", 100);
    app.send(razorpay_request(body.clone())).await;
    app.send(razorpay_request(body)).await;

    let response = tower::ServiceExt::oneshot(app.router.clone(), get("/metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("payments_success 1"));
    assert!(text.contains("webhook_processed 1"));
    assert!(text.contains("webhook_duplicates 1"));
}
