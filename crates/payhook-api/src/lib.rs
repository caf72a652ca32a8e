#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! # Payhook HTTP Service
//!
//! Thin HTTP boundary in front of [`WebhookService`].
//!
//! This service provides:
//! - `POST /webhook/{gateway}` for Razorpay and PhonePe callbacks
//! - `GET /health` reporting idempotency store reachability
//! - `GET /metrics` in the Prometheus text format
//! - Admin endpoints to list and replay failed webhooks
//!
//! The webhook body is handed to the core as raw bytes; signatures are
//! computed over exactly what the gateway sent.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

pub use config::{
    IdempotencyConfig, LoggingConfig, ResponseConfig, ServerConfig, ServiceConfig,
    SignatureConfig, StorageConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::PrometheusMetricsSink;
pub use responses::{
    FailedWebhookListResponse, FailedWebhookQuery, HealthCheckResult, HealthResponse,
    RetryResponse, WebhookResponse,
};

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use payhook_core::{
    CorrelationId, Gateway, Timestamp, WebhookEnvelope, WebhookError, WebhookService,
};
use std::{collections::HashMap, future::IntoFuture, sync::Arc, time::Instant};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

/// Razorpay HMAC signature header
pub const RAZORPAY_SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Razorpay per-event id header, used when the payload carries no id
pub const RAZORPAY_EVENT_ID_HEADER: &str = "x-razorpay-event-id";

/// PhonePe checksum header (`<sha256>###<salt index>`)
pub const PHONEPE_SIGNATURE_HEADER: &str = "x-verify";

/// Optional caller-supplied correlation id
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Webhook orchestrator
    pub service: Arc<WebhookService>,

    /// Prometheus registry backing `/metrics`
    pub metrics: Arc<PrometheusMetricsSink>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        service: Arc<WebhookService>,
        metrics: Arc<PrometheusMetricsSink>,
    ) -> Self {
        Self {
            config,
            service,
            metrics,
        }
    }
}

// ============================================================================
// Router and server
// ============================================================================

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route("/webhook/{gateway}", post(handle_webhook));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let admin_routes = Router::new()
        .route("/admin/failed-webhooks", get(list_failed_webhooks))
        .route(
            "/admin/failed-webhooks/{event_id}/retry",
            post(retry_failed_webhook),
        );

    let request_timeout = state.config.server.request_timeout();
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_size))
                .layer(TimeoutLayer::new(request_timeout))
                .into_inner(),
        )
        .with_state(state)
}

/// Start the HTTP server and run until SIGINT/SIGTERM.
///
/// In-flight requests get `server.shutdown_timeout_seconds` to finish once a
/// shutdown signal arrives.
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let address = format!("{}:{}", state.config.server.host, state.config.server.port);
    let shutdown_timeout = state.config.server.shutdown_timeout();

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(address = %address, "Starting HTTP server");

    let app = create_router(state);
    let (signalled_tx, mut signalled_rx) = tokio::sync::watch::channel(false);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(true);
        })
        .into_future();
    tokio::pin!(server);

    let drain_deadline = async {
        if signalled_rx.wait_for(|signalled| *signalled).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = &mut server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; dropping in-flight requests"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle a gateway callback.
///
/// Permanent failures that a redelivery cannot fix are answered `200` with
/// `status: "failed"` when `responses.acknowledge_permanent_failures` is set,
/// so the gateway stops retrying them.
#[instrument(skip(state, headers, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    let gateway: Gateway = gateway
        .parse()
        .map_err(|_| WebhookError::UnknownGateway { gateway })?;

    let correlation_id = header_value(&headers, CORRELATION_ID_HEADER)
        .and_then(|value| value.parse::<CorrelationId>().ok())
        .unwrap_or_default();

    let envelope = WebhookEnvelope::new(gateway, body, signature_header(gateway, &headers))
        .with_event_id_hint(event_id_hint(gateway, &headers))
        .with_correlation_id(correlation_id.clone());

    match state.service.handle_webhook(envelope).await {
        Ok(outcome) => Ok(Json(WebhookResponse::from_outcome(
            &outcome,
            &correlation_id,
        ))),
        Err(e) if e.is_acknowledgeable() && state.config.responses.acknowledge_permanent_failures => {
            warn!(error = %e, "Acknowledging webhook that cannot be applied");
            Ok(Json(WebhookResponse::acknowledged_failure(
                &e,
                &correlation_id,
            )))
        }
        Err(e) => Err(e.into()),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn signature_header(gateway: Gateway, headers: &HeaderMap) -> Option<String> {
    match gateway {
        Gateway::Razorpay => header_value(headers, RAZORPAY_SIGNATURE_HEADER),
        Gateway::PhonePe => header_value(headers, PHONEPE_SIGNATURE_HEADER),
    }
}

fn event_id_hint(gateway: Gateway, headers: &HeaderMap) -> Option<String> {
    match gateway {
        Gateway::Razorpay => header_value(headers, RAZORPAY_EVENT_ID_HEADER),
        Gateway::PhonePe => None,
    }
}

// ============================================================================
// Health and metrics
// ============================================================================

/// Health check; `503` when the idempotency store is unreachable
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let started = Instant::now();
    let store = state.service.health_check().await;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let is_healthy = store.is_ok();
    let message = match store {
        Ok(()) => "reachable".to_string(),
        Err(e) => {
            warn!(error = %e, "Idempotency store health check failed");
            e.to_string()
        }
    };

    let mut checks = HashMap::new();
    checks.insert(
        "idempotency_store".to_string(),
        HealthCheckResult {
            healthy: is_healthy,
            message,
            duration_ms,
        },
    );

    let response = HealthResponse {
        status: if is_healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: Timestamp::now(),
        checks,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let status = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, WebhookHandlerError> {
    state
        .metrics
        .encode()
        .map_err(|e| WebhookHandlerError::InternalError {
            message: format!("metrics encoding failed: {e}"),
        })
}

// ============================================================================
// Admin Handlers
// ============================================================================

/// List failed-webhook ledger entries, oldest first
#[instrument(skip(state))]
async fn list_failed_webhooks(
    State(state): State<AppState>,
    Query(query): Query<FailedWebhookQuery>,
) -> Result<Json<FailedWebhookListResponse>, WebhookHandlerError> {
    let entries = state.service.list_failed(query.include_resolved).await?;
    Ok(Json(FailedWebhookListResponse::new(entries)))
}

/// Replay a failed webhook through its gateway handler
#[instrument(skip(state))]
async fn retry_failed_webhook(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<RetryResponse>, WebhookHandlerError> {
    let result = state.service.retry_failed(&event_id).await?;
    info!(event_id = %event_id, status = %result.status, "Failed webhook retried");
    Ok(Json(RetryResponse { event_id, result }))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
