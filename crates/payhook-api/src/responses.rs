//! Response types and query parameters for the API.

use payhook_core::{
    CorrelationId, FailedWebhook, HandlerResult, Timestamp, WebhookError, WebhookOutcome,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Webhook
// ============================================================================

/// Body returned to the gateway for an accepted delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    /// `success`, `recorded`, `ignored`, `duplicate` or `failed`
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_payment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub correlation_id: String,
}

impl WebhookResponse {
    pub fn from_outcome(outcome: &WebhookOutcome, correlation_id: &CorrelationId) -> Self {
        let (order_id, gateway_payment_id, reason) = match outcome {
            WebhookOutcome::Processed { result, .. } => (
                result.order_id.clone(),
                result.gateway_payment_id.clone(),
                result.reason.clone(),
            ),
            WebhookOutcome::Duplicate { .. } => (None, None, None),
        };

        Self {
            status: outcome.status_str().to_string(),
            event_id: Some(outcome.event_id().to_string()),
            order_id,
            gateway_payment_id,
            reason,
            correlation_id: correlation_id.to_string(),
        }
    }

    /// A permanent failure acknowledged with `200` so the gateway stops
    /// redelivering it
    pub fn acknowledged_failure(error: &WebhookError, correlation_id: &CorrelationId) -> Self {
        let (event_id, order_id) = match error {
            WebhookError::OrderNotFound { order_id, event_id } => {
                (Some(event_id.clone()), Some(order_id.clone()))
            }
            _ => (None, None),
        };

        Self {
            status: "failed".to_string(),
            event_id,
            order_id,
            gateway_payment_id: None,
            reason: Some(error.to_string()),
            correlation_id: correlation_id.to_string(),
        }
    }
}

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub checks: HashMap<String, HealthCheckResult>,
    pub version: String,
}

/// Individual health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub message: String,
    pub duration_ms: u64,
}

// ============================================================================
// Admin
// ============================================================================

/// Query parameters for listing failed webhooks
#[derive(Debug, Default, Deserialize)]
pub struct FailedWebhookQuery {
    #[serde(default)]
    pub include_resolved: bool,
}

/// Failed-webhook ledger listing
#[derive(Debug, Serialize, Deserialize)]
pub struct FailedWebhookListResponse {
    pub failed_webhooks: Vec<FailedWebhook>,
    pub total: usize,
}

impl FailedWebhookListResponse {
    pub fn new(failed_webhooks: Vec<FailedWebhook>) -> Self {
        Self {
            total: failed_webhooks.len(),
            failed_webhooks,
        }
    }
}

/// Result of replaying a failed webhook
#[derive(Debug, Serialize, Deserialize)]
pub struct RetryResponse {
    pub event_id: String,
    pub result: HandlerResult,
}
