//! Webhook envelope, error taxonomy and orchestration.
//!
//! The HTTP boundary builds a [`WebhookEnvelope`] from the raw request and
//! hands it to [`WebhookService::handle_webhook`], which runs
//!
//! ```text
//! verify signature → extract identity → idempotency gate → handler → metrics
//! ```

use crate::{
    gateways::HandlerResult, idempotency::StoreError, CorrelationId, ErrorCategory, Gateway,
    Timestamp,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

mod service;

pub use service::WebhookService;

// ============================================================================
// Envelope
// ============================================================================

/// One inbound gateway callback, exactly as received.
///
/// `body` must be the unmodified request bytes; signatures are computed over
/// them and re-serialized JSON will not verify.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub gateway: Gateway,
    pub body: Bytes,
    pub signature: Option<String>,
    /// Delivery id supplied outside the payload (`X-Razorpay-Event-Id`)
    pub event_id_hint: Option<String>,
    pub received_at: Timestamp,
    pub correlation_id: CorrelationId,
}

impl WebhookEnvelope {
    pub fn new(gateway: Gateway, body: impl Into<Bytes>, signature: Option<String>) -> Self {
        Self {
            gateway,
            body: body.into(),
            signature,
            event_id_hint: None,
            received_at: Timestamp::now(),
            correlation_id: CorrelationId::new(),
        }
    }

    pub fn with_event_id_hint(mut self, hint: Option<String>) -> Self {
        self.event_id_hint = hint;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

// ============================================================================
// Processing mode
// ============================================================================

/// How the idempotency marker and the order mutation are committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Marker and order mutation in one store transaction
    #[default]
    Atomic,
    /// Marker first, then the order mutation; failures after marking go to
    /// the failed-webhook ledger
    TwoStep,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic => f.write_str("atomic"),
            Self::TwoStep => f.write_str("two_step"),
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Successful result of [`WebhookService::handle_webhook`]
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Event handled for the first time
    Processed {
        event_id: String,
        result: HandlerResult,
    },
    /// Event already handled; no handler ran
    Duplicate { event_id: String },
}

impl WebhookOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Processed { event_id, .. } | Self::Duplicate { event_id } => event_id,
        }
    }

    /// Status string reported to the gateway
    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Processed { result, .. } => result.status.as_str(),
            Self::Duplicate { .. } => "duplicate",
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while handling a webhook
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Invalid signature for {gateway} webhook")]
    InvalidSignature { gateway: Gateway },

    #[error("{gateway} webhook has no usable event id")]
    MissingEventIdentity { gateway: Gateway },

    #[error("Unknown gateway: {gateway}")]
    UnknownGateway { gateway: String },

    #[error("Order '{order_id}' not found for event '{event_id}'")]
    OrderNotFound { order_id: String, event_id: String },

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("No failed webhook recorded for event '{event_id}'")]
    FailedWebhookNotFound { event_id: String },

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),
}

impl WebhookError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::InvalidSignature { .. }
            | Self::MissingEventIdentity { .. }
            | Self::UnknownGateway { .. }
            | Self::OrderNotFound { .. }
            | Self::MalformedPayload { .. }
            | Self::FailedWebhookNotFound { .. } => false,
        }
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSignature { .. } => ErrorCategory::Security,
            Self::Store(e) if e.is_transient() => ErrorCategory::Transient,
            Self::Store(StoreError::Unsupported { .. }) => ErrorCategory::Configuration,
            Self::Store(_)
            | Self::MissingEventIdentity { .. }
            | Self::UnknownGateway { .. }
            | Self::OrderNotFound { .. }
            | Self::MalformedPayload { .. }
            | Self::FailedWebhookNotFound { .. } => ErrorCategory::Permanent,
        }
    }

    /// Permanent failures a gateway would otherwise redeliver forever.
    ///
    /// The boundary may answer these with a success status so the gateway
    /// stops retrying.
    pub fn is_acknowledgeable(&self) -> bool {
        matches!(
            self,
            Self::MissingEventIdentity { .. }
                | Self::OrderNotFound { .. }
                | Self::MalformedPayload { .. }
        )
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
