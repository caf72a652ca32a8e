//! Best-effort metrics.
//!
//! The domain layer names the counters it cares about; infrastructure
//! (payhook-api with Prometheus) supplies a [`MetricsSink`]. Every increment
//! goes through [`BestEffortMetrics`], which always attempts the increment and
//! always discards its error, so a dead metrics backend can never fail a
//! webhook.
//!
//! # Examples
//!
//! ```rust
//! use payhook_core::monitoring::{BestEffortMetrics, Counter, InMemoryMetricsSink};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(InMemoryMetricsSink::new());
//! let metrics = BestEffortMetrics::new(sink.clone());
//!
//! metrics.record(Counter::WebhookDuplicates);
//! assert_eq!(sink.get(Counter::WebhookDuplicates), 1);
//! ```

use crate::gateways::{HandlerResult, HandlerStatus};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Monotonic, gateway-agnostic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    PaymentsSuccess,
    PaymentsFailed,
    WebhookDuplicates,
    WebhookProcessed,
    WebhookInvalidSignature,
    WebhookOrderNotFound,
}

impl Counter {
    pub const ALL: [Counter; 6] = [
        Counter::PaymentsSuccess,
        Counter::PaymentsFailed,
        Counter::WebhookDuplicates,
        Counter::WebhookProcessed,
        Counter::WebhookInvalidSignature,
        Counter::WebhookOrderNotFound,
    ];

    /// Exported counter name
    pub fn name(&self) -> &'static str {
        match self {
            Self::PaymentsSuccess => "payments_success",
            Self::PaymentsFailed => "payments_failed",
            Self::WebhookDuplicates => "webhook_duplicates",
            Self::WebhookProcessed => "webhook_processed",
            Self::WebhookInvalidSignature => "webhook_invalid_signature",
            Self::WebhookOrderNotFound => "webhook_order_not_found",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Self::PaymentsSuccess => "Payments confirmed by a gateway and applied to an order",
            Self::PaymentsFailed => "Failed payment attempts recorded against an order",
            Self::WebhookDuplicates => "Webhook deliveries short-circuited by the idempotency gate",
            Self::WebhookProcessed => "Webhook events processed to a terminal result",
            Self::WebhookInvalidSignature => "Webhook deliveries rejected for a bad signature",
            Self::WebhookOrderNotFound => "Webhook events referencing an unknown order",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure reported by a metrics backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetricsError {
    #[error("Metrics backend unavailable: {message}")]
    Unavailable { message: String },
}

/// Fire-and-forget counter sink.
///
/// Implementations may fail; callers go through [`BestEffortMetrics`].
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSink: Send + Sync {
    fn increment(&self, counter: Counter) -> Result<(), MetricsError>;
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetricsSink;

impl MetricsSink for NoOpMetricsSink {
    fn increment(&self, _counter: Counter) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Sink that keeps counts in memory (tests, local runs)
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    counts: Mutex<HashMap<Counter, u64>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter
    pub fn get(&self, counter: Counter) -> u64 {
        self.counts
            .lock()
            .map(|counts| counts.get(&counter).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn increment(&self, counter: Counter) -> Result<(), MetricsError> {
        let mut counts = self.counts.lock().map_err(|_| MetricsError::Unavailable {
            message: "counter map lock poisoned".to_string(),
        })?;
        *counts.entry(counter).or_insert(0) += 1;
        Ok(())
    }
}

/// Wrapper that never lets a metrics failure escape
#[derive(Clone)]
pub struct BestEffortMetrics {
    sink: Arc<dyn MetricsSink>,
}

impl BestEffortMetrics {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    /// Metrics wrapper over [`NoOpMetricsSink`]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoOpMetricsSink))
    }

    /// Increment a counter, swallowing any sink error
    pub fn record(&self, counter: Counter) {
        if let Err(e) = self.sink.increment(counter) {
            debug!(counter = counter.name(), error = %e, "Discarding metrics failure");
        }
    }

    /// Record the counters for a handled (non-duplicate) event
    pub fn record_outcome(&self, result: &HandlerResult) {
        match result.status {
            HandlerStatus::Success => self.record(Counter::PaymentsSuccess),
            HandlerStatus::Recorded => self.record(Counter::PaymentsFailed),
            HandlerStatus::Ignored => {}
        }
        self.record(Counter::WebhookProcessed);
    }
}

impl fmt::Debug for BestEffortMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestEffortMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "monitoring_tests.rs"]
mod tests;
