#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! # Payhook Core
//!
//! Core business logic for reconciling asynchronous payment-gateway callbacks
//! (Razorpay, PhonePe) against order state.
//!
//! The crate guarantees that each gateway event is applied to its order at most
//! once, even when the gateway redelivers the same callback concurrently.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions ([`IdempotencyStore`],
//!   [`OrderStore`], [`FailedWebhookStore`], [`MetricsSink`], [`SignatureVerifier`])
//! - Infrastructure implementations are injected at runtime (see [`adapters`])
//! - Gateway-specific translation lives behind [`GatewayHandler`]
//!
//! ## Usage
//!
//! ```rust
//! use payhook_core::{Gateway, Timestamp};
//!
//! let gateway: Gateway = "razorpay".parse().unwrap();
//! assert_eq!(gateway, Gateway::Razorpay);
//!
//! let now = Timestamp::now();
//! assert!(now.add_days(14) > now);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

pub use uuid::Uuid;

// ============================================================================
// Gateway
// ============================================================================

/// Payment gateway that delivered a webhook.
///
/// The set is closed: adding a gateway means adding a variant here and one
/// [`GatewayHandler`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Razorpay,
    PhonePe,
}

impl Gateway {
    /// All supported gateways
    pub const ALL: [Gateway; 2] = [Gateway::Razorpay, Gateway::PhonePe];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Razorpay => "razorpay",
            Self::PhonePe => "phonepe",
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gateway {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "razorpay" => Ok(Self::Razorpay),
            "phonepe" => Ok(Self::PhonePe),
            _ => Err(ParseError::InvalidFormat {
                expected: "razorpay or phonepe".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Time
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Add a std duration, saturating at the representable maximum
    pub fn add_duration(&self, duration: Duration) -> Self {
        let delta = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        Self(self.0.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    /// Add whole days
    pub fn add_days(&self, days: u32) -> Self {
        self.add_duration(Duration::from_secs(u64::from(days) * 86_400))
    }

    /// Get duration since another timestamp (zero if `other` is later)
    pub fn duration_since(&self, other: Self) -> Duration {
        self.0
            .signed_duration_since(other.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

/// Source of "server" time for persisted records.
///
/// Stores take their timestamps from a clock they own rather than from the
/// caller, so `processed_at`/`created_at` never depend on client clocks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = now.add_duration(by);
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Timestamp) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Identifier for tracing requests across system boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get string representation
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Deployment environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

impl Environment {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ParseError::InvalidFormat {
                expected: "development, staging, or production".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures requiring immediate attention
    Security,
    /// Configuration errors preventing startup
    Configuration,
}

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Secret handling for gateway credentials
pub mod secrets;

/// Gateway signature verification
pub mod signature;

/// Event identity extraction
pub mod identity;

/// Order model and payment state machine
pub mod orders;

/// Idempotency store contract and processed-webhook records
pub mod idempotency;

/// Gateway-specific handlers
pub mod gateways;

/// Best-effort metrics
pub mod monitoring;

/// Ledger of acknowledged-but-unapplied webhooks
pub mod failed_webhooks;

/// Retention sweeper for processed-webhook records
pub mod sweeper;

/// Webhook envelope, errors and orchestration
pub mod webhook;

/// Storage adapters module for infrastructure implementations
pub mod adapters;

// Re-export key types for convenience
pub use adapters::{FilesystemIdempotencyStore, InMemoryFailedWebhookStore, MemoryDocumentStore};
pub use failed_webhooks::{FailedWebhook, FailedWebhookStore, RetryClaim};
pub use gateways::{
    GatewayHandler, HandlerRegistry, HandlerResult, HandlerStatus, PhonePeHandler,
    RazorpayHandler,
};
pub use idempotency::{
    IdempotencyStore, MarkOutcome, ProcessOutcome, ProcessedWebhookRecord, StoreError,
    DEFAULT_RETENTION_DAYS,
};
pub use identity::{EventIdentity, EventIdentityExtractor};
pub use monitoring::{
    BestEffortMetrics, Counter, InMemoryMetricsSink, MetricsError, MetricsSink, NoOpMetricsSink,
};
pub use orders::{
    Order, OrderStateMachine, OrderStatus, OrderStore, PaymentAttempt, PaymentDetail,
    PaymentEvent, PaymentStatus, Transition,
};
pub use secrets::SecretValue;
pub use signature::{GatewaySignatureVerifier, MissingSecretPolicy, SignatureError, SignatureVerifier};
pub use sweeper::RetentionSweeper;
pub use webhook::{ProcessingMode, WebhookEnvelope, WebhookError, WebhookOutcome, WebhookService};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
