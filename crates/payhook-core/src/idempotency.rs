//! Idempotency store contract.
//!
//! The store is the single synchronization point between concurrent webhook
//! deliveries. Its one essential guarantee: for a given event id, exactly one
//! caller of [`IdempotencyStore::check_and_mark`] observes "not yet processed"
//! and writes the marker. Every other caller, concurrent or later, sees a
//! duplicate until the record is purged after its retention window.
//!
//! Stores that can update an order in the same transaction as the marker
//! also implement [`IdempotencyStore::process_idempotent`]. That closes the
//! window where the marker exists but the order was never mutated.

use crate::{
    gateways::HandlerResult, identity::EventIdentity, orders::OrderMutation,
    webhook::WebhookError, Gateway, Timestamp,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Days a processed-webhook record is retained before it may be purged
pub const DEFAULT_RETENTION_DAYS: u32 = 14;

/// Persisted marker proving an event was handled.
///
/// Created exactly once, never mutated, deleted only after `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedWebhookRecord {
    pub event_id: String,
    pub gateway: Gateway,
    pub order_id: Option<String>,
    pub event_type: String,
    pub processed_at: Timestamp,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl ProcessedWebhookRecord {
    /// Build a record stamped with the store's clock reading
    pub fn new(
        gateway: Gateway,
        identity: &EventIdentity,
        now: Timestamp,
        retention_days: u32,
    ) -> Self {
        Self {
            event_id: identity.event_id.clone(),
            gateway,
            order_id: identity.order_id.clone(),
            event_type: identity.event_type.clone(),
            processed_at: now,
            created_at: now,
            expires_at: now.add_days(retention_days),
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// Result of a check-and-mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// No prior record; the marker was written by this call
    Fresh,
    /// A record already existed; nothing was written
    Duplicate,
}

impl MarkOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

/// Result of a combined marker + order mutation
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Duplicate,
    Processed(HandlerResult),
}

/// Store-level failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation not supported by this store: {operation}")]
    Unsupported { operation: String },
}

impl StoreError {
    /// Whether the same request may succeed if retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Io(_))
    }
}

/// Keyed, atomically checked store of processed-webhook records
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Server-assigned time used for `processed_at`/`created_at`
    fn now(&self) -> Timestamp;

    /// Atomically check for a record keyed by `identity.event_id` and create
    /// it when absent.
    ///
    /// Two concurrent calls for the same event id never both return
    /// [`MarkOutcome::Fresh`].
    async fn check_and_mark(
        &self,
        gateway: Gateway,
        identity: &EventIdentity,
    ) -> Result<MarkOutcome, StoreError>;

    /// Whether [`process_idempotent`](Self::process_idempotent) is available
    fn supports_atomic_processing(&self) -> bool {
        false
    }

    /// Check-and-mark and run an order mutation in one transaction.
    ///
    /// The mutation receives the order named by `identity.order_id` (or
    /// `None`). On duplicate the mutation is not invoked.
    ///
    /// Error contract: a [`WebhookError::Store`] means nothing was committed.
    /// Any other error came from the mutation itself and the marker *was*
    /// committed while the order was left untouched.
    async fn process_idempotent(
        &self,
        _gateway: Gateway,
        _identity: &EventIdentity,
        _mutation: &OrderMutation<'_>,
    ) -> Result<ProcessOutcome, WebhookError> {
        Err(WebhookError::Store(StoreError::Unsupported {
            operation: "process_idempotent".to_string(),
        }))
    }

    /// Fetch a record by event id
    async fn get_record(&self, event_id: &str)
        -> Result<Option<ProcessedWebhookRecord>, StoreError>;

    /// Delete records whose `expires_at` is at or before `now`; returns the count
    async fn purge_expired(&self, now: Timestamp) -> Result<usize, StoreError>;

    /// Verify the store is reachable
    async fn health_check(&self) -> Result<(), StoreError>;
}
