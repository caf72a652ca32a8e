//! Ledger of webhooks that were acknowledged but not applied.
//!
//! When an event is marked processed but its order mutation cannot be applied
//! (the order does not exist yet, or the order write failed after the marker
//! was committed) the gateway will not redeliver it. The ledger keeps the raw
//! payload so an operator can reconcile the order and replay the event.

use crate::{idempotency::StoreError, Gateway, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One acknowledged-but-unapplied gateway event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedWebhook {
    pub event_id: String,
    pub gateway: Gateway,
    pub order_id: Option<String>,
    pub event_type: String,
    /// Normalized payload, replayed on retry
    pub payload: Value,
    /// Most recent failure message
    pub error: String,
    pub attempts: u32,
    pub first_failed_at: Timestamp,
    pub last_failed_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
}

impl FailedWebhook {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// Result of trying to take exclusive ownership of an entry for replay
#[derive(Debug, Clone, PartialEq)]
pub enum RetryClaim {
    /// The caller owns the entry until it records a failure, resolves it or releases it
    Claimed(FailedWebhook),
    AlreadyResolved(FailedWebhook),
    /// Another replay holds the claim
    InProgress(FailedWebhook),
    NotFound,
}

/// Persistence for [`FailedWebhook`] entries, keyed by event id
#[async_trait]
pub trait FailedWebhookStore: Send + Sync {
    /// Insert a new entry or bump `attempts`/`last_failed_at`/`error` on an existing one.
    ///
    /// Re-recording a resolved entry reopens it. Releases any retry claim.
    async fn record_failure(&self, entry: FailedWebhook) -> Result<FailedWebhook, StoreError>;

    async fn get(&self, event_id: &str) -> Result<Option<FailedWebhook>, StoreError>;

    /// Entries ordered by `first_failed_at`
    async fn list(&self, include_resolved: bool) -> Result<Vec<FailedWebhook>, StoreError>;

    /// Atomically claim an unresolved, unclaimed entry for replay
    async fn claim_for_retry(&self, event_id: &str) -> Result<RetryClaim, StoreError>;

    /// Drop a retry claim without changing the entry
    async fn release_retry(&self, event_id: &str) -> Result<(), StoreError>;

    /// Mark an entry resolved and release its claim; `None` if the event id is unknown
    async fn mark_resolved(
        &self,
        event_id: &str,
        at: Timestamp,
    ) -> Result<Option<FailedWebhook>, StoreError>;
}
