//! # In-Memory Failed-Webhook Ledger

use crate::{
    failed_webhooks::{FailedWebhook, FailedWebhookStore, RetryClaim},
    idempotency::StoreError,
    Timestamp,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory [`FailedWebhookStore`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryFailedWebhookStore {
    state: Arc<RwLock<Ledger>>,
}

#[derive(Debug, Default)]
struct Ledger {
    entries: HashMap<String, FailedWebhook>,
    claimed: HashSet<String>,
}

impl InMemoryFailedWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable {
        message: "failed-webhook ledger lock poisoned".to_string(),
    }
}

#[async_trait]
impl FailedWebhookStore for InMemoryFailedWebhookStore {
    async fn record_failure(&self, entry: FailedWebhook) -> Result<FailedWebhook, StoreError> {
        let mut ledger = self.state.write().map_err(|_| poisoned())?;
        ledger.claimed.remove(&entry.event_id);

        let stored = match ledger.entries.get_mut(&entry.event_id) {
            Some(existing) => {
                existing.attempts = existing.attempts.saturating_add(1);
                existing.last_failed_at = entry.last_failed_at;
                existing.error = entry.error;
                existing.resolved_at = None;
                existing.clone()
            }
            None => {
                let stored = FailedWebhook {
                    attempts: entry.attempts.max(1),
                    ..entry
                };
                ledger
                    .entries
                    .insert(stored.event_id.clone(), stored.clone());
                stored
            }
        };

        Ok(stored)
    }

    async fn get(&self, event_id: &str) -> Result<Option<FailedWebhook>, StoreError> {
        let ledger = self.state.read().map_err(|_| poisoned())?;
        Ok(ledger.entries.get(event_id).cloned())
    }

    async fn list(&self, include_resolved: bool) -> Result<Vec<FailedWebhook>, StoreError> {
        let ledger = self.state.read().map_err(|_| poisoned())?;
        let mut listed: Vec<FailedWebhook> = ledger
            .entries
            .values()
            .filter(|e| include_resolved || !e.is_resolved())
            .cloned()
            .collect();
        listed.sort_by(|a, b| {
            a.first_failed_at
                .cmp(&b.first_failed_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        Ok(listed)
    }

    async fn claim_for_retry(&self, event_id: &str) -> Result<RetryClaim, StoreError> {
        let mut ledger = self.state.write().map_err(|_| poisoned())?;

        let Some(entry) = ledger.entries.get(event_id).cloned() else {
            return Ok(RetryClaim::NotFound);
        };
        if entry.is_resolved() {
            return Ok(RetryClaim::AlreadyResolved(entry));
        }
        if !ledger.claimed.insert(event_id.to_string()) {
            return Ok(RetryClaim::InProgress(entry));
        }

        Ok(RetryClaim::Claimed(entry))
    }

    async fn release_retry(&self, event_id: &str) -> Result<(), StoreError> {
        let mut ledger = self.state.write().map_err(|_| poisoned())?;
        ledger.claimed.remove(event_id);
        Ok(())
    }

    async fn mark_resolved(
        &self,
        event_id: &str,
        at: Timestamp,
    ) -> Result<Option<FailedWebhook>, StoreError> {
        let mut ledger = self.state.write().map_err(|_| poisoned())?;
        ledger.claimed.remove(event_id);
        Ok(ledger.entries.get_mut(event_id).map(|entry| {
            entry.resolved_at = Some(at);
            entry.clone()
        }))
    }
}

#[cfg(test)]
#[path = "memory_failed_webhooks_tests.rs"]
mod tests;
