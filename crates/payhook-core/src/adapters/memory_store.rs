//! # In-Memory Document Store
//!
//! Thread-safe in-memory implementation of [`IdempotencyStore`] and
//! [`OrderStore`]. Both collections sit behind one lock, so every operation
//! is serializable and the combined marker + order transaction is genuinely
//! atomic. Suitable for tests, local development and single-instance
//! deployments.

use crate::{
    gateways::HandlerResult,
    idempotency::{
        IdempotencyStore, MarkOutcome, ProcessOutcome, ProcessedWebhookRecord, StoreError,
        DEFAULT_RETENTION_DAYS,
    },
    identity::EventIdentity,
    orders::{Order, OrderMutation, OrderStore, Transition},
    webhook::WebhookError,
    Clock, Gateway, SystemClock, Timestamp,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct Documents {
    processed: HashMap<String, ProcessedWebhookRecord>,
    orders: HashMap<String, Order>,
}

/// Shared in-memory store for processed-webhook records and orders
#[derive(Clone)]
pub struct MemoryDocumentStore {
    documents: Arc<Mutex<Documents>>,
    clock: Arc<dyn Clock>,
    retention_days: u32,
}

impl MemoryDocumentStore {
    /// Create an empty store on the system clock with 14-day retention
    pub fn new() -> Self {
        Self {
            documents: Arc::new(Mutex::new(Documents::default())),
            clock: Arc::new(SystemClock),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    /// Use a different clock for record timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Number of processed-webhook records currently held
    pub fn processed_count(&self) -> usize {
        self.lock().map(|docs| docs.processed.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>, StoreError> {
        self.documents.lock().map_err(|_| StoreError::Unavailable {
            message: "document store lock poisoned".to_string(),
        })
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryDocumentStore {
    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    #[instrument(skip(self, identity), fields(event_id = %identity.event_id))]
    async fn check_and_mark(
        &self,
        gateway: Gateway,
        identity: &EventIdentity,
    ) -> Result<MarkOutcome, StoreError> {
        let now = self.clock.now();
        let mut docs = self.lock()?;

        if docs.processed.contains_key(&identity.event_id) {
            debug!("Processed-webhook record already exists");
            return Ok(MarkOutcome::Duplicate);
        }

        let record = ProcessedWebhookRecord::new(gateway, identity, now, self.retention_days);
        docs.processed.insert(identity.event_id.clone(), record);
        Ok(MarkOutcome::Fresh)
    }

    fn supports_atomic_processing(&self) -> bool {
        true
    }

    #[instrument(skip(self, identity, mutation), fields(event_id = %identity.event_id))]
    async fn process_idempotent(
        &self,
        gateway: Gateway,
        identity: &EventIdentity,
        mutation: &OrderMutation<'_>,
    ) -> Result<ProcessOutcome, WebhookError> {
        let now = self.clock.now();
        let mut docs = self.lock()?;

        if docs.processed.contains_key(&identity.event_id) {
            debug!("Processed-webhook record already exists");
            return Ok(ProcessOutcome::Duplicate);
        }

        let current = identity
            .order_id
            .as_deref()
            .and_then(|id| docs.orders.get(id));
        let planned = mutation(current, now);

        // The marker commits whether or not the mutation applies.
        let record = ProcessedWebhookRecord::new(gateway, identity, now, self.retention_days);
        docs.processed.insert(identity.event_id.clone(), record);

        match planned? {
            Transition::Apply { order, result } => {
                docs.orders.insert(order.id.clone(), order);
                Ok(ProcessOutcome::Processed(result))
            }
            Transition::Skip(result) => Ok(ProcessOutcome::Processed(result)),
        }
    }

    async fn get_record(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedWebhookRecord>, StoreError> {
        Ok(self.lock()?.processed.get(event_id).cloned())
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<usize, StoreError> {
        let mut docs = self.lock()?;
        let before = docs.processed.len();
        docs.processed.retain(|_, record| !record.is_expired(now));
        Ok(before - docs.processed.len())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl OrderStore for MemoryDocumentStore {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, WebhookError> {
        Ok(self.lock()?.orders.get(order_id).cloned())
    }

    async fn insert_order(&self, order: Order) -> Result<(), WebhookError> {
        self.lock()?.orders.insert(order.id.clone(), order);
        Ok(())
    }

    #[instrument(skip(self, mutation))]
    async fn update_order(
        &self,
        order_id: &str,
        mutation: &OrderMutation<'_>,
    ) -> Result<HandlerResult, WebhookError> {
        let now = self.clock.now();
        let mut docs = self.lock()?;

        match mutation(docs.orders.get(order_id), now)? {
            Transition::Apply { order, result } => {
                docs.orders.insert(order.id.clone(), order);
                Ok(result)
            }
            Transition::Skip(result) => Ok(result),
        }
    }
}

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;
