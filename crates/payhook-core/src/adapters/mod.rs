//! # Infrastructure Adapters
//!
//! Store implementations for the idempotency, order and failed-webhook
//! contracts.

pub mod filesystem_store;
pub mod memory_failed_webhooks;
pub mod memory_store;

pub use filesystem_store::FilesystemIdempotencyStore;
pub use memory_failed_webhooks::InMemoryFailedWebhookStore;
pub use memory_store::MemoryDocumentStore;
