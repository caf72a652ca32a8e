//! Webhook orchestration.

use super::{ProcessingMode, WebhookEnvelope, WebhookError, WebhookOutcome};
use crate::{
    failed_webhooks::{FailedWebhook, FailedWebhookStore, RetryClaim},
    gateways::{apply_event, HandlerRegistry, HandlerResult},
    idempotency::{IdempotencyStore, MarkOutcome, ProcessOutcome, StoreError},
    identity::EventIdentity,
    monitoring::{BestEffortMetrics, Counter},
    orders::{Order, OrderStateMachine, OrderStore, PaymentEvent},
    signature::SignatureVerifier,
    Gateway, Timestamp,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Span};

/// Error raised after the idempotency gate, tagged with whether the marker
/// was committed before the failure.
struct ProcessingFailure {
    error: WebhookError,
    marker_committed: bool,
}

/// Orchestrates verify → identity → idempotency gate → handler → metrics
pub struct WebhookService {
    verifier: Arc<dyn SignatureVerifier>,
    handlers: HandlerRegistry,
    idempotency: Arc<dyn IdempotencyStore>,
    orders: Arc<dyn OrderStore>,
    failures: Arc<dyn FailedWebhookStore>,
    metrics: BestEffortMetrics,
    mode: ProcessingMode,
}

impl WebhookService {
    /// Create a service in [`ProcessingMode::Atomic`]
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        handlers: HandlerRegistry,
        idempotency: Arc<dyn IdempotencyStore>,
        orders: Arc<dyn OrderStore>,
        failures: Arc<dyn FailedWebhookStore>,
        metrics: BestEffortMetrics,
    ) -> Self {
        Self {
            verifier,
            handlers,
            idempotency,
            orders,
            failures,
            metrics,
            mode: ProcessingMode::Atomic,
        }
    }

    pub fn with_processing_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        if mode == ProcessingMode::Atomic && !self.idempotency.supports_atomic_processing() {
            warn!("Idempotency store cannot run combined transactions; using two-step processing");
            self.mode = ProcessingMode::TwoStep;
        }
        self
    }

    /// Mode actually in use
    pub fn processing_mode(&self) -> ProcessingMode {
        if self.mode == ProcessingMode::Atomic && !self.idempotency.supports_atomic_processing() {
            ProcessingMode::TwoStep
        } else {
            self.mode
        }
    }

    /// Handle one inbound webhook.
    ///
    /// Writes at most one idempotency record and mutates at most one order.
    /// A duplicate delivery returns [`WebhookOutcome::Duplicate`] without
    /// running any handler.
    #[instrument(
        skip(self, envelope),
        fields(
            gateway = %envelope.gateway,
            correlation_id = %envelope.correlation_id,
            event_id = tracing::field::Empty,
        )
    )]
    pub async fn handle_webhook(
        &self,
        envelope: WebhookEnvelope,
    ) -> Result<WebhookOutcome, WebhookError> {
        let gateway = envelope.gateway;

        if !self
            .verifier
            .verify(gateway, &envelope.body, envelope.signature.as_deref())
        {
            self.metrics.record(Counter::WebhookInvalidSignature);
            return Err(WebhookError::InvalidSignature { gateway });
        }

        let handler = self.handlers.get(gateway)?;

        let raw: Value =
            serde_json::from_slice(&envelope.body).map_err(|e| WebhookError::MalformedPayload {
                message: format!("body is not valid JSON: {e}"),
            })?;
        let payload = handler.normalize_payload(raw)?;

        let identity = handler.extract_identity(&payload, envelope.event_id_hint.as_deref())?;
        Span::current().record("event_id", identity.event_id.as_str());

        let event = handler.parse_event(&payload)?;

        let processed = match self.processing_mode() {
            ProcessingMode::Atomic => self.process_atomic(gateway, &identity, &event).await,
            ProcessingMode::TwoStep => self.process_two_step(gateway, &identity, &event).await,
        };

        match processed {
            Ok(ProcessOutcome::Duplicate) => {
                self.metrics.record(Counter::WebhookDuplicates);
                info!(event_type = %identity.event_type, "Duplicate webhook delivery ignored");
                Ok(WebhookOutcome::Duplicate {
                    event_id: identity.event_id,
                })
            }
            Ok(ProcessOutcome::Processed(result)) => {
                self.metrics.record_outcome(&result);
                info!(
                    event_type = %identity.event_type,
                    status = %result.status,
                    order_id = ?result.order_id,
                    "Webhook processed"
                );
                Ok(WebhookOutcome::Processed {
                    event_id: identity.event_id,
                    result,
                })
            }
            Err(failure) => {
                if failure.marker_committed {
                    self.record_unapplied(gateway, &identity, payload, &failure.error)
                        .await;
                }
                Err(failure.error)
            }
        }
    }

    /// Marker and order mutation in one store transaction.
    async fn process_atomic(
        &self,
        gateway: Gateway,
        identity: &EventIdentity,
        event: &PaymentEvent,
    ) -> Result<ProcessOutcome, ProcessingFailure> {
        let event_id = identity.event_id.as_str();
        let mutation = |current: Option<&Order>, now: Timestamp| {
            OrderStateMachine::plan(gateway, event_id, event, current, now)
        };

        self.idempotency
            .process_idempotent(gateway, identity, &mutation)
            .await
            .map_err(|error| ProcessingFailure {
                // Store errors roll back the whole transaction; anything else
                // came from the mutation after the marker was written.
                marker_committed: !matches!(error, WebhookError::Store(_)),
                error,
            })
    }

    /// Marker first, then a separate order transaction.
    async fn process_two_step(
        &self,
        gateway: Gateway,
        identity: &EventIdentity,
        event: &PaymentEvent,
    ) -> Result<ProcessOutcome, ProcessingFailure> {
        let marked = self
            .idempotency
            .check_and_mark(gateway, identity)
            .await
            .map_err(|e| ProcessingFailure {
                error: e.into(),
                marker_committed: false,
            })?;

        if marked == MarkOutcome::Duplicate {
            return Ok(ProcessOutcome::Duplicate);
        }

        apply_event(gateway, &identity.event_id, event, self.orders.as_ref())
            .await
            .map(ProcessOutcome::Processed)
            .map_err(|error| ProcessingFailure {
                error,
                marker_committed: true,
            })
    }

    /// Put an acknowledged-but-unapplied event in the failed-webhook ledger.
    async fn record_unapplied(
        &self,
        gateway: Gateway,
        identity: &EventIdentity,
        payload: Value,
        failure: &WebhookError,
    ) {
        if matches!(failure, WebhookError::OrderNotFound { .. }) {
            self.metrics.record(Counter::WebhookOrderNotFound);
        }

        error!(
            order_id = ?identity.order_id,
            event_type = %identity.event_type,
            error = %failure,
            payload = %payload,
            "Webhook marked processed but not applied; manual reconciliation required"
        );

        let now = self.idempotency.now();
        let entry = FailedWebhook {
            event_id: identity.event_id.clone(),
            gateway,
            order_id: identity.order_id.clone(),
            event_type: identity.event_type.clone(),
            payload,
            error: failure.to_string(),
            attempts: 1,
            first_failed_at: now,
            last_failed_at: now,
            resolved_at: None,
        };

        if let Err(e) = self.failures.record_failure(entry).await {
            error!(error = %e, "Failed to record unapplied webhook");
        }
    }

    /// Replay a ledger entry through its gateway handler.
    ///
    /// No signature check and no new idempotency marker: the event was
    /// verified and marked when it first arrived. The entry is claimed for
    /// the duration of the replay so concurrent retries of one event apply it
    /// at most once. A successful replay marks the entry resolved; a failed
    /// one bumps its attempt count.
    #[instrument(skip(self))]
    pub async fn retry_failed(&self, event_id: &str) -> Result<HandlerResult, WebhookError> {
        let entry = match self.failures.claim_for_retry(event_id).await? {
            RetryClaim::Claimed(entry) => entry,
            RetryClaim::AlreadyResolved(entry) => {
                return Ok(HandlerResult::ignored(entry.order_id, "already resolved"));
            }
            RetryClaim::InProgress(entry) => {
                info!("Replay already in progress for failed webhook");
                return Ok(HandlerResult::ignored(entry.order_id, "retry in progress"));
            }
            RetryClaim::NotFound => {
                return Err(WebhookError::FailedWebhookNotFound {
                    event_id: event_id.to_string(),
                });
            }
        };

        match self.replay(&entry).await {
            Ok(result) => {
                if let Err(e) = self
                    .failures
                    .mark_resolved(event_id, self.idempotency.now())
                    .await
                {
                    self.release_claim(event_id).await;
                    return Err(e.into());
                }
                self.metrics.record_outcome(&result);
                info!(status = %result.status, "Failed webhook replayed");
                Ok(result)
            }
            Err(e) => {
                let now = self.idempotency.now();
                let retried = FailedWebhook {
                    error: e.to_string(),
                    last_failed_at: now,
                    ..entry
                };
                if let Err(store_err) = self.failures.record_failure(retried).await {
                    error!(error = %store_err, "Failed to update failed webhook entry");
                    self.release_claim(event_id).await;
                }
                warn!(error = %e, "Failed webhook replay did not apply");
                Err(e)
            }
        }
    }

    async fn replay(&self, entry: &FailedWebhook) -> Result<HandlerResult, WebhookError> {
        let handler = self.handlers.get(entry.gateway)?;
        let event = handler.parse_event(&entry.payload)?;
        apply_event(entry.gateway, &entry.event_id, &event, self.orders.as_ref()).await
    }

    async fn release_claim(&self, event_id: &str) {
        if let Err(e) = self.failures.release_retry(event_id).await {
            error!(error = %e, "Failed to release retry claim");
        }
    }

    /// Ledger entries, oldest first
    pub async fn list_failed(
        &self,
        include_resolved: bool,
    ) -> Result<Vec<FailedWebhook>, WebhookError> {
        Ok(self.failures.list(include_resolved).await?)
    }

    /// Store reachability
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.idempotency.health_check().await
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
