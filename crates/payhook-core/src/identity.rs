//! Event identity extraction.
//!
//! Every gateway callback must yield a globally unique event id before any
//! state is touched. The event id is the idempotency key and is never the
//! order id: one order receives several distinct events (captured, failed,
//! order.paid) which must each apply once.

use crate::{webhook::WebhookError, Gateway};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

/// Identifiers required to gate and route one gateway event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventIdentity {
    /// Idempotency key, unique per gateway event
    pub event_id: String,
    /// Order the event pertains to, when the payload names one
    pub order_id: Option<String>,
    /// Coarse event type (`payment.captured`, `PAYMENT_SUCCESS`, ...)
    pub event_type: String,
}

impl EventIdentity {
    pub fn new(
        event_id: impl Into<String>,
        order_id: Option<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            order_id,
            event_type: event_type.into(),
        }
    }
}

/// Per-gateway derivation of [`EventIdentity`] from a decoded payload.
///
/// Implementations receive the payload after
/// [`GatewayHandler::normalize_payload`](crate::GatewayHandler::normalize_payload)
/// has unwrapped any gateway envelope.
pub trait EventIdentityExtractor: Send + Sync {
    /// Gateway this extractor understands
    fn gateway(&self) -> Gateway;

    /// Event id, or `None` when the payload carries no usable id
    fn extract_event_id(&self, payload: &Value) -> Option<String>;

    /// Order reference, if present
    fn extract_order_id(&self, payload: &Value) -> Option<String>;

    /// Event type; empty when absent
    fn extract_event_type(&self, payload: &Value) -> String;

    /// Derive the full identity.
    ///
    /// `event_id_hint` is an id supplied out of band (a delivery header) and
    /// is used only when the payload itself carries none. An empty event id
    /// is a hard error: there is nothing to gate on.
    fn extract_identity(
        &self,
        payload: &Value,
        event_id_hint: Option<&str>,
    ) -> Result<EventIdentity, WebhookError> {
        let event_id = self.extract_event_id(payload).or_else(|| {
            event_id_hint
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });

        let Some(event_id) = event_id else {
            error!(
                gateway = %self.gateway(),
                payload = %payload,
                "Webhook payload has no usable event id"
            );
            return Err(WebhookError::MissingEventIdentity {
                gateway: self.gateway(),
            });
        };

        Ok(EventIdentity {
            event_id,
            order_id: self.extract_order_id(payload),
            event_type: self.extract_event_type(payload),
        })
    }
}

/// Walk a dotted path (`payload.payment.entity.id`) through nested objects.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

/// Read a dotted path as a non-empty string. Numbers are rendered as text.
pub fn lookup_str(value: &Value, path: &str) -> Option<String> {
    match lookup(value, path)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-empty string among several dotted paths.
pub fn first_str(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| lookup_str(value, path))
}
