//! PhonePe webhook handler.
//!
//! PhonePe server-to-server callbacks arrive as `{"response": "<base64>"}`
//! where the decoded document looks like
//!
//! ```json
//! {
//!   "success": false,
//!   "code": "PAYMENT_ERROR",
//!   "message": "Payment failed",
//!   "data": { "merchantTransactionId": "...", "transactionId": "...", "amount": 1000 }
//! }
//! ```
//!
//! Test fixtures and older integrations post the decoded fields flat, so
//! every field is read at the top level first and then under `data`. The
//! merchant transaction id is the order reference in this integration.

use super::GatewayHandler;
use crate::{
    identity::{lookup_str, EventIdentityExtractor},
    orders::{PaymentAttempt, PaymentEvent},
    webhook::WebhookError,
    Gateway,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Gateway tag used in routes and records
pub const PROVIDER_ID: &str = "phonepe";

const PAYMENT_SUCCESS: &str = "PAYMENT_SUCCESS";
const PAYMENT_PENDING: &str = "PAYMENT_PENDING";

/// Handler for PhonePe payment callbacks
#[derive(Debug, Clone, Copy, Default)]
pub struct PhonePeHandler;

impl PhonePeHandler {
    pub fn new() -> Self {
        Self
    }
}

/// Read a field at the top level, then under `data`.
fn field(payload: &Value, name: &str) -> Option<String> {
    lookup_str(payload, name).or_else(|| lookup_str(payload, &format!("data.{name}")))
}

fn amount(payload: &Value) -> i64 {
    [payload.get("amount"), payload.get("data").and_then(|d| d.get("amount"))]
        .into_iter()
        .flatten()
        .find_map(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(0)
}

impl EventIdentityExtractor for PhonePeHandler {
    fn gateway(&self) -> Gateway {
        Gateway::PhonePe
    }

    fn extract_event_id(&self, payload: &Value) -> Option<String> {
        field(payload, "transactionId").or_else(|| field(payload, "merchantTransactionId"))
    }

    fn extract_order_id(&self, payload: &Value) -> Option<String> {
        field(payload, "merchantTransactionId")
    }

    fn extract_event_type(&self, payload: &Value) -> String {
        field(payload, "code").unwrap_or_default()
    }
}

impl GatewayHandler for PhonePeHandler {
    fn normalize_payload(&self, payload: Value) -> Result<Value, WebhookError> {
        let Some(encoded) = payload.get("response").and_then(Value::as_str) else {
            return Ok(payload);
        };

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| WebhookError::MalformedPayload {
                message: format!("phonepe response is not valid base64: {e}"),
            })?;

        let inner: Value =
            serde_json::from_slice(&decoded).map_err(|e| WebhookError::MalformedPayload {
                message: format!("phonepe response is not valid JSON: {e}"),
            })?;

        debug!("Decoded PhonePe callback envelope");
        Ok(inner)
    }

    /// Map a callback `code` to a payment event.
    ///
    /// `PAYMENT_PENDING` is not terminal and is ignored. It is still marked
    /// under its `transactionId`, so a later `PAYMENT_SUCCESS` carrying the
    /// same id is treated as a duplicate; such orders have to be reconciled
    /// against the PhonePe status API.
    #[instrument(skip(self, payload), fields(gateway = PROVIDER_ID))]
    fn parse_event(&self, payload: &Value) -> Result<PaymentEvent, WebhookError> {
        let code = self.extract_event_type(payload);
        if code == PAYMENT_PENDING {
            warn!(
                transaction_id = field(payload, "transactionId").as_deref(),
                "Pending PhonePe callback consumes its event id; a later final status for it will be a duplicate"
            );
            return Ok(PaymentEvent::Unrecognized { event_type: code });
        }
        if code.is_empty() {
            return Ok(PaymentEvent::Unrecognized { event_type: code });
        }

        let gateway_payment_id = field(payload, "transactionId")
            .or_else(|| field(payload, "providerReferenceId"))
            .or_else(|| field(payload, "merchantTransactionId"))
            .ok_or_else(|| WebhookError::MalformedPayload {
                message: "phonepe callback has no transaction id".to_string(),
            })?;

        let attempt = PaymentAttempt {
            order_id: self.extract_order_id(payload),
            gateway_payment_id,
            amount_minor: amount(payload),
            error_reason: None,
        };

        if code == PAYMENT_SUCCESS {
            Ok(PaymentEvent::Captured(attempt))
        } else {
            Ok(PaymentEvent::Failed(PaymentAttempt {
                error_reason: Some(field(payload, "message").unwrap_or(code)),
                ..attempt
            }))
        }
    }
}

#[cfg(test)]
#[path = "phonepe_tests.rs"]
mod tests;
