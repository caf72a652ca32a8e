//! Razorpay webhook handler.
//!
//! Razorpay posts `{ "event": "payment.captured", "payload": { "payment":
//! { "entity": { ... } } } }` and identifies the delivery in the
//! `X-Razorpay-Event-Id` header. The order reference travels in the entity's
//! `notes.order_reference`, set when the checkout was created.

use super::GatewayHandler;
use crate::{
    identity::{first_str, lookup, lookup_str, EventIdentityExtractor},
    orders::{PaymentAttempt, PaymentEvent},
    webhook::WebhookError,
    Gateway,
};
use serde_json::Value;
use tracing::{instrument, warn};

/// Gateway tag used in routes and records
pub const PROVIDER_ID: &str = "razorpay";

const PAYMENT_CAPTURED: &str = "payment.captured";
const PAYMENT_FAILED: &str = "payment.failed";
const ORDER_PAID: &str = "order.paid";

const ORDER_REFERENCE_PATHS: [&str; 3] = [
    "payload.payment.entity.notes.order_reference",
    "payload.order.entity.notes.order_reference",
    "payload.order.entity.receipt",
];

/// Handler for Razorpay payment events
#[derive(Debug, Clone, Copy, Default)]
pub struct RazorpayHandler;

impl RazorpayHandler {
    pub fn new() -> Self {
        Self
    }

    fn attempt(&self, payload: &Value) -> Result<PaymentAttempt, WebhookError> {
        let gateway_payment_id = first_str(
            payload,
            &["payload.payment.entity.id", "payload.order.entity.id"],
        )
        .ok_or_else(|| WebhookError::MalformedPayload {
            message: "razorpay event has no payment or order entity id".to_string(),
        })?;

        let amount_minor = first_amount(
            payload,
            &["payload.payment.entity.amount", "payload.order.entity.amount_paid"],
        )
        .unwrap_or_else(|| {
            warn!(
                gateway_payment_id = %gateway_payment_id,
                "Razorpay event carries no amount; recording zero"
            );
            0
        });

        Ok(PaymentAttempt {
            order_id: self.extract_order_id(payload),
            gateway_payment_id,
            amount_minor,
            error_reason: None,
        })
    }
}

impl EventIdentityExtractor for RazorpayHandler {
    fn gateway(&self) -> Gateway {
        Gateway::Razorpay
    }

    fn extract_event_id(&self, payload: &Value) -> Option<String> {
        let nested = match payload.get("event") {
            Some(Value::Object(_)) => lookup_str(payload, "event.id"),
            _ => None,
        };
        nested.or_else(|| lookup_str(payload, "id"))
    }

    fn extract_order_id(&self, payload: &Value) -> Option<String> {
        first_str(payload, &ORDER_REFERENCE_PATHS)
    }

    fn extract_event_type(&self, payload: &Value) -> String {
        match payload.get("event") {
            Some(Value::String(name)) => name.trim().to_string(),
            Some(Value::Object(_)) => {
                first_str(payload, &["event.name", "event.type"]).unwrap_or_default()
            }
            _ => String::new(),
        }
    }
}

impl GatewayHandler for RazorpayHandler {
    #[instrument(skip(self, payload), fields(gateway = PROVIDER_ID))]
    fn parse_event(&self, payload: &Value) -> Result<PaymentEvent, WebhookError> {
        let event_type = self.extract_event_type(payload);

        match event_type.as_str() {
            PAYMENT_CAPTURED | ORDER_PAID => Ok(PaymentEvent::Captured(self.attempt(payload)?)),
            PAYMENT_FAILED => {
                let mut attempt = self.attempt(payload)?;
                attempt.error_reason = Some(
                    first_str(
                        payload,
                        &[
                            "payload.payment.entity.error_description",
                            "payload.payment.entity.error_reason",
                            "payload.payment.entity.error_code",
                        ],
                    )
                    .unwrap_or_else(|| "payment failed".to_string()),
                );
                Ok(PaymentEvent::Failed(attempt))
            }
            _ => Ok(PaymentEvent::Unrecognized { event_type }),
        }
    }
}

/// Integer amount in paise from the first path holding one
fn first_amount(payload: &Value, paths: &[&str]) -> Option<i64> {
    paths.iter().find_map(|path| match lookup(payload, path)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
#[path = "razorpay_tests.rs"]
mod tests;
