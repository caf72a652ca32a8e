//! Gateway-specific webhook handlers.
//!
//! Each gateway is one [`GatewayHandler`] implementation registered in a
//! [`HandlerRegistry`] under its [`Gateway`] tag. Handlers translate a raw
//! payload into a [`PaymentEvent`]; applying the event to an order is shared
//! through [`OrderStateMachine`].

use crate::{
    identity::EventIdentityExtractor,
    orders::{Order, OrderStateMachine, OrderStore, PaymentEvent},
    webhook::WebhookError,
    Gateway, Timestamp,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

mod phonepe;
mod razorpay;

pub use phonepe::PhonePeHandler;
pub use razorpay::RazorpayHandler;

// ============================================================================
// Handler results
// ============================================================================

/// Terminal status of a handled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerStatus {
    /// Payment confirmed and order advanced
    Success,
    /// Failed payment attempt appended to the order
    Recorded,
    /// Nothing to do (unknown event type or order past the gated state)
    Ignored,
}

impl HandlerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Recorded => "recorded",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for HandlerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying one gateway event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResult {
    pub status: HandlerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_payment_id: Option<String>,
}

impl HandlerResult {
    pub fn success(order_id: &str, gateway_payment_id: &str) -> Self {
        Self {
            status: HandlerStatus::Success,
            order_id: Some(order_id.to_string()),
            reason: None,
            gateway_payment_id: Some(gateway_payment_id.to_string()),
        }
    }

    pub fn ignored(order_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            status: HandlerStatus::Ignored,
            order_id,
            reason: Some(reason.into()),
            gateway_payment_id: None,
        }
    }
}

// ============================================================================
// Handler trait
// ============================================================================

/// Gateway-specific translation from payload to order mutation
#[async_trait]
pub trait GatewayHandler: EventIdentityExtractor {
    /// Unwrap any gateway envelope so extraction sees the event fields.
    fn normalize_payload(&self, payload: Value) -> Result<Value, WebhookError> {
        Ok(payload)
    }

    /// Classify the payload as a payment event
    fn parse_event(&self, payload: &Value) -> Result<PaymentEvent, WebhookError>;

    /// Parse and apply an event through the order store's own transaction.
    async fn handle(
        &self,
        event_id: &str,
        payload: &Value,
        orders: &dyn OrderStore,
    ) -> Result<HandlerResult, WebhookError> {
        let event = self.parse_event(payload)?;
        apply_event(self.gateway(), event_id, &event, orders).await
    }
}

/// Apply a parsed event to its order using a single-document update.
pub async fn apply_event(
    gateway: Gateway,
    event_id: &str,
    event: &PaymentEvent,
    orders: &dyn OrderStore,
) -> Result<HandlerResult, WebhookError> {
    let Some(order_id) = event.order_id() else {
        let transition = OrderStateMachine::plan(gateway, event_id, event, None, Timestamp::now())?;
        return Ok(transition.result().clone());
    };

    let mutation = |current: Option<&Order>, now: Timestamp| {
        OrderStateMachine::plan(gateway, event_id, event, current, now)
    };
    orders.update_order(order_id, &mutation).await
}

// ============================================================================
// Registry
// ============================================================================

/// Closed mapping from gateway tag to handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Gateway, Arc<dyn GatewayHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Razorpay and PhonePe handlers
    pub fn with_defaults() -> Self {
        Self::new()
            .register(Arc::new(RazorpayHandler::new()))
            .register(Arc::new(PhonePeHandler::new()))
    }

    /// Register a handler under its own gateway tag
    pub fn register(mut self, handler: Arc<dyn GatewayHandler>) -> Self {
        self.handlers.insert(handler.gateway(), handler);
        self
    }

    /// Look up a handler by gateway
    pub fn get(&self, gateway: Gateway) -> Result<Arc<dyn GatewayHandler>, WebhookError> {
        self.handlers
            .get(&gateway)
            .cloned()
            .ok_or_else(|| WebhookError::UnknownGateway {
                gateway: gateway.to_string(),
            })
    }

    /// Resolve a free-form gateway tag (a path segment) to a handler
    pub fn resolve(&self, tag: &str) -> Result<Arc<dyn GatewayHandler>, WebhookError> {
        let gateway = tag
            .parse::<Gateway>()
            .map_err(|_| WebhookError::UnknownGateway {
                gateway: tag.to_string(),
            })?;
        self.get(gateway)
    }

    pub fn gateways(&self) -> Vec<Gateway> {
        let mut gateways: Vec<Gateway> = self.handlers.keys().copied().collect();
        gateways.sort();
        gateways
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("gateways", &self.gateways())
            .finish()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
