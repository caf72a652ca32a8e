//! Order model and the payment state machine.
//!
//! Orders are owned by the wider business system; this crate only reads them
//! and applies payment mutations. The sole forward transition handled here is
//!
//! ```text
//! awaiting_payment --success--> pending
//! <any>            --failed---> <unchanged>   (payment detail appended)
//! ```

use crate::{
    gateways::{HandlerResult, HandlerStatus},
    webhook::WebhookError,
    Gateway, Timestamp,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Order model
// ============================================================================

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingPayment,
    Pending,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingPayment => "awaiting_payment",
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one payment attempt as reported by a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
}

/// Append-only entry in an order's payment history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetail {
    pub method: Gateway,
    pub gateway_payment_id: String,
    pub status: PaymentStatus,
    /// Amount in major currency units (rupees)
    pub amount: f64,
    /// Amount in minor currency units (paise), as sent by the gateway
    pub amount_minor: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Gateway event that produced this entry
    pub event_id: String,
    pub timestamp: Timestamp,
}

/// Order document as seen by the reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_details: Vec<PaymentDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Order {
    pub fn new(id: impl Into<String>, status: OrderStatus) -> Self {
        Self {
            id: id.into(),
            status,
            payment_details: Vec::new(),
            updated_at: None,
        }
    }
}

// ============================================================================
// Normalized payment events
// ============================================================================

/// Gateway-neutral description of a payment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    pub order_id: Option<String>,
    pub gateway_payment_id: String,
    pub amount_minor: i64,
    pub error_reason: Option<String>,
}

/// Payment event after gateway-specific parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// Payment confirmed by the gateway
    Captured(PaymentAttempt),
    /// Payment attempt failed
    Failed(PaymentAttempt),
    /// Event type the integration does not act on
    Unrecognized { event_type: String },
}

impl PaymentEvent {
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::Captured(a) | Self::Failed(a) => a.order_id.as_deref(),
            Self::Unrecognized { .. } => None,
        }
    }
}

/// Planned change to an order
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Persist the updated order and return the result
    Apply { order: Order, result: HandlerResult },
    /// Leave the order untouched
    Skip(HandlerResult),
}

impl Transition {
    pub fn result(&self) -> &HandlerResult {
        match self {
            Self::Apply { result, .. } | Self::Skip(result) => result,
        }
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Pure decision function for payment mutations
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Decide what a payment event does to the current order.
    ///
    /// `current` is the order as read inside the caller's transaction. Returns
    /// [`WebhookError::OrderNotFound`] when an actionable event names an order
    /// that does not exist.
    pub fn plan(
        gateway: Gateway,
        event_id: &str,
        event: &PaymentEvent,
        current: Option<&Order>,
        now: Timestamp,
    ) -> Result<Transition, WebhookError> {
        let attempt = match event {
            PaymentEvent::Unrecognized { event_type } => {
                return Ok(Transition::Skip(HandlerResult::ignored(
                    None,
                    format!("unhandled event type '{event_type}'"),
                )));
            }
            PaymentEvent::Captured(a) | PaymentEvent::Failed(a) => a,
        };

        let Some(order_id) = attempt.order_id.as_deref() else {
            return Ok(Transition::Skip(HandlerResult::ignored(
                None,
                "no order reference",
            )));
        };

        let Some(current) = current else {
            return Err(WebhookError::OrderNotFound {
                order_id: order_id.to_string(),
                event_id: event_id.to_string(),
            });
        };

        if current.payment_details.iter().any(|d| d.event_id == event_id) {
            return Ok(Transition::Skip(HandlerResult {
                status: HandlerStatus::Ignored,
                order_id: Some(current.id.clone()),
                reason: Some("event already applied".to_string()),
                gateway_payment_id: Some(attempt.gateway_payment_id.clone()),
            }));
        }

        let mut order = current.clone();
        match event {
            PaymentEvent::Captured(attempt) => {
                if order.status != OrderStatus::AwaitingPayment {
                    return Ok(Transition::Skip(HandlerResult {
                        status: HandlerStatus::Ignored,
                        order_id: Some(order.id),
                        reason: Some("already processed".to_string()),
                        gateway_payment_id: Some(attempt.gateway_payment_id.clone()),
                    }));
                }

                order
                    .payment_details
                    .push(detail(gateway, event_id, attempt, PaymentStatus::Success, now));
                order.status = OrderStatus::Pending;
                order.updated_at = Some(now);

                let result = HandlerResult::success(&order.id, &attempt.gateway_payment_id);
                Ok(Transition::Apply { order, result })
            }
            PaymentEvent::Failed(attempt) => {
                order
                    .payment_details
                    .push(detail(gateway, event_id, attempt, PaymentStatus::Failed, now));
                order.updated_at = Some(now);

                let result = HandlerResult {
                    status: HandlerStatus::Recorded,
                    order_id: Some(order.id.clone()),
                    reason: attempt.error_reason.clone(),
                    gateway_payment_id: Some(attempt.gateway_payment_id.clone()),
                };
                Ok(Transition::Apply { order, result })
            }
            PaymentEvent::Unrecognized { .. } => Ok(Transition::Skip(HandlerResult::ignored(
                Some(order.id),
                "unhandled event type",
            ))),
        }
    }
}

fn detail(
    gateway: Gateway,
    event_id: &str,
    attempt: &PaymentAttempt,
    status: PaymentStatus,
    now: Timestamp,
) -> PaymentDetail {
    PaymentDetail {
        method: gateway,
        gateway_payment_id: attempt.gateway_payment_id.clone(),
        status,
        amount: attempt.amount_minor as f64 / 100.0,
        amount_minor: attempt.amount_minor,
        error_reason: match status {
            PaymentStatus::Success => None,
            PaymentStatus::Failed => attempt.error_reason.clone(),
        },
        event_id: event_id.to_string(),
        timestamp: now,
    }
}

// ============================================================================
// Order store contract
// ============================================================================

/// Mutation run against an order inside a store transaction.
///
/// Receives the current order (if any) and the store's clock reading.
pub type OrderMutation<'a> =
    dyn Fn(Option<&Order>, Timestamp) -> Result<Transition, WebhookError> + Send + Sync + 'a;

/// Single-document transactional access to orders
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Read an order
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, WebhookError>;

    /// Insert or replace an order
    async fn insert_order(&self, order: Order) -> Result<(), WebhookError>;

    /// Atomically read, plan and write one order.
    ///
    /// The mutation sees the order as it exists inside the transaction; a
    /// [`Transition::Apply`] is persisted before the lock is released.
    async fn update_order(
        &self,
        order_id: &str,
        mutation: &OrderMutation<'_>,
    ) -> Result<HandlerResult, WebhookError>;
}

#[cfg(test)]
#[path = "orders_tests.rs"]
mod tests;
