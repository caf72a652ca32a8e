//! Tests for webhook envelope and error types.

use super::*;
use crate::gateways::HandlerStatus;

#[test]
fn test_envelope_keeps_raw_body_bytes() {
    let body = b"{\"b\": 1,   \"a\": 2}".to_vec();
    let envelope = WebhookEnvelope::new(Gateway::Razorpay, body.clone(), Some("sig".to_string()))
        .with_event_id_hint(Some("evt_hdr".to_string()));

    assert_eq!(envelope.body.as_ref(), body.as_slice());
    assert_eq!(envelope.signature.as_deref(), Some("sig"));
    assert_eq!(envelope.event_id_hint.as_deref(), Some("evt_hdr"));
}

#[test]
fn test_outcome_status_strings() {
    let duplicate = WebhookOutcome::Duplicate {
        event_id: "evt_x".to_string(),
    };
    assert_eq!(duplicate.status_str(), "duplicate");
    assert_eq!(duplicate.event_id(), "evt_x");

    let processed = WebhookOutcome::Processed {
        event_id: "evt_y".to_string(),
        result: HandlerResult::success("ord_1", "pay_1"),
    };
    assert_eq!(processed.status_str(), "success");

    let recorded = WebhookOutcome::Processed {
        event_id: "evt_z".to_string(),
        result: HandlerResult {
            status: HandlerStatus::Recorded,
            order_id: None,
            reason: None,
            gateway_payment_id: None,
        },
    };
    assert_eq!(recorded.status_str(), "recorded");
}

#[test]
fn test_signature_errors_are_security_and_not_acknowledged() {
    let err = WebhookError::InvalidSignature {
        gateway: Gateway::PhonePe,
    };
    assert_eq!(err.error_category(), ErrorCategory::Security);
    assert!(!err.is_transient());
    assert!(!err.is_acknowledgeable());
}

#[test]
fn test_permanent_payload_errors_are_acknowledgeable() {
    let errors = [
        WebhookError::MissingEventIdentity {
            gateway: Gateway::Razorpay,
        },
        WebhookError::OrderNotFound {
            order_id: "ord_1".to_string(),
            event_id: "evt_1".to_string(),
        },
        WebhookError::MalformedPayload {
            message: "bad".to_string(),
        },
    ];

    for err in errors {
        assert!(err.is_acknowledgeable(), "{err} should be acknowledged");
        assert_eq!(err.error_category(), ErrorCategory::Permanent);
        assert!(!err.is_transient());
    }
}

#[test]
fn test_unknown_gateway_is_permanent_but_not_acknowledged() {
    let err = WebhookError::UnknownGateway {
        gateway: "stripe".to_string(),
    };
    assert_eq!(err.error_category(), ErrorCategory::Permanent);
    assert!(!err.is_acknowledgeable());
}

#[test]
fn test_store_errors_follow_store_transience() {
    let unavailable = WebhookError::from(StoreError::Unavailable {
        message: "down".to_string(),
    });
    assert!(unavailable.is_transient());
    assert_eq!(unavailable.error_category(), ErrorCategory::Transient);

    let unsupported = WebhookError::from(StoreError::Unsupported {
        operation: "process_idempotent".to_string(),
    });
    assert!(!unsupported.is_transient());
    assert_eq!(unsupported.error_category(), ErrorCategory::Configuration);
}

#[test]
fn test_processing_mode_serde() {
    let mode: ProcessingMode = serde_json::from_str("\"two_step\"").unwrap();
    assert_eq!(mode, ProcessingMode::TwoStep);
    assert_eq!(ProcessingMode::default(), ProcessingMode::Atomic);
    assert_eq!(ProcessingMode::TwoStep.to_string(), "two_step");
}
