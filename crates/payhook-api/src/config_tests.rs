//! Tests for [`ServiceConfig`] defaults, validation and verifier wiring.

use super::*;
use payhook_core::signature::sign_razorpay;
use payhook_core::SignatureVerifier;

#[test]
fn test_empty_document_yields_defaults() {
    let config: ServiceConfig = serde_json::from_str("{}").unwrap();

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.idempotency.retention_days, 14);
    assert_eq!(config.idempotency.processing_mode, ProcessingMode::Atomic);
    assert_eq!(config.idempotency.sweep_interval(), Duration::from_secs(3600));
    assert_eq!(config.idempotency.storage, StorageConfig::Memory);
    assert!(config.responses.acknowledge_permanent_failures);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_sections_keep_remaining_defaults() {
    let config: ServiceConfig = serde_json::from_value(serde_json::json!({
        "server": { "port": 9090 },
        "idempotency": {
            "processing_mode": "two_step",
            "storage": { "type": "filesystem", "path": "/var/lib/payhook" }
        }
    }))
    .unwrap();

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.timeout_seconds, 30);
    assert_eq!(config.idempotency.processing_mode, ProcessingMode::TwoStep);
    assert_eq!(
        config.idempotency.storage,
        StorageConfig::Filesystem {
            path: PathBuf::from("/var/lib/payhook")
        }
    );
    assert_eq!(config.idempotency.retention_days, 14);
}

#[test]
fn test_validate_rejects_zero_values() {
    let mut config = ServiceConfig::default();
    config.server.port = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

    let mut config = ServiceConfig::default();
    config.idempotency.retention_days = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

    let mut config = ServiceConfig::default();
    config.idempotency.sweep_interval_seconds = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_validate_requires_filesystem_path() {
    let mut config = ServiceConfig::default();
    config.idempotency.storage = StorageConfig::Filesystem {
        path: PathBuf::new(),
    };

    assert_eq!(
        config.validate(),
        Err(ConfigError::Missing {
            key: "idempotency.storage.path".to_string()
        })
    );
}

#[test]
fn test_missing_secret_policy_follows_environment() {
    let mut config = ServiceConfig::default();
    assert_eq!(
        config.effective_missing_secret_policy(),
        MissingSecretPolicy::Reject
    );

    config.environment = Environment::Staging;
    assert_eq!(
        config.effective_missing_secret_policy(),
        MissingSecretPolicy::Reject
    );

    config.environment = Environment::Development;
    assert_eq!(
        config.effective_missing_secret_policy(),
        MissingSecretPolicy::Allow
    );
}

#[test]
fn test_explicit_policy_overrides_environment() {
    let mut config = ServiceConfig::default();
    config.environment = Environment::Development;
    config.signatures.missing_secret_policy = Some(MissingSecretPolicy::Reject);

    assert_eq!(
        config.effective_missing_secret_policy(),
        MissingSecretPolicy::Reject
    );
}

#[test]
fn test_build_verifier_installs_configured_secrets() {
    let config: ServiceConfig = serde_json::from_value(serde_json::json!({
        "signatures": { "razorpay_secret": "rzp_secret", "phonepe_secret": "  " }
    }))
    .unwrap();

    let verifier = config.build_verifier();
    assert!(verifier.has_secret(Gateway::Razorpay));
    // Blank secrets count as missing.
    assert!(!verifier.has_secret(Gateway::PhonePe));

    let body = br#"{"event":"payment.captured"}"#;
    let signature = sign_razorpay("rzp_secret", body);
    assert!(verifier.verify(Gateway::Razorpay, body, Some(&signature)));

    // Production default rejects the gateway without a secret.
    assert!(!verifier.verify(Gateway::PhonePe, body, Some("anything")));
}

#[test]
fn test_serialized_config_redacts_secrets() {
    let mut config = ServiceConfig::default();
    config.signatures.razorpay_secret = Some(SecretValue::new("rzp_secret"));

    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains("rzp_secret"));
    assert!(json.contains("[REDACTED]"));
}
