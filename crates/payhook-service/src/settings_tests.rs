use super::*;
use payhook_api::StorageConfig;
use payhook_core::{Environment, MissingSecretPolicy, ProcessingMode};
use std::io::Write;

fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_no_sources_yields_defaults() {
    let config = load_from(None).unwrap();

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.idempotency.retention_days, 14);
}

#[test]
fn test_explicit_yaml_file_is_applied() {
    let file = yaml_file(
        r#"
environment: development
server:
  port: 9191
signatures:
  razorpay_secret: rzp_from_file
  missing_secret_policy: reject
idempotency:
  processing_mode: two_step
  retention_days: 30
  storage:
    type: filesystem
    path: /var/lib/payhook
responses:
  acknowledge_permanent_failures: false
"#,
    );

    let config = load_from(Some(file.path())).unwrap();

    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.server.port, 9191);
    assert_eq!(config.server.timeout_seconds, 30);
    assert_eq!(
        config
            .signatures
            .razorpay_secret
            .as_ref()
            .map(|s| s.expose_secret()),
        Some("rzp_from_file")
    );
    assert_eq!(
        config.effective_missing_secret_policy(),
        MissingSecretPolicy::Reject
    );
    assert_eq!(config.idempotency.processing_mode, ProcessingMode::TwoStep);
    assert_eq!(config.idempotency.retention_days, 30);
    assert!(matches!(
        config.idempotency.storage,
        StorageConfig::Filesystem { .. }
    ));
    assert!(!config.responses.acknowledge_permanent_failures);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");

    assert!(load_from(Some(&missing)).is_err());
}

#[test]
fn test_mistyped_value_is_an_error() {
    let file = yaml_file("server:\n  port: not-a-number\n");

    assert!(load_from(Some(file.path())).is_err());
}
