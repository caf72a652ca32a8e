//! Configuration types for the HTTP service
//!
//! Every field carries a serde default, so an empty configuration source
//! produces a runnable service. Secrets are only ever held as
//! [`SecretValue`]s and are redacted when the configuration is logged or
//! serialized.

use crate::errors::ConfigError;
use payhook_core::{
    Environment, Gateway, GatewaySignatureVerifier, MissingSecretPolicy, ProcessingMode,
    SecretValue, DEFAULT_RETENTION_DAYS,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Deployment profile; drives the default missing-secret policy
    pub environment: Environment,

    /// Gateway signature secrets
    pub signatures: SignatureConfig,

    /// Idempotency store and processing settings
    pub idempotency: IdempotencyConfig,

    /// How failures are reported back to gateways
    pub responses: ResponseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be non-zero".to_string(),
            });
        }

        if self.idempotency.retention_days == 0 {
            return Err(ConfigError::Invalid {
                message: "idempotency.retention_days must be at least 1".to_string(),
            });
        }

        if self.idempotency.sweep_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "idempotency.sweep_interval_seconds must be non-zero".to_string(),
            });
        }

        if let StorageConfig::Filesystem { path } = &self.idempotency.storage {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Missing {
                    key: "idempotency.storage.path".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Policy for gateways without a configured secret.
    ///
    /// An explicit `signatures.missing_secret_policy` wins; otherwise only
    /// the development environment lets unsigned webhooks through.
    pub fn effective_missing_secret_policy(&self) -> MissingSecretPolicy {
        self.signatures
            .missing_secret_policy
            .unwrap_or_else(|| MissingSecretPolicy::for_environment(self.environment))
    }

    /// Build the signature verifier from the configured secrets
    pub fn build_verifier(&self) -> GatewaySignatureVerifier {
        let mut verifier = GatewaySignatureVerifier::new(self.effective_missing_secret_policy());

        for gateway in Gateway::ALL {
            if let Some(secret) = self.signatures.secret_for(gateway) {
                verifier = verifier.with_secret(gateway, secret.clone());
            }
        }

        verifier
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Gateway secrets and the policy applied when one is absent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SignatureConfig {
    /// Razorpay webhook secret (HMAC key)
    pub razorpay_secret: Option<SecretValue>,

    /// PhonePe salt key
    pub phonepe_secret: Option<SecretValue>,

    /// Overrides the environment-derived policy when set
    pub missing_secret_policy: Option<MissingSecretPolicy>,
}

impl SignatureConfig {
    pub fn secret_for(&self, gateway: Gateway) -> Option<&SecretValue> {
        match gateway {
            Gateway::Razorpay => self.razorpay_secret.as_ref(),
            Gateway::PhonePe => self.phonepe_secret.as_ref(),
        }
    }
}

/// Idempotency settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// How long processed-webhook records are kept
    pub retention_days: u32,

    /// Requested processing mode; the service may fall back to two-step
    pub processing_mode: ProcessingMode,

    /// Interval between retention sweeps
    pub sweep_interval_seconds: u64,

    /// Backing store for processed-webhook records
    pub storage: StorageConfig,
}

impl IdempotencyConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            processing_mode: ProcessingMode::default(),
            sweep_interval_seconds: 3600,
            storage: StorageConfig::default(),
        }
    }
}

/// Idempotency store backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Process-local document store shared with orders
    #[default]
    Memory,

    /// One marker file per event under `path`
    Filesystem { path: PathBuf },
}

/// Response policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Answer permanently failing webhooks with `200` so the gateway stops
    /// redelivering them
    pub acknowledge_permanent_failures: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            acknowledge_permanent_failures: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level or `EnvFilter` directive
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
