//! Gateway signature verification.
//!
//! Each gateway signs its callbacks with a shared secret:
//!
//! | Gateway  | Scheme                                         | Header               |
//! |----------|------------------------------------------------|----------------------|
//! | Razorpay | hex(HMAC-SHA256(secret, raw body))             | `X-Razorpay-Signature` |
//! | PhonePe  | hex(SHA-256(raw body ‖ secret)) [`###<index>`] | `X-VERIFY`           |
//!
//! Verification must run over the exact bytes received on the wire. A body
//! that was parsed and re-serialized will generally fail the HMAC check.
//!
//! When no secret is configured for a gateway the outcome is governed by
//! [`MissingSecretPolicy`]; only development deployments should allow
//! unsigned traffic through.

use crate::{secrets::SecretValue, Environment, Gateway};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// What to do when a webhook arrives for a gateway with no configured secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSecretPolicy {
    /// Accept the webhook unverified and log a warning
    Allow,
    /// Reject the webhook (fail closed)
    Reject,
}

impl MissingSecretPolicy {
    /// Default policy for a deployment environment.
    ///
    /// Only development allows unsigned traffic.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self::Allow,
            Environment::Staging | Environment::Production => Self::Reject,
        }
    }
}

/// Reasons a signature check can fail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("No secret configured for {gateway}")]
    MissingSecret { gateway: Gateway },

    #[error("Signature header missing")]
    MissingSignature,

    #[error("Signature is not valid hex")]
    MalformedSignature,

    #[error("Secret cannot be used as an HMAC key")]
    InvalidKey,

    #[error("Signature does not match payload")]
    Mismatch,
}

/// Successful outcome of a signature check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature matched the configured secret
    Verified,
    /// No secret configured and the policy allows pass-through
    Unverified,
}

/// Interface for authenticating inbound gateway callbacks.
///
/// Verification is pure and synchronous; it never touches a store.
pub trait SignatureVerifier: Send + Sync {
    /// Returns `true` when the payload may be processed.
    fn verify(&self, gateway: Gateway, payload: &[u8], signature: Option<&str>) -> bool;
}

/// Signature verifier holding one secret per gateway
#[derive(Debug, Clone)]
pub struct GatewaySignatureVerifier {
    secrets: HashMap<Gateway, SecretValue>,
    missing_secret_policy: MissingSecretPolicy,
}

impl GatewaySignatureVerifier {
    /// Create a verifier with no secrets configured
    pub fn new(missing_secret_policy: MissingSecretPolicy) -> Self {
        Self {
            secrets: HashMap::new(),
            missing_secret_policy,
        }
    }

    /// Configure the secret for a gateway. Blank secrets are treated as absent.
    pub fn with_secret(mut self, gateway: Gateway, secret: SecretValue) -> Self {
        if secret.is_blank() {
            warn!(gateway = %gateway, "Ignoring blank webhook secret");
        } else {
            self.secrets.insert(gateway, secret);
        }
        self
    }

    /// Whether a secret is configured for the gateway
    pub fn has_secret(&self, gateway: Gateway) -> bool {
        self.secrets.contains_key(&gateway)
    }

    pub fn missing_secret_policy(&self) -> MissingSecretPolicy {
        self.missing_secret_policy
    }

    /// Run the gateway-specific check and report why it failed.
    pub fn check(
        &self,
        gateway: Gateway,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<SignatureCheck, SignatureError> {
        let Some(secret) = self.secrets.get(&gateway) else {
            return match self.missing_secret_policy {
                MissingSecretPolicy::Allow => Ok(SignatureCheck::Unverified),
                MissingSecretPolicy::Reject => Err(SignatureError::MissingSecret { gateway }),
            };
        };

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SignatureError::MissingSignature)?;

        match gateway {
            Gateway::Razorpay => verify_razorpay(secret, payload, signature)?,
            Gateway::PhonePe => verify_phonepe(secret, payload, signature)?,
        }

        Ok(SignatureCheck::Verified)
    }
}

impl SignatureVerifier for GatewaySignatureVerifier {
    fn verify(&self, gateway: Gateway, payload: &[u8], signature: Option<&str>) -> bool {
        match self.check(gateway, payload, signature) {
            Ok(SignatureCheck::Verified) => {
                debug!(gateway = %gateway, "Webhook signature verified");
                true
            }
            Ok(SignatureCheck::Unverified) => {
                warn!(
                    gateway = %gateway,
                    "No webhook secret configured; accepting unverified payload"
                );
                true
            }
            Err(e) => {
                warn!(gateway = %gateway, error = %e, "Webhook signature rejected");
                false
            }
        }
    }
}

/// Razorpay: hex HMAC-SHA256 of the raw body keyed by the webhook secret.
fn verify_razorpay(
    secret: &SecretValue,
    payload: &[u8],
    signature: &str,
) -> Result<(), SignatureError> {
    let expected = hex::decode(signature).map_err(|_| SignatureError::MalformedSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.expose_bytes())
        .map_err(|_| SignatureError::InvalidKey)?;
    mac.update(payload);

    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// PhonePe: hex SHA-256 of `payload ‖ secret`, optionally suffixed with `###<salt index>`.
fn verify_phonepe(
    secret: &SecretValue,
    payload: &[u8],
    signature: &str,
) -> Result<(), SignatureError> {
    let digest_hex = signature
        .split_once("###")
        .map_or(signature, |(digest, _salt_index)| digest);
    let expected = hex::decode(digest_hex).map_err(|_| SignatureError::MalformedSignature)?;

    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.update(secret.expose_bytes());
    let computed = hasher.finalize();

    if computed.as_slice().ct_eq(&expected).into() {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Compute a Razorpay-style signature (hex HMAC-SHA256).
///
/// Exposed for fixtures and for operators replaying captured payloads.
pub fn sign_razorpay(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Compute a PhonePe-style checksum (hex SHA-256 of `payload ‖ secret`).
pub fn sign_phonepe(secret: &str, payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
