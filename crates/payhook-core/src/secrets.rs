//! Secret values for gateway credentials.
//!
//! Secrets are wiped from memory on drop and never appear in `Debug` or
//! serialized output.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

/// Secure container for a gateway secret (HMAC key or salt)
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue {
    inner: Zeroizing<String>,
}

impl SecretValue {
    /// Create secret value from string
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: Zeroizing::new(value.into()),
        }
    }

    /// Get secret as string (only for immediate use)
    pub fn expose_secret(&self) -> &str {
        self.inner.as_str()
    }

    /// Get secret as bytes
    pub fn expose_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Check if secret is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }

    /// Get secret length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
