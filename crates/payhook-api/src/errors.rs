//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use payhook_core::{ErrorCategory, WebhookError};
use tracing::{error, warn};

/// Seconds a gateway should wait before redelivering after a transient failure
pub const RETRY_AFTER_SECONDS: u64 = 60;

/// Webhook handler errors with HTTP status code mapping
///
/// - `401 Unauthorized`: signature verification failed
/// - `404 Not Found`: unknown gateway, or unknown failed-webhook entry
/// - `400 Bad Request` / `422 Unprocessable Entity`: permanent payload
///   failures, when the deployment does not acknowledge them with `200`
/// - `500 Internal Server Error`: misconfiguration or unexpected failures
/// - `503 Service Unavailable`: transient store failures; the gateway's own
///   redelivery is the retry mechanism
///
/// Messages returned to clients never include secrets or payload content.
/// Detailed context is logged server-side.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Webhook pipeline failure; the variant of the underlying
    /// [`WebhookError`] picks the status code
    #[error("{0}")]
    ProcessingFailed(#[from] WebhookError),

    /// Unexpected internal server error
    ///
    /// Details are logged but a generic message is returned to the client.
    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl WebhookHandlerError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProcessingFailed(e) => match e {
                WebhookError::InvalidSignature { .. } => StatusCode::UNAUTHORIZED,
                WebhookError::UnknownGateway { .. } | WebhookError::FailedWebhookNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                WebhookError::OrderNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                WebhookError::MissingEventIdentity { .. } | WebhookError::MalformedPayload { .. } => {
                    StatusCode::BAD_REQUEST
                }
                WebhookError::Store(_) => match e.error_category() {
                    ErrorCategory::Transient => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (message, retry_after) = match &self {
            Self::ProcessingFailed(e) if e.is_transient() => {
                warn!(error = %e, "Transient failure; gateway should redeliver");
                (self.to_string(), Some(RETRY_AFTER_SECONDS))
            }
            Self::ProcessingFailed(WebhookError::Store(e)) => {
                error!(error = %e, "Store failure while handling webhook");
                (
                    "Internal server error occurred. Please try again later.".to_string(),
                    None,
                )
            }
            Self::ProcessingFailed(e) => {
                if e.error_category() == ErrorCategory::Security {
                    warn!(error = %e, "Rejected webhook");
                }
                (self.to_string(), None)
            }
            Self::InternalError { message } => {
                error!(error = %message, "Internal server error occurred");
                (
                    "Internal server error occurred. Please try again later.".to_string(),
                    None,
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
