use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Required credential or configuration value is missing or malformed.
    /// The request must fail fast; no degraded write path is allowed.
    Configuration(String),
    /// Pricing lookup for an unknown industry/lead-type combination.
    PackageNotFound(String),
    /// Malformed input (invalid email, non-HTTPS sheet URL, bad quantity).
    Validation(String),
    /// Resource not found error.
    NotFound(String),
    /// Unauthorized access error (webhook secret mismatch).
    Unauthorized(String),
    /// Blob store read/write/delete failure, including CAS conflicts that
    /// survived all retries. Never swallowed on the write path.
    Persistence(String),
    /// Email/WhatsApp provider failure. Best-effort: logged by callers,
    /// never rolls back a persisted order.
    NotificationDelivery(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Machine-readable error kind included in every error response body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "configuration_error",
            AppError::PackageNotFound(_) => "package_not_found",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Persistence(_) => "persistence_error",
            AppError::NotificationDelivery(_) => "notification_delivery_error",
            AppError::WithContext { source, .. } => source.kind(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::PackageNotFound(msg) => write!(f, "Package not found: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            AppError::NotificationDelivery(msg) => {
                write!(f, "Notification delivery error: {}", msg)
            }
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and a JSON
    /// body carrying both a machine-readable `kind` and a human message.
    /// 4xx for caller mistakes, 5xx for storage/config failures.
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Service is not configured for this operation".to_string(),
                )
            }
            AppError::PackageNotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::Persistence(msg) => {
                tracing::error!("Persistence error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Storage operation failed".to_string(),
                )
            }
            AppError::NotificationDelivery(msg) => {
                tracing::error!("Notification delivery error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Notification provider error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    ///
    /// Timeouts surface as retryable persistence failures, never as silent
    /// success.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Persistence(format!("Request timed out: {}", err))
        } else {
            AppError::Persistence(err.to_string())
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    #[allow(dead_code)]
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for serde_json::Error so parse failures on stored blobs carry
/// context about which record was involved.
impl<T> ResultExt<T> for Result<T, serde_json::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Persistence(e.to_string())),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Persistence(e.to_string())),
            context: f(),
        })
    }
}
