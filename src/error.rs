/// Unified error types for imagebin
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum AppError {
    /// Upload request carried no `file` part
    #[error("No file uploaded")]
    MissingFile,

    /// Malformed multipart body
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// No blob matches the requested name or id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend rejected or could not complete a write
    #[error("Storage write error: {0}")]
    StorageWrite(String),

    /// Backend rejected or could not complete a query
    #[error("Storage read error: {0}")]
    StorageRead(String),

    /// Failure while transferring chunk data after streaming began
    #[error("Stream error: {0}")]
    Stream(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration and input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error is the client's fault (4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::MissingFile
                | AppError::Multipart(_)
                | AppError::NotFound(_)
                | AppError::Validation(_)
        )
    }

    /// Attach a user-facing message to a server-side failure.
    ///
    /// Client errors pass through untouched.
    pub fn with_public_message(self, message: &'static str) -> HandlerError {
        HandlerError {
            inner: self,
            message,
        }
    }
}

/// JSON body for lookups that find nothing
#[derive(Debug, Serialize, Deserialize)]
pub struct NotFoundResponse {
    pub err: String,
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::MissingFile => {
                (StatusCode::BAD_REQUEST, "No file uploaded.").into_response()
            }
            AppError::Multipart(ref reason) => {
                tracing::warn!("Rejected malformed upload: {}", reason);
                (StatusCode::BAD_REQUEST, "Malformed upload").into_response()
            }
            AppError::Validation(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            AppError::NotFound(ref what) => {
                tracing::debug!("Not found: {}", what);
                (
                    StatusCode::NOT_FOUND,
                    Json(NotFoundResponse {
                        err: "No file found".to_string(),
                    }),
                )
                    .into_response()
            }
            other => {
                tracing::error!("{}", other);
                // Don't leak details
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Error returned by route handlers, carrying the 5xx message for that route
#[derive(Debug)]
pub struct HandlerError {
    inner: AppError,
    message: &'static str,
}

impl From<AppError> for HandlerError {
    fn from(inner: AppError) -> Self {
        Self {
            inner,
            message: "Internal server error",
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        if self.inner.is_client_error() {
            return self.inner.into_response();
        }

        tracing::error!("{}", self.inner);
        (StatusCode::INTERNAL_SERVER_ERROR, self.message).into_response()
    }
}

/// Result type alias for storage and server operations
pub type AppResult<T> = Result<T, AppError>;
