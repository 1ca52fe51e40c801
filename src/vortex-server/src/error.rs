//! Error types for the cart link server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use vortex_cart::{CartLinkError, LineRejection, StoreError};

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request was well formed but the cart refused it.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// Payload too large.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Service unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Rejected(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Rejected(_) => "rejected",
            Self::Internal(_) => "internal_error",
            Self::Timeout => "timeout",
            Self::PayloadTooLarge => "payload_too_large",
            Self::BadRequest(_) => "bad_request",
            Self::Unavailable(_) => "service_unavailable",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for the server.
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<LineRejection> for AppError {
    fn from(error: LineRejection) -> Self {
        Self::Rejected(error.to_string())
    }
}

impl From<CartLinkError> for AppError {
    fn from(error: CartLinkError) -> Self {
        match error {
            CartLinkError::InvalidRequest | CartLinkError::EmptyCart => {
                Self::BadRequest(error.to_string())
            }
            CartLinkError::DependencyMissing => Self::Unavailable(error.to_string()),
            CartLinkError::TokenNotFound => Self::NotFound(error.to_string()),
            CartLinkError::Store(e) => e.into(),
        }
    }
}
