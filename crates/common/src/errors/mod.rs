//! Error type shared by the PaperVault crates
//!
//! Every failure is an `AppError`. Each variant carries a stable
//! machine-readable `ErrorCode` and an HTTP status. Handlers return
//! `Result<T>` and axum renders the error through `IntoResponse`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Stable codes returned to clients in `error.code`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Rejected requests
    ValidationError,
    MissingField,
    InvalidFormat,
    PayloadTooLarge,

    // Metadata store
    MetadataError,
    MetadataUnavailable,

    // Object store
    StorageError,
    StorageUnavailable,

    // Service faults
    ConfigurationError,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// A query parameter failed its range check
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// An upload form field or the file part is absent
    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Payload too large: exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Query or insert rejected by the metadata database
    #[error("Metadata store error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Metadata store unavailable: {message}")]
    DatabaseConnection { message: String },

    /// Object store answered but refused the operation
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Object store could not be reached
    #[error("Storage unavailable: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::Database(_) => ErrorCode::MetadataError,
            AppError::DatabaseConnection { .. } => ErrorCode::MetadataUnavailable,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::HttpClient(_) => ErrorCode::StorageUnavailable,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Storage faults map to 502, other server-side faults to 500
    pub fn status_code(&self) -> StatusCode {
        match self.code() {
            ErrorCode::ValidationError | ErrorCode::MissingField | ErrorCode::InvalidFormat => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::StorageError | ErrorCode::StorageUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::MetadataError
            | ErrorCode::MetadataUnavailable
            | ErrorCode::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Form or query field the error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            AppError::Validation { field, .. } => field.as_deref(),
            AppError::MissingField { field } => Some(field),
            _ => None,
        }
    }
}

/// Body of every error response: `{"error": {...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            error: ErrorDetails {
                code: err.code(),
                message: err.to_string(),
                field: err.field().map(str::to_string),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from(&self);

        if self.is_server_error() {
            tracing::error!(
                error = %body.error.message,
                code = ?body.error.code,
                status = status.as_u16(),
                "Request failed"
            );
        } else {
            tracing::warn!(
                error = %body.error.message,
                code = ?body.error.code,
                field = ?body.error.field,
                status = status.as_u16(),
                "Request rejected"
            );
        }

        (status, Json(body)).into_response()
    }
}
