//! Error types for Gatewarden services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    NameInUse,
    RuleInUse,
    PortInUse,
    PortOutOfRange,
    WeightMismatch,
    MalformedDirective,

    // Resource errors (4xxx)
    NotFound,
    ServiceNotFound,
    RenterNotFound,

    // Consistency errors (5xxx)
    ConsistencyFault,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External collaborator errors (8xxx)
    FlowCounterError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::NameInUse => 1002,
            ErrorCode::RuleInUse => 1003,
            ErrorCode::PortInUse => 1004,
            ErrorCode::PortOutOfRange => 1005,
            ErrorCode::WeightMismatch => 1006,
            ErrorCode::MalformedDirective => 1007,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::ServiceNotFound => 4002,
            ErrorCode::RenterNotFound => 4003,

            // Consistency (5xxx)
            ErrorCode::ConsistencyFault => 5001,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            // External (8xxx)
            ErrorCode::FlowCounterError => 8001,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors: the caller can fix these by correcting input.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Service name already in use: {name}")]
    NameInUse { name: String },

    #[error("HTTP rule already in use: {rule}")]
    RuleInUse { rule: String },

    #[error("Port already claimed by another service: {port}")]
    PortInUse { port: i32 },

    #[error("Port {port} outside administrative range {start}-{end}")]
    PortOutOfRange { port: i32, start: u16, end: u16 },

    #[error("IP list has {ips} entries but weight list has {weights}")]
    WeightMismatch { ips: usize, weights: usize },

    #[error("Malformed directive `{entry}`: {reason}")]
    MalformedDirective { entry: String, reason: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Service not found: {id}")]
    ServiceNotFound { id: String },

    #[error("Renter not found: {id}")]
    RenterNotFound { id: String },

    // Consistency errors: an invariant broke, treat as a bug report.
    #[error("Aggregate inconsistency: {message}")]
    Consistency { message: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External collaborator errors
    #[error("Flow counter error: {message}")]
    FlowCounter { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::NameInUse { .. } => ErrorCode::NameInUse,
            AppError::RuleInUse { .. } => ErrorCode::RuleInUse,
            AppError::PortInUse { .. } => ErrorCode::PortInUse,
            AppError::PortOutOfRange { .. } => ErrorCode::PortOutOfRange,
            AppError::WeightMismatch { .. } => ErrorCode::WeightMismatch,
            AppError::MalformedDirective { .. } => ErrorCode::MalformedDirective,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::ServiceNotFound { .. } => ErrorCode::ServiceNotFound,
            AppError::RenterNotFound { .. } => ErrorCode::RenterNotFound,
            AppError::Consistency { .. } => ErrorCode::ConsistencyFault,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::FlowCounter { .. } => ErrorCode::FlowCounterError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::PortOutOfRange { .. }
            | AppError::WeightMismatch { .. }
            | AppError::MalformedDirective { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::ServiceNotFound { .. }
            | AppError::RenterNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::NameInUse { .. }
            | AppError::RuleInUse { .. }
            | AppError::PortInUse { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            AppError::Consistency { .. }
            | AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::FlowCounter { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Shorthand for a free-form validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
                request_id: None, // Should be filled by middleware
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::ServiceNotFound { id: "42".into() };
        assert_eq!(err.code(), ErrorCode::ServiceNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_collision_errors_conflict() {
        let err = AppError::PortInUse { port: 8050 };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.is_client_error());

        let err = AppError::NameInUse {
            name: "svc-checkout-01".into(),
        };
        assert_eq!(err.code(), ErrorCode::NameInUse);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::WeightMismatch { ips: 3, weights: 2 };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_consistency_is_server_error() {
        let err = AppError::Consistency {
            message: "http service 7 has no http rule".into(),
        };
        assert_eq!(err.code(), ErrorCode::ConsistencyFault);
        assert!(err.is_server_error());
    }
}
