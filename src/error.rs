//! Error handling module
//!
//! Centralized error type and its conversion into JSON-RPC errors.

use axum::http::StatusCode;

use crate::api::rpc::{codes, RpcError};
use crate::domain::{AmountError, DomainError, ErrorKind, ValidationError};

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Envelope errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    // Authentication / authorization
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("Only clients can perform this operation")]
    ClientOnly,

    #[error("Only managers can perform this operation")]
    ManagerOnly,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Domain(err.into())
    }
}

impl From<AmountError> for AppError {
    fn from(err: AmountError) -> Self {
        AppError::Domain(err.into())
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidRequest(_)
            | AppError::MethodNotFound(_)
            | AppError::InvalidParams(_) => ErrorKind::Validation,
            AppError::Unauthenticated | AppError::InvalidCredentials => ErrorKind::Authentication,
            AppError::ClientOnly | AppError::ManagerOnly => ErrorKind::Authorization,
            AppError::Domain(err) => err.kind(),
            AppError::Database(_) | AppError::Internal(_) | AppError::Config(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable JSON-RPC error code
    pub fn rpc_code(&self) -> i32 {
        match self {
            AppError::InvalidRequest(_) => codes::INVALID_REQUEST,
            AppError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            AppError::ClientOnly => codes::CLIENT_ONLY,
            AppError::ManagerOnly => codes::MANAGER_ONLY,
            _ if self.kind() == ErrorKind::Internal => codes::INTERNAL_ERROR,
            _ => codes::DOMAIN_ERROR,
        }
    }

    /// HTTP status that accompanies the RPC error body
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::ClientOnly | AppError::ManagerOnly => StatusCode::FORBIDDEN,
            _ => StatusCode::OK,
        }
    }

    /// Convert into the structured error sent to the caller. Internal
    /// failures are logged here and reported without details.
    pub fn to_rpc_error(&self) -> RpcError {
        let message = match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = ?self, "Internal error while handling RPC call");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        RpcError {
            code: self.rpc_code(),
            message,
        }
    }
}
