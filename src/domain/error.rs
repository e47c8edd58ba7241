//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;

use super::amount::AmountError;
use super::validation::ValidationError;

/// Error taxonomy shared by every layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    InsufficientFunds,
    Internal,
}

impl ErrorKind {
    /// Only storage failures may succeed on retry; everything else is
    /// deterministic for the given input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Internal)
    }
}

/// Business rule violations and domain invariant failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Only clients can send or receive transfers")]
    NotAClient,

    #[error("Cannot transfer to the same account")]
    SelfTransfer,

    #[error("Login already exists: {0}")]
    DuplicateLogin(String),

    #[error("Account number already exists: {0}")]
    DuplicateAccountNumber(String),

    #[error("Operation not permitted: {0}")]
    Forbidden(String),
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_) | Self::Validation(_) => ErrorKind::Validation,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::AccountNotFound(_) | Self::RecipientNotFound(_) => ErrorKind::NotFound,
            Self::NotAClient | Self::Forbidden(_) => ErrorKind::Authorization,
            Self::SelfTransfer | Self::DuplicateLogin(_) | Self::DuplicateAccountNumber(_) => {
                ErrorKind::Conflict
            }
        }
    }
}
