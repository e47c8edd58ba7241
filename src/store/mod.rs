//! Persistence layer
//!
//! Repositories over the SQLite pool. Methods that must share a transaction
//! with other writes take a `&mut SqliteConnection` instead of using the pool.

pub mod accounts;
pub mod sessions;
pub mod transactions;

pub use accounts::{AccountStatistics, AccountStore};
pub use sessions::SessionStore;
pub use transactions::TransactionLog;

use crate::db::unique_violation;
use crate::domain::DomainError;
use crate::error::AppError;

/// Translate a UNIQUE constraint failure on `users` into the matching
/// domain conflict; any other error passes through unchanged.
pub(crate) fn map_unique_violation(
    err: sqlx::Error,
    login: &str,
    account_number: Option<&str>,
) -> AppError {
    match unique_violation(&err).as_deref() {
        Some("users.login") => DomainError::DuplicateLogin(login.to_string()).into(),
        Some("users.account_number") => {
            DomainError::DuplicateAccountNumber(account_number.unwrap_or_default().to_string())
                .into()
        }
        _ => err.into(),
    }
}
