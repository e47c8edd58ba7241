//! Domain module
//!
//! Core domain types and business rules.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod transaction;
pub mod validation;

pub use account::{Account, AccountChanges, AccountId, AccountView, NewAccount, Role};
pub use amount::{Amount, AmountError, Balance};
pub use context::{Caller, OperationContext};
pub use error::{DomainError, ErrorKind};
pub use transaction::{Direction, HistoryEntry, TransactionId, TransactionRecord};
pub use validation::{AccountNumber, FullName, Login, Password, Phone, ValidationError};
