//! Command definitions
//!
//! Commands carry the raw intent of a caller; handlers validate them.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{
    AccountId, AmountError, Balance, DomainError, TransactionRecord, ValidationError,
};

// =========================================================================
// Parameter helpers
// =========================================================================

/// Parse a monetary value given either as a JSON number or a string
pub fn decimal_param(value: &Value) -> Result<Decimal, AmountError> {
    let raw = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        other => return Err(AmountError::ParseError(other.to_string())),
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| AmountError::ParseError(raw))
}

fn string_field(field: &'static str, value: &Value) -> Result<String, ValidationError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(ValidationError::InvalidFormat {
            field,
            expected: "a string",
        })
}

fn nullable_string_field(
    field: &'static str,
    value: &Value,
) -> Result<Option<String>, ValidationError> {
    match value {
        Value::Null => Ok(None),
        other => string_field(field, other).map(Some),
    }
}

fn bool_field(field: &'static str, value: &Value) -> Result<bool, ValidationError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) if number.as_i64() == Some(0) => Ok(false),
        Value::Number(number) if number.as_i64() == Some(1) => Ok(true),
        _ => Err(ValidationError::InvalidFormat {
            field,
            expected: "a boolean",
        }),
    }
}

// =========================================================================
// TransferCommand
// =========================================================================

/// Command to move money from the sender to a recipient
#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub sender_id: AccountId,
    /// Account number or phone of the recipient
    pub recipient: String,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl TransferCommand {
    pub fn new(sender_id: AccountId, recipient: String, amount: Decimal) -> Self {
        Self {
            sender_id,
            recipient,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Result of a committed transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub transaction: TransactionRecord,
    pub new_balance: Balance,
}

// =========================================================================
// CreateUserCommand
// =========================================================================

/// Command to create a new account
#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub login: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
    pub phone: Option<String>,
    pub account_number: Option<String>,
    pub balance: Option<Decimal>,
}

impl CreateUserCommand {
    pub fn new(login: String, password: String, full_name: String, role: String) -> Self {
        Self {
            login,
            password,
            full_name,
            role,
            phone: None,
            account_number: None,
            balance: None,
        }
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }

    pub fn with_account_number(mut self, account_number: Option<String>) -> Self {
        self.account_number = account_number;
        self
    }

    pub fn with_balance(mut self, balance: Option<Decimal>) -> Self {
        self.balance = balance;
        self
    }
}

// =========================================================================
// UpdateUserCommand
// =========================================================================

/// Allow-listed administrative update. Every field is optional; `phone`
/// distinguishes "absent" from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateUserCommand {
    pub account_id: AccountId,
    pub login: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub balance: Option<Decimal>,
    pub is_active: Option<bool>,
    /// Immutable, accepted only when equal to the stored role
    pub role: Option<String>,
    /// Immutable, accepted only when equal to the stored account number
    pub account_number: Option<Option<String>>,
}

impl UpdateUserCommand {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            ..Self::default()
        }
    }

    /// Build from RPC params. Any key outside the allow-list is rejected.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, DomainError> {
        let id = params
            .get("id")
            .or_else(|| params.get("userId"))
            .or_else(|| params.get("user_id"))
            .and_then(Value::as_i64)
            .ok_or(ValidationError::InvalidFormat {
                field: "id",
                expected: "an integer account id",
            })?;

        let mut command = Self::new(id);
        for (key, value) in params {
            match key.as_str() {
                "id" | "userId" | "user_id" => {}
                "login" => command.login = Some(string_field("login", value)?),
                "password" => command.password = Some(string_field("password", value)?),
                "fullName" | "full_name" => {
                    command.full_name = Some(string_field("full_name", value)?)
                }
                "phone" => command.phone = Some(nullable_string_field("phone", value)?),
                "balance" => command.balance = Some(decimal_param(value)?),
                "isActive" | "is_active" => {
                    command.is_active = Some(bool_field("is_active", value)?)
                }
                "role" => command.role = Some(string_field("role", value)?),
                "accountNumber" | "account_number" => {
                    command.account_number =
                        Some(nullable_string_field("account_number", value)?)
                }
                other => return Err(ValidationError::UnknownField(other.to_string()).into()),
            }
        }

        Ok(command)
    }
}

// =========================================================================
// DeactivateUserCommand
// =========================================================================

/// Command to deactivate (soft delete) an account
#[derive(Debug, Clone, Copy)]
pub struct DeactivateUserCommand {
    pub account_id: AccountId,
}

impl DeactivateUserCommand {
    pub fn new(account_id: AccountId) -> Self {
        Self { account_id }
    }
}

/// Result of a deactivation
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeactivateUserResult {
    pub account_id: AccountId,
    /// False when the account was already inactive
    pub was_active: bool,
    pub sessions_revoked: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_decimal_param_accepts_numbers_and_strings() {
        assert_eq!(decimal_param(&json!(2500.5)).unwrap(), dec!(2500.5));
        assert_eq!(decimal_param(&json!("2500.50")).unwrap(), dec!(2500.50));
        assert_eq!(decimal_param(&json!(100)).unwrap(), dec!(100));
        assert_eq!(decimal_param(&json!(" 7 ")).unwrap(), dec!(7));
    }

    #[test]
    fn test_decimal_param_rejects_non_numeric() {
        assert!(decimal_param(&json!("abc")).is_err());
        assert!(decimal_param(&json!(null)).is_err());
        assert!(decimal_param(&json!(true)).is_err());
    }

    #[test]
    fn test_transfer_command_builder() {
        let command = TransferCommand::new(3, "ACC1002".to_string(), dec!(10))
            .with_description(Some("Lunch".to_string()));

        assert_eq!(command.sender_id, 3);
        assert_eq!(command.recipient, "ACC1002");
        assert_eq!(command.description.as_deref(), Some("Lunch"));
    }

    #[test]
    fn test_create_user_command_builder() {
        let command = CreateUserCommand::new(
            "client11".to_string(),
            "client123".to_string(),
            "Client Eleven".to_string(),
            "client".to_string(),
        )
        .with_phone(Some("+79000000011".to_string()))
        .with_balance(Some(dec!(50)));

        assert_eq!(command.phone.as_deref(), Some("+79000000011"));
        assert_eq!(command.balance, Some(dec!(50)));
        assert!(command.account_number.is_none());
    }

    #[test]
    fn test_update_command_accepts_both_casings() {
        let command = UpdateUserCommand::from_params(&params(json!({
            "id": 4,
            "fullName": "New Name",
            "is_active": false,
            "phone": null,
            "balance": "12.34"
        })))
        .unwrap();

        assert_eq!(command.account_id, 4);
        assert_eq!(command.full_name.as_deref(), Some("New Name"));
        assert_eq!(command.is_active, Some(false));
        assert_eq!(command.phone, Some(None));
        assert_eq!(command.balance, Some(dec!(12.34)));
        assert!(command.login.is_none());
    }

    #[test]
    fn test_update_command_rejects_unknown_fields() {
        let err = UpdateUserCommand::from_params(&params(json!({
            "id": 4,
            "password_hash": "x"
        })))
        .unwrap_err();

        assert_eq!(
            err,
            DomainError::Validation(ValidationError::UnknownField("password_hash".to_string()))
        );
    }

    #[test]
    fn test_update_command_requires_id() {
        assert!(UpdateUserCommand::from_params(&params(json!({ "login": "abc" }))).is_err());
    }
}
