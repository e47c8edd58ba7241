//! Field validation
//!
//! Validated newtypes for user-supplied account fields. Fields are private
//! so that every value in the system went through `new()`.

use std::fmt;

/// Validation errors for account fields
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid length for {field}: expected {min}-{max} characters, got {actual}")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Invalid format for {field} (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("{field} cannot be changed")]
    Immutable { field: &'static str },

    #[error("{0}")]
    Invalid(String),
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual < min || actual > max {
        return Err(ValidationError::InvalidLength {
            field,
            min,
            max,
            actual,
        });
    }
    Ok(())
}

// ============================================================================
// Login
// ============================================================================

/// Validated login: 3-50 characters of `[A-Za-z0-9_.-]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Login(String);

impl Login {
    pub fn new(login: &str) -> Result<Self, ValidationError> {
        let login = login.trim();
        check_length("login", login, 3, 50)?;

        let valid = login
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !valid {
            return Err(ValidationError::InvalidFormat {
                field: "login",
                expected: "latin letters, digits, '.', '-' and '_'",
            });
        }

        Ok(Self(login.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Password
// ============================================================================

const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// Validated plaintext password. Never logged; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(password: &str) -> Result<Self, ValidationError> {
        check_length("password", password, 6, 100)?;

        let valid = password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c));
        if !valid {
            return Err(ValidationError::InvalidFormat {
                field: "password",
                expected: "latin letters, digits and punctuation",
            });
        }

        Ok(Self(password.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

// ============================================================================
// FullName
// ============================================================================

/// Validated display name (2-100 characters after trimming)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullName(String);

impl FullName {
    pub fn new(full_name: &str) -> Result<Self, ValidationError> {
        let full_name = full_name.trim();
        check_length("full name", full_name, 2, 100)?;
        Ok(Self(full_name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

// ============================================================================
// Phone
// ============================================================================

/// Validated phone number: optional leading '+', then 10-15 digits not
/// starting with zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phone(String);

impl Phone {
    pub fn new(phone: &str) -> Result<Self, ValidationError> {
        let phone = phone.trim();
        let digits = phone.strip_prefix('+').unwrap_or(phone);

        let valid = (10..=15).contains(&digits.len())
            && digits.chars().all(|c| c.is_ascii_digit())
            && !digits.starts_with('0');
        if !valid {
            return Err(ValidationError::InvalidFormat {
                field: "phone",
                expected: "+ followed by 10-15 digits",
            });
        }

        Ok(Self(phone.to_string()))
    }

    /// Treat an empty string as "no phone"
    pub fn optional(phone: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match phone.map(str::trim) {
            None | Some("") => Ok(None),
            Some(phone) => Self::new(phone).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

// ============================================================================
// AccountNumber
// ============================================================================

/// Validated account number: `ACC` followed by 4-10 digits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn new(account_number: &str) -> Result<Self, ValidationError> {
        let account_number = account_number.trim();
        let valid = account_number
            .strip_prefix("ACC")
            .map(|digits| {
                (4..=10).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
            })
            .unwrap_or(false);

        if !valid {
            return Err(ValidationError::InvalidFormat {
                field: "account number",
                expected: "ACC followed by 4-10 digits",
            });
        }

        Ok(Self(account_number.to_string()))
    }

    /// Treat an empty string as "not supplied"
    pub fn optional(account_number: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match account_number.map(str::trim) {
            None | Some("") => Ok(None),
            Some(account_number) => Self::new(account_number).map(Some),
        }
    }

    /// Build the account number for a numeric suffix (zero-padded to 4 digits)
    pub fn from_sequence(sequence: u64) -> Result<Self, ValidationError> {
        Self::new(&format!("ACC{:04}", sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional free-text transfer description (max 200 characters)
pub fn description(description: Option<&str>) -> Result<Option<String>, ValidationError> {
    match description.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => {
            check_length("description", text, 1, 200)?;
            Ok(Some(text.to_string()))
        }
    }
}
