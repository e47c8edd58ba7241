//! Account model
//!
//! Account state as held by the account store, the validated shape of a new
//! account, and the allow-listed set of administrative changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::amount::Balance;
use super::error::DomainError;
use super::validation::{AccountNumber, FullName, Login, Phone, ValidationError};

/// Account identity (SQLite rowid)
pub type AccountId = i64;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Manager => "manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "client" => Ok(Role::Client),
            "manager" => Ok(Role::Manager),
            _ => Err(ValidationError::InvalidFormat {
                field: "role",
                expected: "client or manager",
            }),
        }
    }
}

/// Account state
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub login: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub account_number: Option<String>,
    pub balance: Balance,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    /// Active clients are the only parties a transfer may touch
    pub fn can_transact(&self) -> bool {
        self.is_active && self.is_client()
    }

    /// Public representation (no credential material)
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            login: self.login.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            phone: self.phone.clone(),
            account_number: self.account_number.clone(),
            balance: self.is_client().then_some(self.balance),
            created_at: self.created_at,
            is_active: self.is_active,
        }
    }
}

/// Serializable account as returned to RPC callers
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub login: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub account_number: Option<String>,
    /// Managers hold no balance and report `null`
    pub balance: Option<Balance>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Validated input for account creation
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub login: Login,
    pub password_hash: String,
    pub full_name: FullName,
    pub role: Role,
    pub phone: Option<Phone>,
    /// Clients without an explicit number get one assigned by the store
    pub account_number: Option<AccountNumber>,
    pub balance: Balance,
}

impl NewAccount {
    pub fn new(
        login: Login,
        password_hash: String,
        full_name: FullName,
        role: Role,
    ) -> Self {
        Self {
            login,
            password_hash,
            full_name,
            role,
            phone: None,
            account_number: None,
            balance: Balance::zero(),
        }
    }

    pub fn with_phone(mut self, phone: Option<Phone>) -> Self {
        self.phone = phone;
        self
    }

    /// Attach client-only banking fields. Managers carry neither.
    pub fn with_banking(
        mut self,
        account_number: Option<AccountNumber>,
        balance: Balance,
    ) -> Result<Self, DomainError> {
        if self.role == Role::Manager
            && (account_number.is_some() || balance != Balance::zero())
        {
            return Err(ValidationError::Invalid(
                "Managers cannot hold an account number or balance".to_string(),
            )
            .into());
        }
        self.account_number = account_number;
        self.balance = balance;
        Ok(self)
    }
}

/// Allow-listed administrative changes, one typed setter per field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountChanges {
    pub(crate) login: Option<Login>,
    pub(crate) password_hash: Option<String>,
    pub(crate) full_name: Option<FullName>,
    pub(crate) phone: Option<Option<Phone>>,
    pub(crate) balance: Option<Balance>,
    pub(crate) is_active: Option<bool>,
}

impl AccountChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_login(&mut self, login: Login) -> &mut Self {
        self.login = Some(login);
        self
    }

    pub fn set_password_hash(&mut self, password_hash: String) -> &mut Self {
        self.password_hash = Some(password_hash);
        self
    }

    pub fn set_full_name(&mut self, full_name: FullName) -> &mut Self {
        self.full_name = Some(full_name);
        self
    }

    /// `None` clears the phone number
    pub fn set_phone(&mut self, phone: Option<Phone>) -> &mut Self {
        self.phone = Some(phone);
        self
    }

    /// Administrative balance correction
    pub fn set_balance(&mut self, balance: Balance) -> &mut Self {
        self.balance = Some(balance);
        self
    }

    pub fn set_active(&mut self, is_active: bool) -> &mut Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the fields carried by this change set (for logging)
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.login.is_some() {
            names.push("login");
        }
        if self.password_hash.is_some() {
            names.push("password");
        }
        if self.full_name.is_some() {
            names.push("full_name");
        }
        if self.phone.is_some() {
            names.push("phone");
        }
        if self.balance.is_some() {
            names.push("balance");
        }
        if self.is_active.is_some() {
            names.push("is_active");
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(role: Role) -> Account {
        Account {
            id: 1,
            login: "client1".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            full_name: "Client One".to_string(),
            role,
            phone: None,
            account_number: Some("ACC1001".to_string()),
            balance: Balance::new(dec!(10000)).unwrap(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("client".parse::<Role>().unwrap(), Role::Client);
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_view_hides_manager_balance_and_hash() {
        let view = serde_json::to_value(sample(Role::Manager).view()).unwrap();
        assert!(view["balance"].is_null());
        assert!(view.get("password_hash").is_none());

        let view = serde_json::to_value(sample(Role::Client).view()).unwrap();
        assert_eq!(view["balance"].as_f64(), Some(10000.0));
        assert_eq!(view["role"], "client");
    }

    #[test]
    fn test_can_transact() {
        let mut account = sample(Role::Client);
        assert!(account.can_transact());
        account.is_active = false;
        assert!(!account.can_transact());
        assert!(!sample(Role::Manager).can_transact());
    }

    #[test]
    fn test_manager_rejects_banking_fields() {
        let new = NewAccount::new(
            Login::new("boss").unwrap(),
            "hash".to_string(),
            FullName::new("The Boss").unwrap(),
            Role::Manager,
        );
        let balance = Balance::new(dec!(5)).unwrap();
        assert!(new.clone().with_banking(None, balance).is_err());
        assert!(new.with_banking(None, Balance::zero()).is_ok());
    }

    #[test]
    fn test_changes_field_names() {
        let mut changes = AccountChanges::new();
        assert!(changes.is_empty());
        changes
            .set_full_name(FullName::new("New Name").unwrap())
            .set_active(false);
        assert_eq!(changes.field_names(), vec!["full_name", "is_active"]);
    }
}
