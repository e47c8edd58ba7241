//! User Creation Handler
//!
//! Validates and persists a new account on behalf of a manager.

use sqlx::SqlitePool;

use crate::auth::PasswordHasher;
use crate::domain::{
    Account, AccountNumber, Balance, FullName, Login, NewAccount, OperationContext, Password,
    Phone, Role,
};
use crate::error::AppError;
use crate::store::AccountStore;

use super::CreateUserCommand;

// =========================================================================
// CreateUserHandler
// =========================================================================

/// Handler for account creation
pub struct CreateUserHandler {
    accounts: AccountStore,
    hasher: PasswordHasher,
}

impl CreateUserHandler {
    pub fn new(pool: SqlitePool, hasher: PasswordHasher) -> Self {
        Self {
            accounts: AccountStore::new(pool),
            hasher,
        }
    }

    /// Execute the create user command
    pub async fn execute(
        &self,
        command: CreateUserCommand,
        context: &OperationContext,
    ) -> Result<Account, AppError> {
        let login = Login::new(&command.login)?;
        let password = Password::new(&command.password)?;
        let full_name = FullName::new(&command.full_name)?;
        let role: Role = command.role.parse()?;
        let phone = Phone::optional(command.phone.as_deref())?;
        let account_number = AccountNumber::optional(command.account_number.as_deref())?;
        let balance = command
            .balance
            .map(Balance::new)
            .transpose()?
            .unwrap_or_default();

        // Validate everything before paying for the hash
        let draft = NewAccount::new(login, String::new(), full_name, role)
            .with_phone(phone)
            .with_banking(account_number, balance)?;

        let new_account = NewAccount {
            password_hash: self.hasher.hash(&password).await?,
            ..draft
        };

        let account = self.accounts.create(new_account).await?;

        tracing::info!(
            account_id = account.id,
            created_by = ?context.caller_id(),
            "User created"
        );

        Ok(account)
    }
}
