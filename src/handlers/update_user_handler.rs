//! Update User Handler
//!
//! Applies an allow-listed administrative update to an account.

use sqlx::SqlitePool;

use crate::auth::PasswordHasher;
use crate::domain::{
    Account, AccountChanges, AccountNumber, Balance, DomainError, FullName, Login,
    OperationContext, Password, Phone, Role, ValidationError,
};
use crate::error::AppError;
use crate::store::{AccountStore, SessionStore};

use super::UpdateUserCommand;

// =========================================================================
// UpdateUserHandler
// =========================================================================

/// Handler for administrative account updates
pub struct UpdateUserHandler {
    accounts: AccountStore,
    sessions: SessionStore,
    hasher: PasswordHasher,
}

impl UpdateUserHandler {
    pub fn new(pool: SqlitePool, hasher: PasswordHasher) -> Self {
        Self {
            accounts: AccountStore::new(pool.clone()),
            sessions: SessionStore::new(pool),
            hasher,
        }
    }

    /// Execute the update user command
    pub async fn execute(
        &self,
        command: UpdateUserCommand,
        context: &OperationContext,
    ) -> Result<Account, AppError> {
        let current = self
            .accounts
            .find_by_id(command.account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(command.account_id.to_string()))?;

        // Immutable fields are tolerated only when unchanged
        if let Some(role) = &command.role {
            let role: Role = role.parse()?;
            if role != current.role {
                return Err(ValidationError::Immutable { field: "role" }.into());
            }
        }
        if let Some(account_number) = &command.account_number {
            let requested = AccountNumber::optional(account_number.as_deref())?;
            if requested.as_ref().map(|n| n.as_str()) != current.account_number.as_deref() {
                return Err(ValidationError::Immutable {
                    field: "account_number",
                }
                .into());
            }
        }

        let is_self = context
            .caller
            .as_ref()
            .map(|caller| caller.account_id == current.id)
            .unwrap_or(false);
        if is_self && command.is_active == Some(false) {
            return Err(
                DomainError::Forbidden("managers cannot deactivate themselves".to_string()).into(),
            );
        }

        let mut changes = AccountChanges::new();
        if let Some(login) = &command.login {
            changes.set_login(Login::new(login)?);
        }
        if let Some(password) = &command.password {
            let password = Password::new(password)?;
            changes.set_password_hash(self.hasher.hash(&password).await?);
        }
        if let Some(full_name) = &command.full_name {
            changes.set_full_name(FullName::new(full_name)?);
        }
        if let Some(phone) = &command.phone {
            changes.set_phone(Phone::optional(phone.as_deref())?);
        }
        if let Some(balance) = command.balance {
            if !current.is_client() {
                return Err(ValidationError::Invalid(
                    "Managers cannot hold a balance".to_string(),
                )
                .into());
            }
            changes.set_balance(Balance::new(balance)?);
        }
        if let Some(is_active) = command.is_active {
            changes.set_active(is_active);
        }

        let updated = self.accounts.apply_changes(current.id, &changes).await?;

        if current.is_active && !updated.is_active {
            self.sessions.revoke_all_for(updated.id).await?;
        }

        tracing::info!(
            account_id = updated.id,
            updated_by = ?context.caller_id(),
            fields = ?changes.field_names(),
            "User updated"
        );

        Ok(updated)
    }
}
