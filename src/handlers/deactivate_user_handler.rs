//! Deactivate User Handler
//!
//! Soft delete. Transaction history keeps referring to the account, so rows
//! are never removed; the account just stops authenticating and transacting.

use sqlx::SqlitePool;

use crate::domain::{DomainError, OperationContext};
use crate::error::AppError;
use crate::store::{AccountStore, SessionStore};

use super::{DeactivateUserCommand, DeactivateUserResult};

// =========================================================================
// DeactivateUserHandler
// =========================================================================

/// Handler for account deactivation
pub struct DeactivateUserHandler {
    accounts: AccountStore,
    sessions: SessionStore,
}

impl DeactivateUserHandler {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            accounts: AccountStore::new(pool.clone()),
            sessions: SessionStore::new(pool),
        }
    }

    /// Execute the deactivate user command. Managers may deactivate anyone
    /// but themselves; clients only themselves.
    pub async fn execute(
        &self,
        command: DeactivateUserCommand,
        context: &OperationContext,
    ) -> Result<DeactivateUserResult, AppError> {
        let caller = context.caller.as_ref().ok_or(AppError::Unauthenticated)?;
        let is_self = caller.account_id == command.account_id;

        if caller.is_manager() && is_self {
            return Err(
                DomainError::Forbidden("managers cannot delete themselves".to_string()).into(),
            );
        }
        if !caller.is_manager() && !is_self {
            return Err(AppError::ManagerOnly);
        }

        let was_active = self.accounts.deactivate(command.account_id).await?;
        let sessions_revoked = self.sessions.revoke_all_for(command.account_id).await?;

        tracing::info!(
            account_id = command.account_id,
            deactivated_by = caller.account_id,
            was_active,
            sessions_revoked,
            "User deactivated"
        );

        Ok(DeactivateUserResult {
            account_id: command.account_id,
            was_active,
            sessions_revoked,
        })
    }
}
