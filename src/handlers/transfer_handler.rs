//! Transfer Handler
//!
//! Moves money between two client accounts. Debit, credit and the log
//! record commit together in one SQLite transaction or not at all.

use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::db;
use crate::domain::validation;
use crate::domain::{Account, AccountId, Amount, AmountError, DomainError, OperationContext};
use crate::error::{AppError, AppResult};
use crate::store::{AccountStore, TransactionLog};

use super::{TransferCommand, TransferResult};

// =========================================================================
// TransferHandler
// =========================================================================

/// Handler for peer-to-peer transfers
pub struct TransferHandler {
    pool: SqlitePool,
    max_amount: Decimal,
}

impl TransferHandler {
    pub fn new(pool: SqlitePool, max_amount: Decimal) -> Self {
        Self { pool, max_amount }
    }

    /// Execute the transfer command on behalf of the calling client
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<TransferResult, AppError> {
        let caller = context.caller.as_ref().ok_or(AppError::Unauthenticated)?;
        if caller.account_id != command.sender_id {
            return Err(DomainError::Forbidden(
                "transfers can only be made from the caller's own account".to_string(),
            )
            .into());
        }

        self.transfer(
            command.sender_id,
            &command.recipient,
            command.amount,
            command.description.as_deref(),
        )
        .await
    }

    /// Validate and commit a transfer.
    ///
    /// Preconditions are checked in order and the first failure wins:
    /// amount, sender, recipient, self-transfer, funds.
    pub async fn transfer(
        &self,
        sender_id: AccountId,
        recipient_key: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> AppResult<TransferResult> {
        let result = self
            .transfer_with_retry(sender_id, recipient_key, amount, description)
            .await;

        match &result {
            Ok(result) => tracing::info!(
                transaction_id = result.transaction.id,
                sender_id,
                receiver_id = result.transaction.receiver_id,
                amount = %result.transaction.amount,
                "Transfer committed"
            ),
            Err(err) if err.kind().is_retryable() => tracing::error!(
                sender_id,
                recipient = %recipient_key,
                error = %err,
                "Transfer failed"
            ),
            Err(err) => tracing::warn!(
                sender_id,
                recipient = %recipient_key,
                amount = %amount,
                kind = ?err.kind(),
                reason = %err,
                "Transfer rejected"
            ),
        }

        result
    }

    async fn transfer_with_retry(
        &self,
        sender_id: AccountId,
        recipient_key: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> AppResult<TransferResult> {
        let amount = Amount::with_limit(amount, self.max_amount)?;
        let description = validation::description(description)?;

        let mut attempt = 1;
        loop {
            match self
                .try_transfer(sender_id, recipient_key, amount, description.as_deref())
                .await
            {
                Err(AppError::Database(ref err))
                    if db::is_transient(err) && attempt < db::MAX_WRITE_ATTEMPTS =>
                {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        "Transfer hit lock contention, retrying"
                    );
                    tokio::time::sleep(db::WRITE_RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_transfer(
        &self,
        sender_id: AccountId,
        recipient_key: &str,
        amount: Amount,
        description: Option<&str>,
    ) -> AppResult<TransferResult> {
        let mut tx = db::begin_write(&self.pool).await?;

        let sender = AccountStore::fetch_by_id(&mut *tx, sender_id)
            .await?
            .filter(|account| account.is_active)
            .ok_or_else(|| DomainError::AccountNotFound(sender_id.to_string()))?;
        if !sender.is_client() {
            return Err(DomainError::NotAClient.into());
        }

        let recipient = AccountStore::resolve_recipient(&mut tx, recipient_key)
            .await?
            .filter(Account::can_transact)
            .ok_or_else(|| DomainError::RecipientNotFound(recipient_key.trim().to_string()))?;

        if recipient.id == sender.id {
            return Err(DomainError::SelfTransfer.into());
        }

        if !sender.balance.is_sufficient_for(&amount) {
            return Err(
                DomainError::insufficient_funds(amount.value(), sender.balance.value()).into(),
            );
        }

        // Reject before writing if the credit cannot be represented
        recipient.balance.credit(&amount)?;

        // Guarded debit; the balance read above may be stale under contention
        let new_balance = AccountStore::update_balance(&mut tx, sender.id, -amount.cents())
            .await?
            .ok_or_else(|| DomainError::insufficient_funds(amount.value(), sender.balance.value()))?;

        AccountStore::update_balance(&mut tx, recipient.id, amount.cents())
            .await?
            .ok_or(DomainError::InvalidAmount(AmountError::Overflow))?;

        let record =
            TransactionLog::append(&mut tx, sender.id, recipient.id, amount, description).await?;

        tx.commit().await?;

        Ok(TransferResult {
            transaction: record,
            new_balance,
        })
    }
}
