//! Session Store
//!
//! Server-side sessions keyed by the SHA-256 of the bearer token. The raw
//! token is never stored.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::domain::{Account, AccountId};
use crate::error::AppResult;

use super::accounts::{AccountRow, ACCOUNT_COLUMNS};

#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        token_hash: &str,
        account_id: AccountId,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(token_hash)
        .bind(account_id)
        .bind(Utc::now())
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The active account owning an unexpired session, if any
    pub async fn resolve(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token_hash = ?1 AND s.expires_at > ?2 AND u.is_active = 1"
        );
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(token_hash)
            .bind(now.timestamp())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Account::try_from).transpose()
    }

    /// Returns whether a session was removed
    pub async fn revoke(&self, token_hash: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke_all_for(&self, account_id: AccountId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for(&self, account_id: AccountId) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
