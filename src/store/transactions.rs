//! Transaction Log
//!
//! Append-only record of committed transfers. Rows are never updated or
//! deleted; database triggers reject both.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool};

use crate::domain::{AccountId, Amount, Direction, HistoryEntry, TransactionId, TransactionRecord};
use crate::error::{AppError, AppResult};

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    amount_cents: i64,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(TransactionRecord {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            amount: Amount::from_cents(row.amount_cents)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    amount_cents: i64,
    description: Option<String>,
    created_at: DateTime<Utc>,
    counterparty: String,
    counterparty_account: Option<String>,
}

/// Repository for transaction records
#[derive(Debug, Clone)]
pub struct TransactionLog {
    pool: SqlitePool,
}

impl TransactionLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a record inside the transfer's transaction
    pub(crate) async fn append(
        conn: &mut SqliteConnection,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Amount,
        description: Option<&str>,
    ) -> AppResult<TransactionRecord> {
        let row: TransactionRow = sqlx::query_as(
            r#"
            INSERT INTO transactions (sender_id, receiver_id, amount_cents, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, sender_id, receiver_id, amount_cents, description, created_at
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(amount.cents())
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        TransactionRecord::try_from(row)
    }

    pub async fn find_by_id(&self, id: TransactionId) -> AppResult<Option<TransactionRecord>> {
        let row: Option<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id, sender_id, receiver_id, amount_cents, description, created_at
            FROM transactions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRecord::try_from).transpose()
    }

    /// Transactions where the account is sender or receiver, newest first
    pub async fn history(&self, account_id: AccountId, limit: u32) -> AppResult<Vec<HistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT
                t.id, t.sender_id, t.receiver_id, t.amount_cents, t.description, t.created_at,
                c.full_name AS counterparty,
                c.account_number AS counterparty_account
            FROM transactions t
            JOIN users c
              ON c.id = CASE WHEN t.sender_id = ?1 THEN t.receiver_id ELSE t.sender_id END
            WHERE t.sender_id = ?1 OR t.receiver_id = ?1
            ORDER BY t.id DESC
            LIMIT ?2
            "#,
        )
        .bind(account_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(direction) = Direction::relative_to(row.sender_id, row.receiver_id, account_id)
            else {
                continue;
            };
            entries.push(HistoryEntry {
                id: row.id,
                direction,
                amount: Amount::from_cents(row.amount_cents)?,
                description: row.description,
                sender_id: row.sender_id,
                receiver_id: row.receiver_id,
                counterparty: row.counterparty,
                counterparty_account: row.counterparty_account,
                created_at: row.created_at,
            });
        }
        Ok(entries)
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of transactions in which the account took part
    pub async fn count_for(&self, account_id: AccountId) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE sender_id = ?1 OR receiver_id = ?1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
