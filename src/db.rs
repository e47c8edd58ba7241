//! Database module
//!
//! SQLite connection setup, schema bootstrap and error classification.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Transaction;

use crate::config::Config;

/// Schema statements, applied in order on startup
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        login          TEXT    NOT NULL UNIQUE,
        password_hash  TEXT    NOT NULL,
        full_name      TEXT    NOT NULL,
        role           TEXT    NOT NULL CHECK (role IN ('client', 'manager')),
        phone          TEXT,
        account_number TEXT    UNIQUE,
        balance_cents  INTEGER NOT NULL DEFAULT 0 CHECK (balance_cents >= 0),
        is_active      INTEGER NOT NULL DEFAULT 1,
        created_at     TEXT    NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_phone ON users (phone)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        sender_id    INTEGER NOT NULL REFERENCES users (id),
        receiver_id  INTEGER NOT NULL REFERENCES users (id),
        amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
        description  TEXT,
        created_at   TEXT    NOT NULL,
        CHECK (sender_id <> receiver_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_sender ON transactions (sender_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_receiver ON transactions (receiver_id)",
    r#"
    CREATE TRIGGER IF NOT EXISTS transactions_no_update
    BEFORE UPDATE ON transactions
    BEGIN
        SELECT RAISE(ABORT, 'transactions are immutable');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS transactions_no_delete
    BEFORE DELETE ON transactions
    BEGIN
        SELECT RAISE(ABORT, 'transactions are immutable');
    END
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        token_hash TEXT    PRIMARY KEY,
        user_id    INTEGER NOT NULL REFERENCES users (id),
        created_at TEXT    NOT NULL,
        expires_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions (user_id)",
];

const REQUIRED_TABLES: &[&str] = &["users", "transactions", "sessions"];

/// Attempts made when a write transaction hits lock contention
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Backoff unit; attempt `n` waits `n * WRITE_RETRY_BACKOFF`
pub const WRITE_RETRY_BACKOFF: Duration = Duration::from_millis(25);

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Open the connection pool described by the configuration.
///
/// In-memory databases live inside a single connection, so the pool is
/// pinned to exactly one connection that is never recycled.
pub async fn connect(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool_options = if is_in_memory(&config.database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.database_max_connections)
    };

    pool_options.connect_with(options).await
}

/// Create tables, indexes and triggers if they do not exist yet
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(pool).await?;
    }
    Ok(())
}

/// Begin a transaction that already holds the write lock.
///
/// A deferred transaction that reads first can only fail, not wait, when it
/// later upgrades to a writer. Claiming the lock with a no-op write up front
/// makes concurrent writers queue on the busy timeout instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE users SET id = id WHERE 0")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Simple connectivity check
pub async fn verify_connection(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        )
        .bind(*table)
        .fetch_one(pool)
        .await?;

        if exists == 0 {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    Ok(true)
}

/// Lock contention (SQLITE_BUSY / SQLITE_LOCKED) or pool exhaustion.
/// These may succeed when retried; every other error is final.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// For a UNIQUE constraint failure, the offending `table.column`.
pub fn unique_violation(err: &sqlx::Error) -> Option<String> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }

    db_err
        .message()
        .split_once("UNIQUE constraint failed:")
        .map(|(_, columns)| columns.trim().to_string())
}
