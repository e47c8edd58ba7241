//! Account Store
//!
//! Durable mapping from account identity to account state. Uniqueness of
//! login and account number is enforced by UNIQUE indexes, so the check is
//! atomic with the insert.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool};
use sqlx::{Executor, QueryBuilder};

use crate::db;
use crate::domain::amount::MAX_BALANCE_CENTS;
use crate::domain::{
    Account, AccountChanges, AccountId, AccountNumber, Balance, DomainError, NewAccount, Role,
};
use crate::error::{AppError, AppResult};

use super::map_unique_violation;

/// Column list shared by every account query (`users` aliased as `u`)
pub(crate) const ACCOUNT_COLUMNS: &str = "u.id, u.login, u.password_hash, u.full_name, u.role, \
     u.phone, u.account_number, u.balance_cents, u.is_active, u.created_at";

/// Same columns, unqualified, for RETURNING clauses
const RETURNING_COLUMNS: &str = "id, login, password_hash, full_name, role, \
     phone, account_number, balance_cents, is_active, created_at";

/// First account number handed out when a client is created without one
const ACCOUNT_NUMBER_BASE: u64 = 1000;

/// Attempts at finding a free generated account number
const ACCOUNT_NUMBER_ATTEMPTS: u64 = 16;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AccountRow {
    id: i64,
    login: String,
    password_hash: String,
    full_name: String,
    role: String,
    phone: Option<String>,
    account_number: Option<String>,
    balance_cents: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = AppError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|_| AppError::Internal(format!("account {} has unknown role", row.id)))?;
        let balance = Balance::from_cents(row.balance_cents)
            .map_err(|e| AppError::Internal(format!("account {} balance: {}", row.id, e)))?;

        Ok(Account {
            id: row.id,
            login: row.login,
            password_hash: row.password_hash,
            full_name: row.full_name,
            role,
            phone: row.phone,
            account_number: row.account_number,
            balance,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

/// Aggregate figures over active accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountStatistics {
    pub total_users: i64,
    pub total_managers: i64,
    pub total_clients: i64,
    pub total_balance: Balance,
}

/// Repository for account records
#[derive(Debug, Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    /// Create a new AccountStore
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn find_by_id(&self, id: AccountId) -> AppResult<Option<Account>> {
        Self::fetch_by_id(&self.pool, id).await
    }

    /// Lookup usable on a pool or inside an open transaction
    pub(crate) async fn fetch_by_id<'e, E>(executor: E, id: AccountId) -> AppResult<Option<Account>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users u WHERE u.id = ?1");
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        row.map(Account::try_from).transpose()
    }

    /// Find an account by login, active or not
    pub async fn find_by_credential(&self, login: &str) -> AppResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users u WHERE u.login = ?1");
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Account::try_from).transpose()
    }

    /// Resolve a transfer recipient by account number, falling back to phone.
    /// Only client accounts are returned.
    pub async fn find_by_recipient_key(&self, key: &str) -> AppResult<Option<Account>> {
        let mut conn = self.pool.acquire().await?;
        Self::resolve_recipient(&mut conn, key).await
    }

    pub(crate) async fn resolve_recipient(
        conn: &mut SqliteConnection,
        key: &str,
    ) -> AppResult<Option<Account>> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }

        let by_number = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users u \
             WHERE u.account_number = ?1 AND u.role = 'client'"
        );
        let row: Option<AccountRow> = sqlx::query_as(&by_number)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(row) = row {
            return Account::try_from(row).map(Some);
        }

        // Phones are not unique: prefer an active holder, then the oldest
        let by_phone = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users u \
             WHERE u.phone = ?1 AND u.role = 'client' \
             ORDER BY u.is_active DESC, u.id ASC LIMIT 1"
        );
        let row: Option<AccountRow> = sqlx::query_as(&by_phone)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Account::try_from).transpose()
    }

    /// All accounts, oldest first
    pub async fn list_all(&self) -> AppResult<Vec<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users u ORDER BY u.id ASC");
        let rows: Vec<AccountRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Account::try_from).collect()
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Sum of every balance in the system, active or not
    pub async fn total_balance(&self) -> AppResult<Balance> {
        let cents: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(balance_cents), 0) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(Balance::from_cents(cents)?)
    }

    pub async fn statistics(&self) -> AppResult<AccountStatistics> {
        let (total_users, total_managers, total_clients, balance_cents): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN role = 'manager' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN role = 'client' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN role = 'client' THEN balance_cents ELSE 0 END), 0)
                FROM users
                WHERE is_active = 1
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(AccountStatistics {
            total_users,
            total_managers,
            total_clients,
            total_balance: Balance::from_cents(balance_cents)?,
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert a new account. Clients without an account number get the
    /// next free `ACC` number. Lock contention is retried a bounded number
    /// of times; uniqueness conflicts are final.
    pub async fn create(&self, new: NewAccount) -> AppResult<Account> {
        let mut attempt = 1;
        let account = loop {
            match self.try_create(&new).await {
                Err(AppError::Database(ref err))
                    if db::is_transient(err) && attempt < db::MAX_WRITE_ATTEMPTS =>
                {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        "Account insert hit lock contention, retrying"
                    );
                    tokio::time::sleep(db::WRITE_RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                result => break result?,
            }
        };

        tracing::info!(
            account_id = account.id,
            login = %account.login,
            role = %account.role,
            "Account created"
        );
        Ok(account)
    }

    /// One insert attempt. The next account number is read and used under
    /// the same write lock, so concurrent creates cannot pick the same one.
    async fn try_create(&self, new: &NewAccount) -> AppResult<Account> {
        let mut tx = db::begin_write(&self.pool).await?;

        let account_number = match (&new.account_number, new.role) {
            (Some(number), _) => Some(number.clone()),
            (None, Role::Client) => Some(Self::next_account_number(&mut tx).await?),
            (None, Role::Manager) => None,
        };

        let sql = format!(
            "INSERT INTO users \
             (login, password_hash, full_name, role, phone, account_number, balance_cents, is_active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8) \
             RETURNING {RETURNING_COLUMNS}"
        );
        let row: AccountRow = sqlx::query_as(&sql)
            .bind(new.login.as_str())
            .bind(&new.password_hash)
            .bind(new.full_name.as_str())
            .bind(new.role.as_str())
            .bind(new.phone.as_ref().map(|p| p.as_str()))
            .bind(account_number.as_ref().map(|n| n.as_str()))
            .bind(new.balance.cents())
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                map_unique_violation(
                    e,
                    new.login.as_str(),
                    account_number.as_ref().map(|n| n.as_str()),
                )
            })?;

        tx.commit().await?;

        Account::try_from(row)
    }

    async fn next_account_number(conn: &mut SqliteConnection) -> AppResult<AccountNumber> {
        let next_id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) + 1 FROM users")
            .fetch_one(&mut *conn)
            .await?;
        let start = ACCOUNT_NUMBER_BASE + next_id.max(1) as u64;

        for sequence in start..start + ACCOUNT_NUMBER_ATTEMPTS {
            let candidate = AccountNumber::from_sequence(sequence)?;
            let taken: i64 = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM users WHERE account_number = ?1)",
            )
            .bind(candidate.as_str())
            .fetch_one(&mut *conn)
            .await?;
            if taken == 0 {
                return Ok(candidate);
            }
        }

        Err(AppError::Internal(
            "could not allocate a free account number".to_string(),
        ))
    }

    /// Move an account balance by `delta_cents`. Must run inside the
    /// transfer's transaction (or an administrative correction).
    ///
    /// Returns `None` when the account is missing or inactive, or when the
    /// result would leave the representable range. Nothing is written then.
    pub(crate) async fn update_balance(
        conn: &mut SqliteConnection,
        id: AccountId,
        delta_cents: i64,
    ) -> AppResult<Option<Balance>> {
        let cents: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET balance_cents = balance_cents + ?2
            WHERE id = ?1 AND is_active = 1
              AND balance_cents + ?2 >= 0
              AND balance_cents + ?2 <= ?3
            RETURNING balance_cents
            "#,
        )
        .bind(id)
        .bind(delta_cents)
        .bind(MAX_BALANCE_CENTS)
        .fetch_optional(&mut *conn)
        .await?;

        cents.map(Balance::from_cents).transpose().map_err(Into::into)
    }

    /// Apply an allow-listed change set and return the updated account
    pub async fn apply_changes(
        &self,
        id: AccountId,
        changes: &AccountChanges,
    ) -> AppResult<Account> {
        if !changes.is_empty() {
            let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
            {
                let mut fields = builder.separated(", ");
                if let Some(login) = &changes.login {
                    fields.push("login = ");
                    fields.push_bind_unseparated(login.as_str().to_string());
                }
                if let Some(password_hash) = &changes.password_hash {
                    fields.push("password_hash = ");
                    fields.push_bind_unseparated(password_hash.clone());
                }
                if let Some(full_name) = &changes.full_name {
                    fields.push("full_name = ");
                    fields.push_bind_unseparated(full_name.as_str().to_string());
                }
                if let Some(phone) = &changes.phone {
                    fields.push("phone = ");
                    fields.push_bind_unseparated(phone.as_ref().map(|p| p.as_str().to_string()));
                }
                if let Some(balance) = &changes.balance {
                    fields.push("balance_cents = ");
                    fields.push_bind_unseparated(balance.cents());
                }
                if let Some(is_active) = changes.is_active {
                    fields.push("is_active = ");
                    fields.push_bind_unseparated(is_active);
                }
            }
            builder.push(" WHERE id = ");
            builder.push_bind(id);

            let result = builder.build().execute(&self.pool).await.map_err(|e| {
                let login = changes.login.as_ref().map(|l| l.as_str()).unwrap_or_default();
                map_unique_violation(e, login, None)
            })?;

            if result.rows_affected() == 0 {
                return Err(DomainError::AccountNotFound(id.to_string()).into());
            }

            tracing::info!(account_id = id, fields = ?changes.field_names(), "Account updated");
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(id.to_string()).into())
    }

    /// Soft delete. Idempotent: returns whether the account was active
    /// before the call.
    pub async fn deactivate(&self, id: AccountId) -> AppResult<bool> {
        let result = sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1 AND is_active = 1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            if self.find_by_id(id).await?.is_none() {
                return Err(DomainError::AccountNotFound(id.to_string()).into());
            }
            return Ok(false);
        }

        tracing::info!(account_id = id, "Account deactivated");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordHasher;
    use crate::config::Config;
    use crate::domain::{FullName, Login, Phone};
    use crate::seed;

    async fn seeded_store() -> AccountStore {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Config::default()
        };
        let pool = db::connect(&config).await.unwrap();
        db::init_schema(&pool).await.unwrap();
        let hasher = PasswordHasher::new(64, 1).unwrap();
        seed::seed_demo_data(&pool, &hasher).await.unwrap();
        AccountStore::new(pool)
    }

    fn new_account(login: &str, role: Role, phone: &str) -> NewAccount {
        NewAccount::new(
            Login::new(login).unwrap(),
            "hash".to_string(),
            FullName::new("Extra Holder").unwrap(),
            role,
        )
        .with_phone(Some(Phone::new(phone).unwrap()))
    }

    #[tokio::test]
    async fn test_recipient_by_account_number_then_phone() {
        let store = seeded_store().await;

        let by_number = store.find_by_recipient_key("ACC1002").await.unwrap().unwrap();
        assert_eq!(by_number.login, "client2");

        let by_phone = store
            .find_by_recipient_key(" +79000000003 ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_phone.login, "client3");

        assert!(store.find_by_recipient_key("ACC9999").await.unwrap().is_none());
        assert!(store.find_by_recipient_key("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recipient_lookup_skips_managers() {
        let store = seeded_store().await;
        store
            .create(new_account("manager3", Role::Manager, "+79000000099"))
            .await
            .unwrap();

        assert!(store
            .find_by_recipient_key("+79000000099")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_shared_phone_prefers_active_then_oldest() {
        let store = seeded_store().await;
        let twin = store
            .create(new_account("client1_twin", Role::Client, "+79000000001"))
            .await
            .unwrap();

        let first = store.find_by_recipient_key("+79000000001").await.unwrap().unwrap();
        assert_eq!(first.login, "client1");

        let original = store.find_by_credential("client1").await.unwrap().unwrap();
        store.deactivate(original.id).await.unwrap();

        let active = store.find_by_recipient_key("+79000000001").await.unwrap().unwrap();
        assert_eq!(active.id, twin.id);
    }

    #[tokio::test]
    async fn test_generated_account_numbers_skip_taken_ones() {
        let store = seeded_store().await;

        let mut taken = new_account("client11", Role::Client, "+79000000011");
        taken.account_number = Some(AccountNumber::new("ACC1014").unwrap());
        store.create(taken).await.unwrap();

        // Next id is 14, whose number is already in use
        let generated = store
            .create(new_account("client12", Role::Client, "+79000000012"))
            .await
            .unwrap();
        assert_eq!(generated.account_number.as_deref(), Some("ACC1015"));
    }
}
