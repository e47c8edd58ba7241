//! Demo data
//!
//! Two managers and ten funded clients, inserted on first start when the
//! store is empty.

use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::auth::PasswordHasher;
use crate::domain::{
    AccountNumber, Balance, FullName, Login, NewAccount, Password, Phone, Role,
};
use crate::error::AppResult;
use crate::store::AccountStore;

const MANAGER_PASSWORD: &str = "manager123";
const CLIENT_PASSWORD: &str = "client123";
const MANAGER_COUNT: u32 = 2;
const CLIENT_COUNT: u32 = 10;

/// Opening balance of every demo client
pub fn opening_balance() -> Decimal {
    Decimal::new(1_000_000, 2)
}

/// Insert the demo accounts unless any account exists. Returns the number
/// of accounts created.
pub async fn seed_demo_data(pool: &SqlitePool, hasher: &PasswordHasher) -> AppResult<usize> {
    let accounts = AccountStore::new(pool.clone());
    if accounts.count().await? > 0 {
        tracing::debug!("Store is not empty, skipping demo seed");
        return Ok(0);
    }

    let manager_hash = hasher.hash(&Password::new(MANAGER_PASSWORD)?).await?;
    let client_hash = hasher.hash(&Password::new(CLIENT_PASSWORD)?).await?;

    let mut created = 0;

    for n in 1..=MANAGER_COUNT {
        let manager = NewAccount::new(
            Login::new(&format!("manager{}", n))?,
            manager_hash.clone(),
            FullName::new(&format!("Manager {}", n))?,
            Role::Manager,
        );
        accounts.create(manager).await?;
        created += 1;
    }

    for n in 1..=CLIENT_COUNT {
        let client = NewAccount::new(
            Login::new(&format!("client{}", n))?,
            client_hash.clone(),
            FullName::new(&format!("Client {}", n))?,
            Role::Client,
        )
        .with_phone(Some(Phone::new(&format!("+7900000{:04}", n))?))
        .with_banking(
            Some(AccountNumber::from_sequence(1000 + u64::from(n))?),
            Balance::new(opening_balance())?,
        )?;
        accounts.create(client).await?;
        created += 1;
    }

    tracing::info!(created, "Seeded demo accounts");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;

    #[tokio::test]
    async fn test_seed_creates_demo_accounts_once() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Config::default()
        };
        let pool = db::connect(&config).await.unwrap();
        db::init_schema(&pool).await.unwrap();
        let hasher = PasswordHasher::new(64, 1).unwrap();

        assert_eq!(seed_demo_data(&pool, &hasher).await.unwrap(), 12);
        assert_eq!(seed_demo_data(&pool, &hasher).await.unwrap(), 0);

        let accounts = AccountStore::new(pool.clone());
        let client = accounts.find_by_credential("client10").await.unwrap().unwrap();
        assert_eq!(client.account_number.as_deref(), Some("ACC1010"));
        assert_eq!(client.phone.as_deref(), Some("+79000000010"));
        assert_eq!(client.balance.value(), opening_balance());
        assert!(hasher.verify("client123", &client.password_hash).await.unwrap());

        let manager = accounts.find_by_credential("manager2").await.unwrap().unwrap();
        assert_eq!(manager.role, Role::Manager);
        assert_eq!(manager.account_number, None);
    }
}
