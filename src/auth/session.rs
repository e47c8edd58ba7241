//! Session service
//!
//! Issues opaque bearer tokens on login and resolves them back into an
//! active account. Only the SHA-256 of a token is persisted.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::domain::{Account, AccountId};
use crate::error::{AppError, AppResult};
use crate::store::{AccountStore, SessionStore};

use super::PasswordHasher;

/// Token entropy in bytes
const TOKEN_BYTES: usize = 32;

/// A fresh session handed back to the client
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub account: Account,
    pub expires_at: DateTime<Utc>,
}

/// Random 256-bit token, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct SessionService {
    accounts: AccountStore,
    sessions: SessionStore,
    hasher: PasswordHasher,
    ttl: Duration,
}

impl SessionService {
    pub fn new(pool: SqlitePool, hasher: PasswordHasher, ttl_hours: i64) -> Self {
        Self {
            accounts: AccountStore::new(pool.clone()),
            sessions: SessionStore::new(pool),
            hasher,
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Verify credentials and open a session. Unknown logins, wrong
    /// passwords and deactivated accounts are indistinguishable to the caller.
    /// The login must match exactly; surrounding whitespace is not stripped.
    pub async fn login(&self, login: &str, password: &str) -> AppResult<IssuedSession> {
        let account = match self.accounts.find_by_credential(login).await? {
            Some(account) => account,
            None => {
                tracing::warn!(login = %login, "Login failed: unknown account");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(password, &account.password_hash).await? {
            tracing::warn!(account_id = account.id, "Login failed: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        if !account.is_active {
            tracing::warn!(account_id = account.id, "Login failed: account deactivated");
            return Err(AppError::InvalidCredentials);
        }

        let token = generate_token();
        let expires_at = Utc::now() + self.ttl;
        self.sessions
            .insert(&hash_token(&token), account.id, expires_at)
            .await?;

        tracing::info!(account_id = account.id, role = %account.role, "Session opened");

        Ok(IssuedSession {
            token,
            account,
            expires_at,
        })
    }

    /// Resolve a raw token into the session hash and its active account
    pub async fn authenticate(&self, token: &str) -> AppResult<Option<(String, Account)>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        let token_hash = hash_token(token);
        let account = self.sessions.resolve(&token_hash, Utc::now()).await?;
        Ok(account.map(|account| (token_hash, account)))
    }

    pub async fn logout(&self, token_hash: &str) -> AppResult<bool> {
        let revoked = self.sessions.revoke(token_hash).await?;
        if revoked {
            tracing::info!("Session closed");
        }
        Ok(revoked)
    }

    pub async fn revoke_all(&self, account_id: AccountId) -> AppResult<u64> {
        let revoked = self.sessions.revoke_all_for(account_id).await?;
        tracing::info!(account_id, revoked, "Sessions revoked");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_token_is_stable_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }
}
