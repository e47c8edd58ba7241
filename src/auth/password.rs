//! Password hashing
//!
//! Argon2id with configurable cost. Hashing is CPU-bound, so both hashing
//! and verification run on the blocking thread pool.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::Config;
use crate::domain::Password;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> AppResult<Self> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| AppError::Internal(format!("invalid password hashing parameters: {}", e)))?;
        Ok(Self { params })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(config.password_hash_memory_kib, config.password_hash_iterations)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a validated password into a PHC string
    pub async fn hash(&self, password: &Password) -> AppResult<String> {
        let argon2 = self.argon2();
        let secret = password.expose().to_owned();

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(secret.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
        })
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
    }

    /// Check a candidate password against a stored PHC string.
    /// The cost parameters are read from the stored hash.
    pub async fn verify(&self, candidate: &str, stored_hash: &str) -> AppResult<bool> {
        let argon2 = self.argon2();
        let candidate = candidate.to_owned();
        let stored_hash = stored_hash.to_owned();

        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored_hash)
                .map_err(|e| AppError::Internal(format!("stored password hash is invalid: {}", e)))?;
            match argon2.verify_password(candidate.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(AppError::Internal(format!("password verification failed: {}", e))),
            }
        })
        .await
        .map_err(|e| AppError::Internal(format!("password verification task failed: {}", e)))?
    }
}
