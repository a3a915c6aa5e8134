use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use murmur_db::Database;

use crate::error::StoreError;

pub use argon2::Params as HashParams;

/// Verifies and creates user identities. Owns password hashing.
pub struct CredentialStore {
    db: Arc<Database>,
    hasher: Argon2<'static>,
}

impl CredentialStore {
    /// Argon2id with the crate's default cost.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            hasher: Argon2::default(),
        }
    }

    /// Argon2id with an explicit cost. Verification always uses the
    /// parameters embedded in the stored hash, so hashes made under one cost
    /// still verify under another.
    pub fn with_params(db: Arc<Database>, params: HashParams) -> Self {
        Self {
            db,
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    pub fn find_user(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.db.user_exists(username)?)
    }

    /// `false` for an unknown user and for a wrong password alike.
    pub fn verify_credentials(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        if !self.find_user(username)? {
            return Ok(false);
        }

        let Some(stored) = self.db.get_password_hash(username)? else {
            return Ok(false);
        };

        let parsed = PasswordHash::new(&stored).map_err(|e| StoreError::CorruptHash(e.to_string()))?;

        Ok(self
            .hasher
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// `false` if the username is taken, including by a registration that
    /// raced this one.
    pub fn create_new_user(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        if self.find_user(username)? {
            return Ok(false);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .hasher
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| StoreError::Hashing(e.to_string()))?
            .to_string();

        let rows = self
            .db
            .create_user(&Uuid::new_v4().to_string(), username, &password_hash, Utc::now())?;

        if rows != 1 {
            debug!("Registration for {} lost a race, username taken", username);
        }
        Ok(rows == 1)
    }
}

#[cfg(test)]
pub(crate) fn cheap_params() -> HashParams {
    HashParams::new(HashParams::MIN_M_COST, 1, 1, None).unwrap()
}
