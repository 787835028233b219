//! services/api/src/adapters/allow_list.rs
//!
//! Identity provider backed by a static allow-list file. Each entry carries the
//! argon2 hashes of the user's password and one-time code, as produced by the
//! `hash-secret` binary:
//!
//! ```json
//! [{ "username": "admin", "password_hash": "$argon2id$...", "code_hash": "$argon2id$..." }]
//! ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use backoffice_core::ports::{IdentityProvider, PortError, PortResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct AllowListEntry {
    pub username: String,
    pub password_hash: String,
    pub code_hash: String,
}

pub struct AllowListIdentity {
    /// Keyed by lower-cased username.
    users: HashMap<String, AllowListEntry>,
}

impl AllowListIdentity {
    pub fn new(entries: Vec<AllowListEntry>) -> Self {
        let users = entries
            .into_iter()
            .map(|entry| (entry.username.trim().to_lowercase(), entry))
            .collect();
        Self { users }
    }

    /// Loads the allow-list from a JSON file.
    pub async fn load(path: &Path) -> PortResult<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            PortError::Unexpected(format!("cannot read allow-list {}: {}", path.display(), e))
        })?;
        let entries: Vec<AllowListEntry> = serde_json::from_str(&raw).map_err(|e| {
            PortError::Unexpected(format!("malformed allow-list {}: {}", path.display(), e))
        })?;
        if entries.is_empty() {
            warn!("Allow-list {} is empty; nobody can log in", path.display());
        }
        info!("Loaded {} allowed users", entries.len());
        Ok(Self::new(entries))
    }

    fn verify(&self, username: &str, secret: &str, pick: fn(&AllowListEntry) -> &str) -> PortResult<bool> {
        let Some(entry) = self.users.get(username) else {
            return Ok(false);
        };
        let parsed = PasswordHash::new(pick(entry)).map_err(|e| {
            error!("Stored hash for '{}' is unreadable: {:?}", username, e);
            PortError::Unexpected("unreadable secret hash".to_string())
        })?;
        Ok(Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok())
    }
}

#[async_trait]
impl IdentityProvider for AllowListIdentity {
    async fn verify_password(&self, username: &str, password: &str) -> PortResult<bool> {
        self.verify(username, password, |e| e.password_hash.as_str())
    }

    async fn verify_code(&self, username: &str, code: &str) -> PortResult<bool> {
        self.verify(username, code, |e| e.code_hash.as_str())
    }
}

/// Hashes a secret for inclusion in the allow-list.
pub fn hash_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    hash_secret_with(secret, Params::default())
}

/// Hashes with explicit cost parameters. They are recorded in the PHC string, so
/// verification needs no configuration.
pub fn hash_secret_with(secret: &str, params: Params) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(secret.as_bytes(), &salt)?
        .to_string())
}
