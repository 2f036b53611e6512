//! Username to password-hash mapping, kept outside the document root.
//!
//! Loaded once at startup and written back only when a user signs up.

use anyhow::{anyhow, bail, Result};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{Authenticator, Principal};

pub struct CredentialStore {
    path: PathBuf,
    users: RwLock<BTreeMap<String, String>>,
    hasher: Argon2<'static>,
}

impl CredentialStore {
    /// Load the users file at `path`. A missing file means no users yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let users = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            BTreeMap::new()
        };
        info!(path = %path.display(), users = users.len(), "loaded credentials");
        Ok(Self {
            path,
            users: RwLock::new(users),
            hasher: Argon2::default(),
        })
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.read().contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Register a new user and persist the updated mapping.
    ///
    /// The user only becomes visible once the users file has been written.
    pub fn sign_up(&self, username: &str, password: &str) -> Result<()> {
        let username = normalize(username);
        if username.is_empty() || password.is_empty() {
            bail!("username and password must not be empty");
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!(e))?
            .to_string();

        let mut users = self.users.write();
        if users.contains_key(username) {
            bail!("{} is already taken", username);
        }
        let mut updated = users.clone();
        updated.insert(username.to_string(), hash);
        self.persist(&updated)?;
        *users = updated;
        info!(username, "registered user");
        Ok(())
    }

    /// Check a password against the stored hash.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let username = normalize(username);
        let users = self.users.read();
        let Some(stored) = users.get(username) else {
            return false;
        };
        let Ok(parsed) = PasswordHash::new(stored) else {
            warn!(username, "stored password hash is malformed");
            return false;
        };
        self.hasher
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    pub fn sign_in(&self, username: &str, password: &str) -> Option<Principal> {
        if self.verify(username, password) {
            Some(Principal::signed_in(normalize(username)))
        } else {
            None
        }
    }

    fn persist(&self, users: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(users)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Usernames are compared without surrounding whitespace.
fn normalize(username: &str) -> &str {
    username.trim()
}

impl Authenticator for CredentialStore {
    fn is_authenticated(&self, principal: &Principal) -> bool {
        principal.username().is_some_and(|name| self.contains(name))
    }
}
