use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
// rand_core 0.6 is what password-hash/argon2 depends on; must match that version.
use rand_core::OsRng;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};

/// Error loading the admin users file.
#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("Cannot read users file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Users file {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// A provisioned admin account. The hash is an argon2 PHC string.
#[derive(Deserialize, Debug, Clone)]
pub struct Account {
    pub username: String,
    pub password_hash: String,
}

#[derive(Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<Account>,
}

/// Read-only set of admin accounts consulted at login.
pub struct CredentialStore {
    accounts: HashMap<String, String>,
    /// Verified against when the username is unknown, so a miss costs the
    /// same as a wrong password.
    decoy: String,
}

impl CredentialStore {
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Result<Self> {
        let accounts = accounts
            .into_iter()
            .map(|a| (a.username, a.password_hash.trim().to_string()))
            .collect();
        let decoy = hash_password(&new_decoy_secret())?;
        Ok(Self { accounts, decoy })
    }

    /// Build the store from the single environment-provided account plus an
    /// optional JSON users file. File entries win on username clashes.
    pub async fn load(
        username: &str,
        password_hash: Option<&str>,
        users_file: Option<&Path>,
    ) -> Result<Self> {
        let mut accounts = Vec::new();

        match password_hash.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hash) => accounts.push(Account {
                username: username.to_string(),
                password_hash: hash.to_string(),
            }),
            None => tracing::warn!(
                "ADMIN_PASSWORD_HASH not set; account {:?} cannot log in",
                username
            ),
        }

        if let Some(path) = users_file {
            let from_file = read_users_file(path).await?;
            tracing::info!("Loaded {} admin account(s) from {}", from_file.len(), path.display());
            accounts.extend(from_file);
        }

        Self::new(accounts)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Verify a username/password pair.
    /// Returns `false` for unknown users, wrong passwords and malformed hashes.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.accounts.get(username) {
            Some(hash) => verify_hash(hash, password),
            None => {
                verify_hash(&self.decoy, password);
                false
            }
        }
    }
}

async fn read_users_file(path: &Path) -> Result<Vec<Account>, CredentialError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CredentialError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let parsed: UsersFile =
        serde_json::from_str(&raw).map_err(|source| CredentialError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    Ok(parsed.users)
}

/// Hash a password with argon2id and return the PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_hash(hash: &str, password: &str) -> bool {
    if hash.is_empty() {
        return false;
    }
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!("Stored admin password hash is not a PHC string: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn new_decoy_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(username: &str, password: &str) -> CredentialStore {
        CredentialStore::new([Account {
            username: username.to_string(),
            password_hash: hash_password(password).unwrap(),
        }])
        .unwrap()
    }

    #[test]
    fn correct_password_verifies() {
        let store = store_with("admin", "hunter2");
        assert!(store.verify("admin", "hunter2"));
    }

    #[test]
    fn wrong_password_or_unknown_user_is_rejected() {
        let store = store_with("admin", "hunter2");
        assert!(!store.verify("admin", "hunter3"));
        assert!(!store.verify("root", "hunter2"));
        assert!(!store.verify("Admin", "hunter2"));
        assert!(!store.verify("", ""));
    }

    #[test]
    fn malformed_or_empty_hash_never_verifies() {
        let store = CredentialStore::new([
            Account {
                username: "a".into(),
                password_hash: "".into(),
            },
            Account {
                username: "b".into(),
                password_hash: "pbkdf2:sha256:600000$salt$abc".into(),
            },
        ])
        .unwrap();
        assert!(!store.verify("a", ""));
        assert!(!store.verify("b", "abc"));
    }

    #[tokio::test]
    async fn load_merges_env_account_and_users_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin_users.json");
        let body = serde_json::json!({
            "users": [
                { "username": "editor", "password_hash": hash_password("pw2").unwrap() }
            ]
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let env_hash = hash_password("pw1").unwrap();
        let store = CredentialStore::load("admin", Some(&env_hash), Some(&path))
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.verify("admin", "pw1"));
        assert!(store.verify("editor", "pw2"));
    }

    #[tokio::test]
    async fn missing_hash_disables_env_account() {
        let store = CredentialStore::load("admin", Some("   "), None).await.unwrap();
        assert_eq!(store.len(), 0);
        assert!(!store.verify("admin", ""));
    }

    #[tokio::test]
    async fn unreadable_users_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(CredentialStore::load("admin", None, Some(&path)).await.is_err());

        std::fs::write(&path, "{ not json").unwrap();
        assert!(CredentialStore::load("admin", None, Some(&path)).await.is_err());
    }
}
