//! Who is calling.
//!
//! Users are read once from `users.yaml` and indexed both by id and by
//! bearer token.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};
use workflow::User;

use crate::error::{Result, ServiceError};

/// Lookup of known users.
pub trait UserProvider: Send + Sync {
    fn get_user(&self, user_id: &str) -> Option<User>;
    fn get_user_by_token(&self, token: &str) -> Option<User>;
}

#[derive(Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<User>,
}

/// Users from a static file. Read-only after construction.
#[derive(Debug, Default)]
pub struct StaticUserProvider {
    users: HashMap<String, User>,

    /// token → user id
    token_index: HashMap<String, String>,
}

impl StaticUserProvider {
    pub fn from_users(users: impl IntoIterator<Item = User>) -> Self {
        let mut provider = Self::default();
        for user in users {
            if !user.token.is_empty() {
                if let Some(previous) = provider.token_index.insert(user.token.clone(), user.id.clone()) {
                    warn!("Token shared by users {} and {}, keeping {}", previous, user.id, user.id);
                }
            }
            provider.users.insert(user.id.clone(), user);
        }
        provider
    }

    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let file: UsersFile = serde_yaml::from_str(yaml)?;
        Ok(Self::from_users(file.users))
    }

    /// Load users from a `users.yaml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| ServiceError::config(path, e))?;
        let provider = Self::from_yaml(&yaml).map_err(|e| ServiceError::config(path, e))?;
        info!("Loaded {} users from {}", provider.len(), path.display());
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserProvider for StaticUserProvider {
    fn get_user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).cloned()
    }

    fn get_user_by_token(&self, token: &str) -> Option<User> {
        self.token_index
            .get(token)
            .and_then(|id| self.users.get(id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = r#"
users:
  - id: "u1"
    token: "secret-1"
    name: "Ada"
    favorites: ["Blue in Green", "So What"]
  - id: "u2"
    name: "No Token"
"#;

    #[test]
    fn test_lookup_by_id_and_token() {
        let provider = StaticUserProvider::from_yaml(USERS).unwrap();
        assert_eq!(provider.len(), 2);

        let ada = provider.get_user_by_token("secret-1").unwrap();
        assert_eq!(ada.id, "u1");
        assert_eq!(ada.favorites, vec!["Blue in Green", "So What"]);

        assert_eq!(provider.get_user("u2").unwrap().name, "No Token");
        assert!(provider.get_user("u3").is_none());
    }

    #[test]
    fn test_empty_token_never_matches() {
        let provider = StaticUserProvider::from_yaml(USERS).unwrap();
        assert!(provider.get_user_by_token("").is_none());
        assert!(provider.get_user_by_token("guess").is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StaticUserProvider::load(dir.path().join("users.yaml")).unwrap_err();
        assert!(matches!(err, ServiceError::Config { .. }));
    }
}
