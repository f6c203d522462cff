//! User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user. Only the auth boundary looks at the credential hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Argon2id PHC string
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }

    /// Usernames are compared case-insensitively and stored trimmed + lowercase
    pub fn normalize_username(username: &str) -> String {
        username.trim().to_lowercase()
    }

    pub fn validate_username(username: &str) -> Result<(), &'static str> {
        let name = username.trim();
        if name.len() < 3 || name.len() > 32 {
            return Err("username must be 3 to 32 characters");
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err("username may only contain letters, digits, '_', '-' and '.'");
        }
        Ok(())
    }
}
