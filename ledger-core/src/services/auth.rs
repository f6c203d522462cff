//! Auth service - registration and credential checks
//!
//! Produces the verified user id the rest of the library treats as an
//! opaque ownership token. Passwords are stored as Argon2id PHC strings.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;

use crate::domain::result::{Error, Result};
use crate::domain::User;
use crate::ports::UserRepository;

const MIN_PASSWORD_LEN: usize = 8;

pub struct AuthService {
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Create a user with a freshly salted password hash
    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        User::validate_username(username).map_err(Error::validation)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let username = User::normalize_username(username);
        if self.users.get_user_by_username(&username).await?.is_some() {
            return Err(Error::UsernameTaken(username));
        }

        let user = User::new(username, hash_password(password)?);
        self.users.create_user(&user).await?;
        Ok(user)
    }

    /// Verify credentials. Unknown users and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let username = User::normalize_username(username);
        let user = self
            .users
            .get_user_by_username(&username)
            .await?
            .ok_or(Error::InvalidCredentials)?;
        verify_password(password, &user.password_hash)?;
        Ok(user)
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt_bytes: [u8; 16] = rand::thread_rng().gen();
    hash_with_salt(password, &salt_bytes)
}

/// Failures here are internal faults, never the caller's input
fn hash_with_salt(password: &str, salt_bytes: &[u8]) -> Result<String> {
    let salt = SaltString::encode_b64(salt_bytes)
        .map_err(|e| Error::Credential(format!("Failed to encode salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Credential(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> Result<()> {
    let parsed = PasswordHash::new(stored).map_err(|_| Error::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| Error::InvalidCredentials)
}
