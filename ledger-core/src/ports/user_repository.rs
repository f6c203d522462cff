//! User repository port - storage behind the auth boundary

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::User;

/// Users are append-only. There is no update or delete: accounts keep their
/// owner's id without a cascade, so removing a user would orphan them.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user; fails with `UsernameTaken` on a duplicate username
    async fn create_user(&self, user: &User) -> Result<()>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn list_users(&self) -> Result<Vec<User>>;
}
