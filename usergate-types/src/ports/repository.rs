//! Repository port trait.
//!
//! The SQLite adapter in `usergate-repo` implements this; service tests use
//! an in-memory mock.

use crate::domain::{NewUser, User, UserCredentials, UserStats};
use crate::error::RepoError;

/// Persistence operations for users and their login statistics.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Looks up a user and its password hash by email.
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, RepoError>;

    /// Inserts a user. A duplicate email or username is a `Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;

    /// One page of users ordered by id.
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError>;

    /// Stats for the given users, fetched in a single batched query.
    /// Users without a stats row are absent from the result.
    async fn stats_for_users(&self, user_ids: &[i64]) -> Result<Vec<UserStats>, RepoError>;

    /// Bumps the login counter and stamps `last_login` (RFC 3339).
    async fn record_login(&self, user_id: i64, at: &str) -> Result<(), RepoError>;
}
