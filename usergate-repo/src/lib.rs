//! # Usergate Repository
//!
//! SQLite adapter implementing the `UserRepository` port, the generic
//! [`RowScanner`] that binds result rows into records by column name, the
//! timeout-bounded query helpers and password hashing.

pub mod query;
pub mod scanner;
pub mod security;
pub mod sqlite;


pub use query::Db;
pub use scanner::{RowScanner, ScanRow};
pub use sqlite::{PoolSettings, SqliteRepo};

/// Build and initialize a repository from a database URL.
///
/// Connects, applies the migrations and returns a ready-to-use repo.
///
/// ```ignore
/// let repo = build_repo("sqlite://data/usergate.db?mode=rwc", PoolSettings::default()).await?;
/// ```
pub async fn build_repo(database_url: &str, settings: PoolSettings) -> anyhow::Result<SqliteRepo> {
    SqliteRepo::connect(database_url, settings).await
}
