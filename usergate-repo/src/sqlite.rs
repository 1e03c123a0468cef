//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use usergate_types::domain::STATUS_ACTIVE;
use usergate_types::{NewUser, RepoError, User, UserCredentials, UserRepository, UserStats};

use crate::query::Db;

const MIGRATIONS: [&str; 2] = [
    include_str!("../migrations/0001_create_users.sql"),
    include_str!("../migrations/0002_create_user_stats.sql"),
];

/// Connection-pool tuning and the per-query deadline.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub acquire_timeout: Duration,
    pub query_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 25,
            min_connections: 10,
            max_lifetime: Duration::from_secs(300),
            acquire_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// SQLite repository implementation.
#[derive(Debug, Clone)]
pub struct SqliteRepo {
    db: Db,
}

impl SqliteRepo {
    /// A single-connection in-memory database, migrated. For tests and demos.
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect(
            "sqlite::memory:",
            PoolSettings {
                max_connections: 1,
                min_connections: 1,
                ..PoolSettings::default()
            },
        )
        .await
    }

    pub async fn connect(database_url: &str, settings: PoolSettings) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections.min(settings.max_connections))
            .max_lifetime(settings.max_lifetime)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await?;

        for ddl in MIGRATIONS {
            sqlx::raw_sql(ddl).execute(&pool).await?;
        }

        tracing::info!(
            max_connections = settings.max_connections,
            query_timeout_ms = settings.query_timeout.as_millis() as u64,
            "database ready"
        );

        Ok(Self {
            db: Db::new(pool, settings.query_timeout),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub async fn close(&self) {
        self.db.pool().close().await;
        tracing::info!("database connection closed");
    }
}

#[async_trait]
impl UserRepository for SqliteRepo {
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, RepoError> {
        let found = self
            .db
            .find_one::<UserCredentials, _>(
                self.pool(),
                sqlx::query(
                    r#"SELECT uuid, id, username, email, status, avatar, password
                       FROM users WHERE email = ? LIMIT 1"#,
                )
                .bind(email),
            )
            .await;

        match found {
            Ok(creds) => Ok(Some(creds)),
            Err(RepoError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let db = self.db.clone();

        self.db
            .with_transaction(move |conn| {
                async move {
                    let id = db
                        .insert(
                            &mut *conn,
                            sqlx::query(
                                r#"INSERT INTO users (uuid, username, email, password, avatar, status)
                                   VALUES (?, ?, ?, ?, ?, ?)"#,
                            )
                            .bind(&user.uuid)
                            .bind(&user.username)
                            .bind(&user.email)
                            .bind(&user.password_hash)
                            .bind(&user.avatar)
                            .bind(STATUS_ACTIVE),
                        )
                        .await?;

                    db.exec(
                        &mut *conn,
                        sqlx::query("INSERT INTO user_stats (user_id, login_count) VALUES (?, 0)")
                            .bind(id),
                    )
                    .await?;

                    Ok(User {
                        uuid: user.uuid,
                        id,
                        username: user.username,
                        email: user.email,
                        status: STATUS_ACTIVE,
                        avatar: user.avatar,
                        ..Default::default()
                    })
                }
                .boxed()
            })
            .await
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError> {
        self.db
            .find_all(
                self.pool(),
                sqlx::query(
                    r#"SELECT uuid, id, username, email, status, avatar
                       FROM users ORDER BY id LIMIT ? OFFSET ?"#,
                )
                .bind(limit)
                .bind(offset),
            )
            .await
    }

    async fn stats_for_users(&self, user_ids: &[i64]) -> Result<Vec<UserStats>, RepoError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; user_ids.len()].join(", ");
        let sql = format!(
            "SELECT user_id, last_login, login_count FROM user_stats WHERE user_id IN ({placeholders})"
        );
        let query = user_ids
            .iter()
            .fold(sqlx::query(&sql), |query, id| query.bind(*id));

        self.db.find_all(self.pool(), query).await
    }

    async fn record_login(&self, user_id: i64, at: &str) -> Result<(), RepoError> {
        self.db
            .exec(
                self.pool(),
                sqlx::query(
                    r#"INSERT INTO user_stats (user_id, last_login, login_count) VALUES (?, ?, 1)
                       ON CONFLICT(user_id) DO UPDATE
                       SET last_login = excluded.last_login, login_count = login_count + 1"#,
                )
                .bind(user_id)
                .bind(at),
            )
            .await?;
        Ok(())
    }
}
