//! Query helpers: every statement runs under the configured timeout, rows
//! are bound through the shared [`RowScanner`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};

use usergate_types::RepoError;
use usergate_types::binding::Record;

use crate::scanner::RowScanner;

pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Pool handle plus the per-query deadline. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
    query_timeout: Duration,
    scanner: Arc<RowScanner>,
}

impl Db {
    pub fn new(pool: SqlitePool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
            scanner: Arc::new(RowScanner::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Executes an INSERT and returns the new row id.
    pub async fn insert<'q, 'c, E>(&self, executor: E, query: SqliteQuery<'q>) -> Result<i64, RepoError>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        let result = self
            .bounded(async { query.execute(executor).await.map_err(map_db_err) })
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Executes a statement and returns the number of affected rows.
    pub async fn exec<'q, 'c, E>(&self, executor: E, query: SqliteQuery<'q>) -> Result<u64, RepoError>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        let result = self
            .bounded(async { query.execute(executor).await.map_err(map_db_err) })
            .await?;
        Ok(result.rows_affected())
    }

    /// Binds the first row. No row is `RepoError::NotFound`.
    pub async fn find_one<'q, 'c, T, E>(&self, executor: E, query: SqliteQuery<'q>) -> Result<T, RepoError>
    where
        T: Record,
        E: Executor<'c, Database = Sqlite>,
    {
        self.bounded(self.scanner.one(query.fetch(executor))).await
    }

    pub async fn find_all<'q, 'c, T, E>(
        &self,
        executor: E,
        query: SqliteQuery<'q>,
    ) -> Result<Vec<T>, RepoError>
    where
        T: Record,
        E: Executor<'c, Database = Sqlite>,
    {
        self.bounded(self.scanner.all(query.fetch(executor))).await
    }

    /// Runs `f` inside a transaction. Commits only when `f` succeeds;
    /// any error rolls back and is returned unchanged.
    pub async fn with_transaction<T, F>(&self, f: F) -> Result<T, RepoError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, RepoError>> + Send,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| RepoError::Transaction(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, RepoError>
    where
        F: Future<Output = Result<T, RepoError>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(timeout_ms = self.query_timeout.as_millis() as u64, "database query timed out");
                Err(RepoError::Timeout)
            }
        }
    }
}

/// Unique violations become `Conflict`; everything else is a plain database error.
pub(crate) fn map_db_err(e: sqlx::Error) -> RepoError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => RepoError::Conflict(db.message().to_string()),
        _ => RepoError::Database(e.to_string()),
    }
}
