//! Binds SQL result rows into [`Record`] types by column name.

use std::sync::Arc;

use futures::{Stream, TryStreamExt};
use sqlx::{Column, ColumnIndex, Decode, Row, Type};

use usergate_types::binding::{BindingPlan, FieldKind, PlanCache, Record, Source, SourceValue};
use usergate_types::RepoError;

/// A row whose columns can be read as the scalar kinds records declare.
///
/// Implemented for every `sqlx` row type whose database decodes nullable
/// text, integers and booleans.
pub trait ScanRow: Row {
    fn source_value(&self, index: usize, kind: FieldKind) -> Result<SourceValue, sqlx::Error>;
}

impl<R> ScanRow for R
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> Option<String>: Decode<'r, R::Database>,
    for<'r> Option<i32>: Decode<'r, R::Database>,
    for<'r> Option<i64>: Decode<'r, R::Database>,
    for<'r> Option<bool>: Decode<'r, R::Database>,
    Option<String>: Type<R::Database>,
    Option<i32>: Type<R::Database>,
    Option<i64>: Type<R::Database>,
    Option<bool>: Type<R::Database>,
{
    fn source_value(&self, index: usize, kind: FieldKind) -> Result<SourceValue, sqlx::Error> {
        let value = match kind {
            FieldKind::Str | FieldKind::OptStr => self
                .try_get::<Option<String>, _>(index)?
                .map(SourceValue::Str),
            FieldKind::I32 => self
                .try_get::<Option<i32>, _>(index)?
                .map(|v| SourceValue::Int(i64::from(v))),
            FieldKind::I64 => self.try_get::<Option<i64>, _>(index)?.map(SourceValue::Int),
            FieldKind::Bool => self.try_get::<Option<bool>, _>(index)?.map(SourceValue::Bool),
            FieldKind::File => None,
        };
        Ok(value.unwrap_or(SourceValue::Null))
    }
}

/// Maps row streams onto records, caching one plan per column signature.
#[derive(Debug, Default)]
pub struct RowScanner {
    plans: PlanCache,
}

impl RowScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plans(&self) -> &PlanCache {
        &self.plans
    }

    /// Binds the first row. An empty stream is `NotFound`.
    pub async fn one<T, R, S>(&self, rows: S) -> Result<T, RepoError>
    where
        T: Record,
        R: ScanRow,
        S: Stream<Item = Result<R, sqlx::Error>>,
    {
        let mut rows = std::pin::pin!(rows);
        match rows.try_next().await.map_err(db_err)? {
            Some(row) => bind_row(&self.plan_for::<T, R>(&row), &row),
            None => Err(RepoError::NotFound),
        }
    }

    /// Binds every row in source order. The first failure aborts the scan.
    ///
    /// Every row of one stream shares its columns, so the plan is resolved
    /// from the first row only.
    pub async fn all<T, R, S>(&self, rows: S) -> Result<Vec<T>, RepoError>
    where
        T: Record,
        R: ScanRow,
        S: Stream<Item = Result<R, sqlx::Error>>,
    {
        let mut rows = std::pin::pin!(rows);
        let mut out = Vec::new();
        let mut plan = None;
        while let Some(row) = rows.try_next().await.map_err(db_err)? {
            let plan = plan.get_or_insert_with(|| self.plan_for::<T, R>(&row));
            out.push(bind_row(plan, &row)?);
        }
        Ok(out)
    }

    /// Like [`RowScanner::all`], handing out each record boxed.
    pub async fn all_boxed<T, R, S>(&self, rows: S) -> Result<Vec<Box<T>>, RepoError>
    where
        T: Record,
        R: ScanRow,
        S: Stream<Item = Result<R, sqlx::Error>>,
    {
        let records = self.all::<T, R, S>(rows).await?;
        Ok(records.into_iter().map(Box::new).collect())
    }

    fn plan_for<T: Record, R: ScanRow>(&self, row: &R) -> Arc<BindingPlan> {
        let names: Vec<&str> = row.columns().iter().map(|c| c.name()).collect();
        self.plans.plan_for::<T, _>(Source::Column, names.as_slice())
    }
}

fn bind_row<T: Record, R: ScanRow>(plan: &BindingPlan, row: &R) -> Result<T, RepoError> {
    let values = (0..plan.arity())
        .map(|position| match plan.target(position) {
            Some(index) => row.source_value(position, T::FIELDS[index].kind),
            None => Ok(SourceValue::Null),
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;

    let mut record = T::default();
    plan.apply(&mut record, values)?;
    Ok(record)
}

fn db_err(e: sqlx::Error) -> RepoError {
    RepoError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;
    use usergate_types::{User, UserStats};

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE t (id INTEGER, uuid TEXT, username TEXT, email TEXT, status INTEGER, avatar TEXT, extra TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO t VALUES (1, 'u-1', 'alice', 'a@x.io', 1, NULL, 'zzz'), (2, 'u-2', 'bob', 'b@x.io', 2, 'users/avatar/b.png', NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_binds_by_column_name_not_position() {
        let pool = pool().await;
        let scanner = RowScanner::new();

        let users: Vec<User> = scanner
            .all(sqlx::query("SELECT extra, status, email, username, uuid, id FROM t ORDER BY id").fetch(&pool))
            .await
            .unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, 1);
        assert_eq!(users[0].username, "alice");
        assert_eq!(users[1].status, 2);
        assert_eq!(users[1].uuid, "u-2");
    }

    #[tokio::test]
    async fn test_null_column_leaves_option_empty() {
        let pool = pool().await;
        let scanner = RowScanner::new();

        let users: Vec<Box<User>> = scanner
            .all_boxed(sqlx::query("SELECT id, avatar FROM t ORDER BY id").fetch(&pool))
            .await
            .unwrap();

        assert_eq!(users[0].avatar, None);
        assert_eq!(users[1].avatar.as_deref(), Some("users/avatar/b.png"));
    }

    #[tokio::test]
    async fn test_one_on_empty_stream_is_not_found() {
        let pool = pool().await;
        let scanner = RowScanner::new();

        let result: Result<User, _> = scanner
            .one(sqlx::query("SELECT id FROM t WHERE id = 99").fetch(&pool))
            .await;

        assert!(matches!(result, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_zero_rows_is_empty_vec() {
        let pool = pool().await;
        let scanner = RowScanner::new();

        let stats: Vec<UserStats> = scanner
            .all(sqlx::query("SELECT id AS user_id FROM t WHERE id > 5").fetch(&pool))
            .await
            .unwrap();

        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn test_one_plan_per_stream() {
        let pool = pool().await;
        let scanner = RowScanner::new();

        let users: Vec<User> = scanner
            .all(sqlx::query("SELECT id, username FROM t ORDER BY id").fetch(&pool))
            .await
            .unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[1].username, "bob");
        assert_eq!(scanner.plans().len(), 1);
    }

    #[tokio::test]
    async fn test_plan_reused_per_signature() {
        let pool = pool().await;
        let scanner = RowScanner::new();

        for _ in 0..3 {
            let _: Vec<User> = scanner
                .all(sqlx::query("SELECT id, uuid FROM t").fetch(&pool))
                .await
                .unwrap();
        }
        let _: Vec<User> = scanner
            .all(sqlx::query("SELECT uuid, id FROM t").fetch(&pool))
            .await
            .unwrap();

        assert_eq!(scanner.plans().len(), 2);
        scanner.plans().invalidate::<User>();
        assert!(scanner.plans().is_empty());
    }
}
