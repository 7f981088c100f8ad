//! PostgreSQL implementation of QueryExecutor.

const DEFAULT_MAX_CONNECTIONS: u32 = 16;

use async_trait::async_trait;
use comment_store::{
    Assignment, Filter, Order, Query, QueryExecutor, Storable, StorageError, TransactionExecutor,
    Update, Value,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{Arguments, Postgres, Transaction};
use std::ops::Deref;

use crate::error::{bind_error, storage_error};
use crate::{bind_insert_values, deserialize_row, returned_ids, rows_per_statement};

/// Wrapper around sqlx::PgPool that implements QueryExecutor.
#[derive(Clone, Debug)]
pub struct PgPool(sqlx::PgPool);

impl PgPool {
    /// Create a new PgPool from an sqlx PgPool.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self(pool)
    }

    /// Connect to a PostgreSQL database.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(url)
            .await
            .map_err(storage_error)?;
        Ok(Self(pool))
    }

    /// Get the inner sqlx::PgPool.
    pub fn inner(&self) -> &sqlx::PgPool {
        &self.0
    }
}

impl Deref for PgPool {
    type Target = sqlx::PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Build a WHERE clause from filters, numbering placeholders from `start_param`.
fn build_where_clause(filters: &[Filter], start_param: usize) -> String {
    if filters.is_empty() {
        return String::new();
    }

    let mut param_idx = start_param;
    let mut placeholder = || {
        let p = format!("${}", param_idx);
        param_idx += 1;
        p
    };

    let clauses: Vec<String> = filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(field, _) => format!("{} = {}", field, placeholder()),
        })
        .collect();

    format!(" WHERE {}", clauses.join(" AND "))
}

/// Bind filter values to PgArguments.
fn bind_filters(args: &mut PgArguments, filters: &[Filter]) -> Result<(), StorageError> {
    for filter in filters {
        match filter {
            Filter::Eq(_, value) => bind_value(args, value)?,
        }
    }
    Ok(())
}

/// Bind a Value to PgArguments.
fn bind_value(args: &mut PgArguments, value: &Value) -> Result<(), StorageError> {
    match value {
        Value::String(s) => args.add(s.clone()),
        Value::Int(n) => args.add(*n),
        Value::Datetime(dt) => args.add(*dt.inner()),
    }
    .map_err(bind_error)
}

/// Build ORDER BY clause.
fn build_order_clause(order_by: &[(String, Order)]) -> String {
    if order_by.is_empty() {
        return String::new();
    }

    let clauses: Vec<String> = order_by
        .iter()
        .map(|(field, order)| {
            let dir = match order {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            format!("{} {}", field, dir)
        })
        .collect();

    format!(" ORDER BY {}", clauses.join(", "))
}

fn build_select_sql<T>(query: &Query<T>) -> String {
    let mut sql = format!(
        "SELECT * FROM {}{}{}",
        query.table,
        build_where_clause(&query.filters, 1),
        build_order_clause(&query.order_by)
    );

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql
}

fn select_args<T>(query: &Query<T>) -> Result<PgArguments, StorageError> {
    let mut args = PgArguments::default();
    bind_filters(&mut args, &query.filters)?;
    Ok(args)
}

/// SET placeholders come first, then the WHERE placeholders.
fn build_update_sql<T>(update: &Update<T>) -> String {
    let sets: Vec<String> = update
        .sets
        .iter()
        .enumerate()
        .map(|(i, (field, assignment))| match assignment {
            Assignment::To(_) => format!("{} = ${}", field, i + 1),
            Assignment::AtLeast(_) => format!("{0} = GREATEST({0}, ${1})", field, i + 1),
        })
        .collect();

    format!(
        "UPDATE {} SET {}{}",
        update.table,
        sets.join(", "),
        build_where_clause(&update.filters, update.sets.len() + 1)
    )
}

fn update_args<T>(update: &Update<T>) -> Result<PgArguments, StorageError> {
    let mut args = PgArguments::default();
    for (_, assignment) in &update.sets {
        match assignment {
            Assignment::To(value) | Assignment::AtLeast(value) => bind_value(&mut args, value)?,
        }
    }
    bind_filters(&mut args, &update.filters)?;
    Ok(args)
}

fn single_id(ids: Vec<i64>) -> Result<i64, StorageError> {
    ids.into_iter()
        .next()
        .ok_or_else(|| StorageError::StorageError("INSERT returned no id".to_string()))
}

#[async_trait]
impl QueryExecutor for PgPool {
    type Transaction = PgTransaction;

    async fn fetch<T: Storable + DeserializeOwned + Send>(
        &self,
        query: Query<T>,
    ) -> Result<Vec<T>, StorageError> {
        let sql = build_select_sql(&query);
        let args = select_args(&query)?;

        let rows = sqlx::query_with(&sql, args)
            .fetch_all(&self.0)
            .await
            .map_err(storage_error)?;

        rows.iter().map(|row| deserialize_row::<T>(row)).collect()
    }

    async fn insert<T: Storable + Serialize + Send + Sync>(
        &self,
        item: &T,
    ) -> Result<i64, StorageError> {
        single_id(self.insert_many(std::slice::from_ref(item)).await?)
    }

    async fn insert_many<T: Storable + Serialize + Send + Sync>(
        &self,
        items: &[T],
    ) -> Result<Vec<i64>, StorageError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let per_statement = rows_per_statement(T::insert_fields().len());
        if items.len() <= per_statement {
            // A single multi-row statement is atomic on its own.
            let (sql, args) = bind_insert_values(items)?;
            let rows = sqlx::query_with(&sql, args)
                .fetch_all(&self.0)
                .await
                .map_err(storage_error)?;
            return returned_ids::<T>(&rows);
        }

        // Too many parameters for one statement: chunk inside a transaction.
        let mut tx = self.0.begin().await.map_err(storage_error)?;
        let mut ids = Vec::with_capacity(items.len());
        for chunk in items.chunks(per_statement) {
            let (sql, args) = bind_insert_values(chunk)?;
            let rows = sqlx::query_with(&sql, args)
                .fetch_all(&mut *tx)
                .await
                .map_err(storage_error)?;
            ids.extend(returned_ids::<T>(&rows)?);
        }
        tx.commit().await.map_err(storage_error)?;
        Ok(ids)
    }

    async fn update<T: Storable + Send>(&self, update: Update<T>) -> Result<u64, StorageError> {
        let sql = build_update_sql(&update);
        let args = update_args(&update)?;

        let result = sqlx::query_with(&sql, args)
            .execute(&self.0)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected())
    }

    async fn begin_transaction(&self) -> Result<Self::Transaction, StorageError> {
        let tx = self.0.begin().await.map_err(storage_error)?;
        Ok(PgTransaction { tx })
    }
}

/// PostgreSQL transaction wrapper implementing TransactionExecutor.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TransactionExecutor for PgTransaction {
    async fn fetch<T: Storable + DeserializeOwned + Send>(
        &mut self,
        query: Query<T>,
    ) -> Result<Vec<T>, StorageError> {
        let sql = build_select_sql(&query);
        let args = select_args(&query)?;

        let rows = sqlx::query_with(&sql, args)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage_error)?;

        rows.iter().map(|row| deserialize_row::<T>(row)).collect()
    }

    async fn update<T: Storable + Send>(
        &mut self,
        update: Update<T>,
    ) -> Result<u64, StorageError> {
        let sql = build_update_sql(&update);
        let args = update_args(&update)?;

        let result = sqlx::query_with(&sql, args)
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await.map_err(storage_error)
    }

    async fn rollback(self) -> Result<(), StorageError> {
        self.tx.rollback().await.map_err(storage_error)
    }
}
