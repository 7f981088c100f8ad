//! Database-agnostic query builder.
//!
//! Queries are plain data; each backend translates them (PostgreSQL into
//! parameterized SQL, the in-memory executor into row scans).

use crate::{Storable, StorageDatetime, StorageError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// A value that can be bound to a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Datetime(StorageDatetime),
}

impl Value {
    /// The JSON form of this value, as it appears in a serialized row.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Datetime(dt) => serde_json::Value::String(dt.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<StorageDatetime> for Value {
    fn from(dt: StorageDatetime) -> Self {
        Value::Datetime(dt)
    }
}

impl From<&StorageDatetime> for Value {
    fn from(dt: &StorageDatetime) -> Self {
        Value::Datetime(dt.clone())
    }
}

/// Filter conditions for queries.
#[derive(Debug, Clone)]
pub enum Filter {
    /// field = value
    Eq(String, Value),
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A SELECT query builder.
#[derive(Debug, Clone)]
pub struct Query<T> {
    /// The table to query.
    pub table: String,
    /// Filter conditions, all of which must hold.
    pub filters: Vec<Filter>,
    /// Order by clauses.
    pub order_by: Vec<(String, Order)>,
    /// Maximum number of results.
    pub limit: Option<u64>,
    pub(crate) _marker: PhantomData<T>,
}

impl<T: Storable> Query<T> {
    /// Create a new query for the type's table.
    pub fn new() -> Self {
        Self {
            table: T::table_name().to_string(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            _marker: PhantomData,
        }
    }

    /// Add an equality filter.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    /// Add an order-by clause.
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    /// Set the maximum number of results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl<T: Storable> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The new value of a column in an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// column = value
    To(Value),
    /// column = the larger of its stored value and `value`, compared by the
    /// store at write time
    AtLeast(Value),
}

/// An UPDATE query builder.
#[derive(Debug, Clone)]
pub struct Update<T> {
    /// The table to update.
    pub table: String,
    /// Column assignments, in order.
    pub sets: Vec<(String, Assignment)>,
    /// Filter conditions.
    pub filters: Vec<Filter>,
    pub(crate) _marker: PhantomData<T>,
}

impl<T: Storable> Update<T> {
    pub fn new() -> Self {
        Self {
            table: T::table_name().to_string(),
            sets: Vec::new(),
            filters: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Assign a column.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((field.into(), Assignment::To(value.into())));
        self
    }

    /// Raise a column to `value`, leaving it alone if it already holds more.
    pub fn set_at_least(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((field.into(), Assignment::AtLeast(value.into())));
        self
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }
}

impl<T: Storable> Default for Update<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for executing queries against a database backend.
///
/// Write operations translate uniqueness and foreign-key violations into
/// [`StorageError::Constraint`]; every other backend failure surfaces as
/// [`StorageError::StorageError`].
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// The transaction type for this executor.
    type Transaction: TransactionExecutor;

    /// Execute a SELECT query and return results.
    async fn fetch<T: Storable + DeserializeOwned + Send>(
        &self,
        query: Query<T>,
    ) -> Result<Vec<T>, StorageError>;

    /// Execute a SELECT query and return at most one result.
    async fn fetch_optional<T: Storable + DeserializeOwned + Send>(
        &self,
        query: Query<T>,
    ) -> Result<Option<T>, StorageError> {
        let results = self.fetch(query.limit(1)).await?;
        Ok(results.into_iter().next())
    }

    /// Insert one row and return the identifier the store assigned to it.
    async fn insert<T: Storable + serde::Serialize + Send + Sync>(
        &self,
        item: &T,
    ) -> Result<i64, StorageError>;

    /// Insert all rows atomically, returning their identifiers in input order.
    ///
    /// Either every row is persisted or none is.
    async fn insert_many<T: Storable + serde::Serialize + Send + Sync>(
        &self,
        items: &[T],
    ) -> Result<Vec<i64>, StorageError>;

    /// Execute an UPDATE and return the number of rows affected.
    async fn update<T: Storable + Send>(&self, update: Update<T>) -> Result<u64, StorageError>;

    /// Begin a transaction. The returned executor can be used for queries within the transaction.
    async fn begin_transaction(&self) -> Result<Self::Transaction, StorageError>;
}

/// Trait for executing queries within a transaction.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Execute a SELECT query within the transaction.
    async fn fetch<T: Storable + DeserializeOwned + Send>(
        &mut self,
        query: Query<T>,
    ) -> Result<Vec<T>, StorageError>;

    /// Execute an UPDATE within the transaction.
    async fn update<T: Storable + Send>(&mut self, update: Update<T>)
    -> Result<u64, StorageError>;

    /// Commit the transaction.
    async fn commit(self) -> Result<(), StorageError>;

    /// Rollback the transaction.
    async fn rollback(self) -> Result<(), StorageError>;
}
