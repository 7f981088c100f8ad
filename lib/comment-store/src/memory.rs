//! In-memory implementation of QueryExecutor.
//!
//! Rows are kept as JSON objects keyed by column name, the same shape the
//! PostgreSQL backend binds from. Tables appear on first use; identifiers
//! come from a per-table sequence starting at 1.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json};
use thiserror::Error;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    Assignment, Filter, Order, Query, QueryExecutor, Storable, StorageError, TransactionExecutor,
    Update,
};

type Row = Map<String, Json>;

/// Raised when a write would duplicate a value under a unique constraint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("duplicate key value violates unique constraint \"{constraint}\"")]
pub struct UniqueViolation {
    pub constraint: String,
}

#[derive(Debug, Clone)]
struct Table {
    name: String,
    rows: BTreeMap<i64, Row>,
    next_id: i64,
    unique: Vec<Vec<String>>,
}

impl Table {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: BTreeMap::new(),
            next_id: 0,
            unique: Vec::new(),
        }
    }

    fn check_unique(&self, row: &Row, skip: Option<i64>) -> Result<(), StorageError> {
        for columns in &self.unique {
            let key: Vec<&Json> = columns
                .iter()
                .map(|c| row.get(c).unwrap_or(&Json::Null))
                .collect();
            // NULLs never collide
            if key.iter().any(|v| v.is_null()) {
                continue;
            }

            let clash = self.rows.iter().any(|(id, other)| {
                Some(*id) != skip
                    && columns
                        .iter()
                        .zip(&key)
                        .all(|(c, v)| other.get(c) == Some(*v))
            });
            if clash {
                return Err(StorageError::constraint(UniqueViolation {
                    constraint: format!("{}_{}_key", self.name, columns.join("_")),
                }));
            }
        }
        Ok(())
    }

    fn insert(&mut self, id_column: &str, mut row: Row) -> Result<i64, StorageError> {
        self.check_unique(&row, None)?;
        let id = self.next_id + 1;
        row.insert(id_column.to_string(), Json::from(id));
        self.rows.insert(id, row);
        self.next_id = id;
        Ok(id)
    }

    fn matching_ids(&self, filters: &[Filter]) -> Vec<i64> {
        self.rows
            .iter()
            .filter(|(_, row)| filters.iter().all(|f| matches_filter(row, f)))
            .map(|(id, _)| *id)
            .collect()
    }

    fn update(
        &mut self,
        sets: &[(String, Assignment)],
        filters: &[Filter],
    ) -> Result<u64, StorageError> {
        let ids = self.matching_ids(filters);
        let mut changed = Vec::with_capacity(ids.len());

        for id in &ids {
            let Some(current) = self.rows.get(id) else {
                continue;
            };
            let mut row = current.clone();
            for (column, assignment) in sets {
                assign(&mut row, column, assignment);
            }
            self.check_unique(&row, Some(*id))?;
            changed.push((*id, row));
        }

        let count = changed.len() as u64;
        for (id, row) in changed {
            self.rows.insert(id, row);
        }
        Ok(count)
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    tables: HashMap<String, Table>,
}

impl State {
    fn table_mut(&mut self, name: &str) -> &mut Table {
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| Table::new(name))
    }

    fn select<T: Storable + DeserializeOwned>(&self, query: &Query<T>) -> Result<Vec<T>, StorageError> {
        let Some(table) = self.tables.get(&query.table) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&Row> = table
            .rows
            .values()
            .filter(|row| query.filters.iter().all(|f| matches_filter(row, f)))
            .collect();

        rows.sort_by(|a, b| {
            for (field, order) in &query.order_by {
                let ordering = sort_cmp(a.get(field), b.get(field));
                let ordering = match order {
                    Order::Asc => ordering,
                    Order::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let limit = query.limit.map_or(usize::MAX, |l| l as usize);

        rows.into_iter()
            .take(limit)
            .map(row_to_item::<T>)
            .collect()
    }

    fn insert<T: Storable + Serialize>(&mut self, item: &T) -> Result<i64, StorageError> {
        let row = item_to_row(item)?;
        self.table_mut(T::table_name()).insert(T::id_column(), row)
    }

    fn insert_many<T: Storable + Serialize>(&mut self, items: &[T]) -> Result<Vec<i64>, StorageError> {
        let rows = items.iter().map(item_to_row).collect::<Result<Vec<_>, _>>()?;

        // Work on a copy so a failure part-way leaves the table untouched.
        let mut table = self.table_mut(T::table_name()).clone();
        let ids = rows
            .into_iter()
            .map(|row| table.insert(T::id_column(), row))
            .collect::<Result<Vec<_>, _>>()?;

        self.tables.insert(table.name.clone(), table);
        Ok(ids)
    }

    fn update<T: Storable>(&mut self, update: &Update<T>) -> Result<u64, StorageError> {
        match self.tables.get_mut(&update.table) {
            Some(table) => table.update(&update.sets, &update.filters),
            None => Ok(0),
        }
    }
}

/// Serialize an item into a row keyed by column, leaving out the primary key.
fn item_to_row<T: Storable + Serialize>(item: &T) -> Result<Row, StorageError> {
    let json = serde_json::to_value(item)?;
    let obj = json.as_object().ok_or_else(|| {
        StorageError::StorageError("Expected JSON object for Storable type".to_string())
    })?;

    let mut row = Row::new();
    for (column, json_key, _) in T::insert_fields() {
        row.insert(
            column.to_string(),
            obj.get(json_key).cloned().unwrap_or(Json::Null),
        );
    }
    Ok(row)
}

fn row_to_item<T: Storable + DeserializeOwned>(row: &Row) -> Result<T, StorageError> {
    let mut obj = Map::new();
    for (column, json_key) in T::columns().iter().zip(T::json_keys()) {
        match row.get(*column) {
            Some(value) if !value.is_null() => {
                obj.insert((*json_key).to_string(), value.clone());
            }
            _ => {}
        }
    }
    Ok(serde_json::from_value(Json::Object(obj))?)
}

/// SQL-style comparison: anything involving NULL is unknown.
fn compare(left: Option<&Json>, right: &Json) -> Option<Ordering> {
    match (left?, right) {
        (Json::Number(a), Json::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        // Timestamps are fixed-width RFC 3339, so string order is time order.
        (Json::String(a), Json::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn matches_filter(row: &Row, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(field, value) => {
            compare(row.get(field), &value.to_json()).is_some_and(Ordering::is_eq)
        }
    }
}

/// Apply one UPDATE assignment. `AtLeast` behaves like PostgreSQL's
/// `GREATEST`: a NULL stored value is replaced.
fn assign(row: &mut Row, column: &str, assignment: &Assignment) {
    match assignment {
        Assignment::To(value) => {
            row.insert(column.to_string(), value.to_json());
        }
        Assignment::AtLeast(value) => {
            let value = value.to_json();
            if compare(row.get(column), &value) != Some(Ordering::Greater) {
                row.insert(column.to_string(), value);
            }
        }
    }
}

/// Ascending order with NULLs last, as PostgreSQL sorts them.
fn sort_cmp(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare(Some(a), b).unwrap_or(Ordering::Equal),
    }
}

/// Process-local store implementing [`QueryExecutor`].
///
/// Clones share the same tables.
#[derive(Clone, Debug, Default)]
pub struct MemoryExecutor {
    state: Arc<RwLock<State>>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would repeat a value combination across `columns`.
    pub async fn add_unique_constraint(&self, table: &str, columns: &[&str]) {
        let mut state = self.state.write().await;
        state
            .table_mut(table)
            .unique
            .push(columns.iter().map(|c| c.to_string()).collect());
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    type Transaction = MemoryTransaction;

    async fn fetch<T: Storable + DeserializeOwned + Send>(
        &self,
        query: Query<T>,
    ) -> Result<Vec<T>, StorageError> {
        self.state.read().await.select(&query)
    }

    async fn insert<T: Storable + Serialize + Send + Sync>(
        &self,
        item: &T,
    ) -> Result<i64, StorageError> {
        self.state.write().await.insert(item)
    }

    async fn insert_many<T: Storable + Serialize + Send + Sync>(
        &self,
        items: &[T],
    ) -> Result<Vec<i64>, StorageError> {
        self.state.write().await.insert_many(items)
    }

    async fn update<T: Storable + Send>(&self, update: Update<T>) -> Result<u64, StorageError> {
        self.state.write().await.update(&update)
    }

    async fn begin_transaction(&self) -> Result<Self::Transaction, StorageError> {
        let guard = Arc::clone(&self.state).write_owned().await;
        let working = State::clone(&guard);
        Ok(MemoryTransaction { guard, working })
    }
}

/// Holds the store's write lock until commit or rollback; writes go to a
/// private copy that replaces the shared state on commit.
pub struct MemoryTransaction {
    guard: OwnedRwLockWriteGuard<State>,
    working: State,
}

#[async_trait]
impl TransactionExecutor for MemoryTransaction {
    async fn fetch<T: Storable + DeserializeOwned + Send>(
        &mut self,
        query: Query<T>,
    ) -> Result<Vec<T>, StorageError> {
        self.working.select(&query)
    }

    async fn update<T: Storable + Send>(
        &mut self,
        update: Update<T>,
    ) -> Result<u64, StorageError> {
        self.working.update(&update)
    }

    async fn commit(self) -> Result<(), StorageError> {
        let MemoryTransaction { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        Ok(())
    }
}
