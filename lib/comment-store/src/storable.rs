//! Storable trait for database-agnostic storage operations.
//!
//! Rows travel between Rust values and the store as serde JSON objects.
//! `columns()` and `json_keys()` line up index for index, so a backend can
//! pull a value out of the serialized object by key and bind it to the
//! matching column.

/// Trait for types that can be stored in a database.
///
/// The primary key is an integer assigned by the store. It is listed in
/// `columns()` for reads but never bound on insert.
pub trait Storable: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync {
    /// The database table name for this type.
    fn table_name() -> &'static str;

    /// The store-assigned integer primary key column.
    fn id_column() -> &'static str;

    /// Column names in order, primary key included.
    fn columns() -> &'static [&'static str];

    /// Column types in order (database-agnostic).
    /// Used by executors to bind null values with the correct type.
    /// Values: "text", "datetime", "bigint", "integer", "boolean", "json"
    fn column_types() -> &'static [&'static str];

    /// JSON key names in order. Corresponds 1:1 with columns().
    fn json_keys() -> &'static [&'static str];

    /// `(column, json_key, column_type)` for every column written on insert.
    fn insert_fields() -> Vec<(&'static str, &'static str, &'static str)> {
        Self::columns()
            .iter()
            .zip(Self::json_keys())
            .zip(Self::column_types())
            .filter(|((column, _), _)| **column != Self::id_column())
            .map(|((column, key), ty)| (*column, *key, *ty))
            .collect()
    }
}
