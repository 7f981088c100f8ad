//! Serde-based binding for PostgreSQL queries.
//!
//! This module binds Storable types to PostgreSQL queries through their serde
//! JSON form, so no per-type SQL code is needed.

use comment_store::{Storable, StorageError};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sqlx::{Arguments, Column, Row, postgres::PgArguments, postgres::PgRow};

use crate::error::bind_error;

/// PostgreSQL accepts at most this many bind parameters in one statement.
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// How many rows of `width` bound columns fit in one INSERT.
pub fn rows_per_statement(width: usize) -> usize {
    (MAX_BIND_PARAMETERS / width.max(1)).max(1)
}

/// Build a multi-row INSERT for `rows` rows that returns the assigned ids.
///
/// Placeholders are numbered row by row: `($1, $2), ($3, $4)`.
pub fn build_insert_sql(table: &str, columns: &[&str], rows: usize, id_column: &str) -> String {
    let width = columns.len();
    let values: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {} RETURNING {}",
        table,
        columns.join(", "),
        values.join(", "),
        id_column
    )
}

/// Build the INSERT statement and its arguments for a batch of items.
///
/// Serializes each item to JSON and binds its values in column order
/// (matching `Storable::insert_fields()`).
pub fn bind_insert_values<T: Storable + Serialize>(
    items: &[T],
) -> Result<(String, PgArguments), StorageError> {
    let fields = T::insert_fields();
    let mut args = PgArguments::default();

    for item in items {
        let json = serde_json::to_value(item)?;
        let obj = json.as_object().ok_or_else(|| {
            StorageError::StorageError("Expected JSON object for Storable type".to_string())
        })?;

        for (_, json_key, col_type) in &fields {
            let value = obj.get(*json_key).cloned().unwrap_or(Value::Null);
            bind_json_value(&mut args, &value, col_type)?;
        }
    }

    let columns: Vec<&str> = fields.iter().map(|(column, _, _)| *column).collect();
    let sql = build_insert_sql(T::table_name(), &columns, items.len(), T::id_column());
    Ok((sql, args))
}

/// Read the id column from rows returned by an INSERT ... RETURNING.
pub fn returned_ids<T: Storable>(rows: &[PgRow]) -> Result<Vec<i64>, StorageError> {
    rows.iter()
        .map(|row| {
            row.try_get::<i64, _>(T::id_column())
                .map_err(|e| StorageError::StorageError(e.to_string()))
        })
        .collect()
}

/// Deserialize a PostgreSQL row to a Storable type.
///
/// Extracts column values from the row using columns() and inserts them
/// into JSON using json_keys() to match serde's field naming.
/// Null values are omitted to match serde's skip_serializing_if behavior.
pub fn deserialize_row<T: Storable + DeserializeOwned>(row: &PgRow) -> Result<T, StorageError> {
    let mut obj = serde_json::Map::new();
    let columns = T::columns();
    let json_keys = T::json_keys();

    for (col_name, json_key) in columns.iter().zip(json_keys.iter()) {
        let value = extract_column_value(row, col_name)?;
        // Skip null values to match serde's skip_serializing_if behavior
        if !value.is_null() {
            obj.insert((*json_key).to_string(), value);
        }
    }

    serde_json::from_value(Value::Object(obj))
        .map_err(|e| StorageError::StorageError(format!("Deserialization error: {}", e)))
}

/// Bind a JSON value to PgArguments
fn bind_json_value(args: &mut PgArguments, value: &Value, col_type: &str) -> Result<(), StorageError> {
    match value {
        Value::Null => {
            // Use column type to bind the correct null type
            match col_type {
                "datetime" => args.add(None::<chrono::DateTime<chrono::Utc>>),
                "bigint" => args.add(None::<i64>),
                "integer" => args.add(None::<i32>),
                "boolean" => args.add(None::<bool>),
                "json" => args.add(None::<Value>),
                _ => args.add(None::<String>), // text and default
            }
            .map_err(bind_error)?;
        }
        Value::Bool(b) => {
            args.add(*b).map_err(bind_error)?;
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                args.add(i).map_err(bind_error)?;
            } else if let Some(f) = n.as_f64() {
                args.add(f).map_err(bind_error)?;
            } else {
                // Fallback: store as string
                args.add(n.to_string()).map_err(bind_error)?;
            }
        }
        Value::String(s) => {
            if col_type == "datetime" {
                // Parse and bind as timestamptz
                let dt = chrono::DateTime::parse_from_rfc3339(s)
                    .map_err(|e| StorageError::StorageError(format!("Invalid datetime: {}", e)))?;
                args.add(dt.with_timezone(&chrono::Utc))
                    .map_err(bind_error)?;
            } else {
                args.add(s.clone()).map_err(bind_error)?;
            }
        }
        Value::Array(_) | Value::Object(_) => {
            // Store complex types as JSONB
            args.add(value.clone()).map_err(bind_error)?;
        }
    }

    Ok(())
}

/// Extract a column value from a row as JSON
fn extract_column_value(row: &PgRow, col_name: &str) -> Result<Value, StorageError> {
    use sqlx::TypeInfo;

    let col = row
        .columns()
        .iter()
        .find(|c| c.name() == col_name)
        .ok_or_else(|| StorageError::StorageError(format!("Column not found: {}", col_name)))?;
    let col_idx = col.ordinal();
    let type_name = col.type_info().name();

    let value = match type_name {
        "BOOL" => {
            let v: Option<bool> = row
                .try_get(col_idx)
                .map_err(|e| StorageError::StorageError(e.to_string()))?;
            v.map(Value::Bool).unwrap_or(Value::Null)
        }
        "INT8" => {
            let v: Option<i64> = row
                .try_get(col_idx)
                .map_err(|e| StorageError::StorageError(e.to_string()))?;
            v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null)
        }
        "INT4" => {
            let v: Option<i32> = row
                .try_get(col_idx)
                .map_err(|e| StorageError::StorageError(e.to_string()))?;
            v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null)
        }
        "TIMESTAMPTZ" => {
            let v: Option<chrono::DateTime<chrono::Utc>> = row
                .try_get(col_idx)
                .map_err(|e| StorageError::StorageError(e.to_string()))?;
            // Use microsecond precision with Z to match StorageDatetime's serde format
            v.map(|dt| Value::String(dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)))
                .unwrap_or(Value::Null)
        }
        "JSONB" | "JSON" => {
            let v: Option<Value> = row
                .try_get(col_idx)
                .map_err(|e| StorageError::StorageError(e.to_string()))?;
            v.unwrap_or(Value::Null)
        }
        _ => {
            // Default: treat as string (VARCHAR, TEXT, CHAR, etc.)
            let v: Option<String> = row
                .try_get(col_idx)
                .map_err(|e| StorageError::StorageError(e.to_string()))?;
            v.map(Value::String).unwrap_or(Value::Null)
        }
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use comment_store::{Comment, StorageDatetime};

    #[test]
    fn single_row_insert_returns_id() {
        let sql = build_insert_sql("comments", &["name", "text"], 1, "id");
        assert_eq!(
            sql,
            "INSERT INTO comments (name, text) VALUES ($1, $2) RETURNING id"
        );
    }

    #[test]
    fn multi_row_placeholders_continue_across_rows() {
        let sql = build_insert_sql("comments", &["name", "text", "created"], 2, "id");
        assert_eq!(
            sql,
            "INSERT INTO comments (name, text, created) VALUES ($1, $2, $3), ($4, $5, $6) RETURNING id"
        );
    }

    #[test]
    fn comment_rows_fit_under_the_parameter_limit() {
        let rows = rows_per_statement(Comment::insert_fields().len());
        assert_eq!(rows, 16_383);
        assert!(rows * 4 <= MAX_BIND_PARAMETERS);
        assert!((rows + 1) * 4 > MAX_BIND_PARAMETERS);
    }

    #[test]
    fn comment_batch_binds_four_columns_per_row() {
        let at = StorageDatetime::now();
        let comment = Comment {
            id: 0,
            name: "job".to_string(),
            text: "hello".to_string(),
            created: at.clone(),
            updated: at,
        };

        let (sql, _args) = bind_insert_values(&[comment.clone(), comment]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO comments (name, text, created, updated) VALUES ($1, $2, $3, $4), ($5, $6, $7, $8) RETURNING id"
        );
    }
}
