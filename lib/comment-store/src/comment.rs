use serde::{Deserialize, Serialize};

use crate::{Storable, StorageDatetime};

pub const TABLE: &str = "comments";

pub const FIELD_ID: &str = "id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_CREATED: &str = "created";
pub const FIELD_UPDATED: &str = "updated";

const COLUMNS: &[&str] = &[FIELD_ID, FIELD_NAME, FIELD_TEXT, FIELD_CREATED, FIELD_UPDATED];

/// A stored comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Assigned by the store on insert; zero until then.
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub text: String,
    pub created: StorageDatetime,
    pub updated: StorageDatetime,
}

impl Storable for Comment {
    fn table_name() -> &'static str {
        TABLE
    }

    fn id_column() -> &'static str {
        FIELD_ID
    }

    fn columns() -> &'static [&'static str] {
        COLUMNS
    }

    fn column_types() -> &'static [&'static str] {
        &["bigint", "text", "text", "datetime", "datetime"]
    }

    fn json_keys() -> &'static [&'static str] {
        COLUMNS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_fields_skip_the_primary_key() {
        let fields = Comment::insert_fields();
        let columns: Vec<_> = fields.iter().map(|(column, _, _)| *column).collect();
        assert_eq!(columns, vec!["name", "text", "created", "updated"]);
        assert_eq!(fields[2].2, "datetime");
    }

    #[test]
    fn json_shape() {
        let at = StorageDatetime::from(chrono::DateTime::from_timestamp(0, 0).unwrap());
        let comment = Comment {
            id: 3,
            name: "job".to_string(),
            text: "hello".to_string(),
            created: at.clone(),
            updated: at,
        };
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 3,
                "name": "job",
                "text": "hello",
                "created": "1970-01-01T00:00:00.000000Z",
                "updated": "1970-01-01T00:00:00.000000Z",
            })
        );
    }
}
