use thiserror::Error;

use crate::StorageDatetime;
use crate::policy::LengthViolation;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("validator failed for field \"{field}\": {reason}")]
    Validation {
        field: &'static str,
        reason: LengthViolation,
    },

    #[error("missing required field \"{0}\"")]
    MissingField(&'static str),

    #[error("field \"updated\" ({updated}) is earlier than \"created\" ({created})")]
    UpdatedBeforeCreated {
        created: StorageDatetime,
        updated: StorageDatetime,
    },

    #[error("constraint failed: {message}")]
    Constraint {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl StorageError {
    /// Wrap a storage-layer constraint violation, keeping its message and cause.
    pub fn constraint<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StorageError::Constraint {
            message: source.to_string(),
            source: Box::new(source),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, StorageError::Constraint { .. })
    }

    /// True for failures found before storage is touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StorageError::Validation { .. }
                | StorageError::MissingField(_)
                | StorageError::UpdatedBeforeCreated { .. }
        )
    }
}
