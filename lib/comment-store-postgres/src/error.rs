//! Translation of sqlx errors into storage errors.

use comment_store::StorageError;
use sqlx::error::{BoxDynError, ErrorKind};

/// Uniqueness and foreign-key violations become [`StorageError::Constraint`];
/// everything else is passed through as an opaque storage error.
pub(crate) fn storage_error(err: sqlx::Error) -> StorageError {
    let is_constraint = matches!(
        &err,
        sqlx::Error::Database(db)
            if matches!(db.kind(), ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation)
    );

    if is_constraint {
        StorageError::constraint(err)
    } else {
        StorageError::StorageError(err.to_string())
    }
}

pub(crate) fn bind_error(err: BoxDynError) -> StorageError {
    StorageError::StorageError(err.to_string())
}
