//! PostgreSQL implementation for comment-store.
//!
//! Rows are bound and read through serde, so any `Storable` type works with
//! [`PgPool`] as its executor.
//!
//! # Usage
//!
//! ```text
//! use comment_store_postgres::{CommentRepository, PgCommentRepository, RepositoryConnection};
//!
//! let repository = PgCommentRepository::connect(std::env::var("DSN")?).await?;
//! repository.initialize().await?;
//! let latest = repository.list_recent(10).await?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod error;
mod executor;
mod repository;
mod serde_bind;

pub use executor::{PgPool, PgTransaction};
pub use repository::PgCommentRepository;
pub use serde_bind::{
    MAX_BIND_PARAMETERS, bind_insert_values, build_insert_sql, deserialize_row, returned_ids,
    rows_per_statement,
};

// Re-export sqlx migration types
pub use sqlx::migrate;
pub use sqlx::migrate::Migrator;

// Re-export core types for convenience
pub use comment_store::{
    Comment, CommentCreate, CommentRepository, CommentUpdateOne, ConnectionConfig, Query,
    QueryExecutor, RepositoryConnection, Storable, StorageDatetime, StorageError,
    TransactionExecutor,
};
