//! Comment Store - validated persistence for comments.
//!
//! A comment has a server-assigned `id`, a short `name`, a required `text`,
//! and `created`/`updated` timestamps. Writes go through builders that fill
//! in defaults and validate before anything reaches storage.
//!
//! # Traits
//!
//! - [`Storable`]: Types that map onto a table through serde
//! - [`QueryExecutor`]: A storage backend (in-memory here, PostgreSQL in
//!   `comment-store-postgres`)
//! - [`CommentRepository`]: Create, update, fetch-by-id, and list-latest
//! - [`Clock`]: Source of timestamp defaults
//!
//! # Example
//!
//! ```text
//! use comment_store::{CommentCreate, CommentRepository, CommentStore, MemoryExecutor};
//!
//! let store = CommentStore::new(MemoryExecutor::new());
//! let comment = store.create(CommentCreate::new().set_text("hello")).await?;
//! assert_eq!(store.get(comment.id).await?.text, "hello");
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod builder;
pub mod comment;
mod error;
mod memory;
pub mod policy;
mod query;
mod repository;
mod storable;
mod time;

pub use builder::{CommentCreate, CommentCreateBulk, CommentUpdateOne};
pub use comment::Comment;
pub use error::StorageError;
pub use memory::{MemoryExecutor, MemoryTransaction, UniqueViolation};
pub use query::{
    Assignment, Filter, Order, Query, QueryExecutor, TransactionExecutor, Update, Value,
};
pub use repository::{CommentRepository, CommentStore, ConnectionConfig, RepositoryConnection};
pub use storable::Storable;
pub use time::{Clock, FixedClock, StorageDatetime, SystemClock};
