//! Repository traits for comments.
//!
//! - `CommentRepository`: create, update, fetch-by-id, and list-latest
//! - `CommentStore<E>`: the repository over any `QueryExecutor`
//! - `RepositoryConnection`: database connection and initialization

use std::sync::Arc;

use async_trait::async_trait;

use crate::comment::{FIELD_CREATED, FIELD_ID};
use crate::{
    Clock, Comment, CommentCreate, CommentCreateBulk, CommentUpdateOne, Order, Query,
    QueryExecutor, StorageError, SystemClock,
};

/// Connection configuration for database backends.
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    /// Connect using a database URL string.
    Url(String),
}

impl From<&str> for ConnectionConfig {
    fn from(url: &str) -> Self {
        ConnectionConfig::Url(url.to_string())
    }
}

impl From<String> for ConnectionConfig {
    fn from(url: String) -> Self {
        ConnectionConfig::Url(url)
    }
}

impl From<&String> for ConnectionConfig {
    fn from(url: &String) -> Self {
        ConnectionConfig::Url(url.clone())
    }
}

/// Trait for database connection and initialization.
#[async_trait]
pub trait RepositoryConnection: Sized + Send + Sync {
    /// Connect to the database using the provided configuration.
    async fn connect(config: impl Into<ConnectionConfig> + Send) -> Result<Self, StorageError>;

    /// Initialize the database schema (run migrations).
    async fn initialize(&self) -> Result<(), StorageError>;
}

/// Storage operations on comments.
///
/// Every error goes back to the caller unchanged; nothing is retried or logged here.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Apply defaults, validate, and insert one comment.
    async fn create(&self, comment: CommentCreate) -> Result<Comment, StorageError>;

    /// Validate every comment, then insert them all or none.
    async fn create_bulk(&self, comments: Vec<CommentCreate>)
    -> Result<Vec<Comment>, StorageError>;

    /// Change an existing comment, stamping `updated`.
    async fn update(&self, update: CommentUpdateOne) -> Result<Comment, StorageError>;

    /// Fetch one comment. A missing id is [`StorageError::NotFound`].
    async fn get(&self, id: i64) -> Result<Comment, StorageError>;

    /// Up to `limit` comments, newest `created` first. Ties have no defined order.
    async fn list_recent(&self, limit: u64) -> Result<Vec<Comment>, StorageError>;
}

/// [`CommentRepository`] over a query executor, with an injected clock.
#[derive(Clone)]
pub struct CommentStore<E> {
    executor: E,
    clock: Arc<dyn Clock>,
}

impl<E: QueryExecutor> CommentStore<E> {
    pub fn new(executor: E) -> Self {
        Self::with_clock(executor, Arc::new(SystemClock))
    }

    pub fn with_clock(executor: E, clock: Arc<dyn Clock>) -> Self {
        Self { executor, clock }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

#[async_trait]
impl<E: QueryExecutor> CommentRepository for CommentStore<E> {
    async fn create(&self, comment: CommentCreate) -> Result<Comment, StorageError> {
        comment.save(&self.executor, self.clock.as_ref()).await
    }

    async fn create_bulk(
        &self,
        comments: Vec<CommentCreate>,
    ) -> Result<Vec<Comment>, StorageError> {
        CommentCreateBulk::new(comments)
            .save(&self.executor, self.clock.as_ref())
            .await
    }

    async fn update(&self, update: CommentUpdateOne) -> Result<Comment, StorageError> {
        update.save(&self.executor, self.clock.as_ref()).await
    }

    async fn get(&self, id: i64) -> Result<Comment, StorageError> {
        self.executor
            .fetch_optional(Query::<Comment>::new().eq(FIELD_ID, id))
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("comment {}", id)))
    }

    async fn list_recent(&self, limit: u64) -> Result<Vec<Comment>, StorageError> {
        self.executor
            .fetch(
                Query::<Comment>::new()
                    .order_by(FIELD_CREATED, Order::Desc)
                    .limit(limit),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{DEFAULT_NAME, LengthViolation};
    use crate::{FixedClock, MemoryExecutor};
    use chrono::DateTime;
    use std::time::Duration;

    fn store() -> (CommentStore<MemoryExecutor>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let store = CommentStore::with_clock(MemoryExecutor::new(), clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (store, _) = store();
        let created = store
            .create(CommentCreate::new().set_name("job").set_text("hello"))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert_eq!(created.created, created.updated);

        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn omitted_name_is_stored_as_placeholder() {
        let (store, _) = store();
        let created = store
            .create(CommentCreate::new().set_text("hello"))
            .await
            .unwrap();
        assert_eq!(store.get(created.id).await.unwrap().name, DEFAULT_NAME);
    }

    #[tokio::test]
    async fn text_violations() {
        let (store, _) = store();

        let missing = store
            .create(CommentCreate::new().set_name("job"))
            .await
            .unwrap_err();
        assert!(matches!(
            missing,
            StorageError::Validation {
                field: "text",
                reason: LengthViolation::TooShort
            }
        ));

        let long = store
            .create(CommentCreate::new().set_text("x".repeat(201)))
            .await
            .unwrap_err();
        assert!(matches!(
            long,
            StorageError::Validation {
                field: "text",
                reason: LengthViolation::TooLong
            }
        ));
    }

    #[tokio::test]
    async fn long_name_fails_even_with_valid_text() {
        let (store, _) = store();
        let err = store
            .create(CommentCreate::new().set_name("n".repeat(21)).set_text("ok"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Validation {
                field: "name",
                reason: LengthViolation::TooLong
            }
        ));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (store, _) = store();
        let err = store.get(1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_recent_on_empty_store() {
        let (store, _) = store();
        assert!(store.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_recent_is_newest_first_and_limited() {
        let (store, clock) = store();
        for text in ["t1", "t2", "t3"] {
            store
                .create(CommentCreate::new().set_text(text))
                .await
                .unwrap();
            clock.advance(Duration::from_secs(1));
        }

        let texts: Vec<String> = store
            .list_recent(10)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["t3", "t2", "t1"]);

        assert_eq!(store.list_recent(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bulk_and_update_through_the_repository() {
        let (store, clock) = store();
        let saved = store
            .create_bulk(vec![
                CommentCreate::new().set_text("a"),
                CommentCreate::new().set_text("b"),
            ])
            .await
            .unwrap();
        assert_eq!(saved.len(), 2);

        clock.advance(Duration::from_secs(5));
        let changed = store
            .update(CommentUpdateOne::new(saved[1].id).set_name("edited"))
            .await
            .unwrap();
        assert_eq!(changed.name, "edited");
        assert!(changed.updated > changed.created);
        assert_eq!(store.get(saved[1].id).await.unwrap(), changed);
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let (store, _) = store();
        let repository: Arc<dyn CommentRepository> = Arc::new(store);
        let created = repository
            .create(CommentCreate::new().set_text("dyn"))
            .await
            .unwrap();
        assert_eq!(repository.get(created.id).await.unwrap().text, "dyn");
    }
}
