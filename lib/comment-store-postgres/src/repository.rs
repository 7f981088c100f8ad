//! PostgreSQL-backed comment repository.

use std::sync::Arc;

use async_trait::async_trait;
use comment_store::{
    Clock, Comment, CommentCreate, CommentRepository, CommentStore, CommentUpdateOne,
    ConnectionConfig, RepositoryConnection, StorageError,
};
use sqlx::migrate::Migrator;

use crate::PgPool;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Comment repository over a PostgreSQL pool.
///
/// `initialize` creates the `comments` table if it does not exist yet.
#[derive(Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
    store: CommentStore<PgPool>,
}

impl PgCommentRepository {
    /// Create a new repository with the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: CommentStore::new(pool.clone()),
            pool,
        }
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: CommentStore::with_clock(pool.clone(), clock),
            pool,
        }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RepositoryConnection for PgCommentRepository {
    async fn connect(config: impl Into<ConnectionConfig> + Send) -> Result<Self, StorageError> {
        let url = match config.into() {
            ConnectionConfig::Url(url) => url,
        };

        let pool = PgPool::connect(&url).await?;
        Ok(Self::new(pool))
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        MIGRATOR
            .run(self.pool.inner())
            .await
            .map_err(|e| StorageError::StorageError(format!("Migration failed: {}", e)))
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn create(&self, comment: CommentCreate) -> Result<Comment, StorageError> {
        self.store.create(comment).await
    }

    async fn create_bulk(
        &self,
        comments: Vec<CommentCreate>,
    ) -> Result<Vec<Comment>, StorageError> {
        self.store.create_bulk(comments).await
    }

    async fn update(&self, update: CommentUpdateOne) -> Result<Comment, StorageError> {
        self.store.update(update).await
    }

    async fn get(&self, id: i64) -> Result<Comment, StorageError> {
        self.store.get(id).await
    }

    async fn list_recent(&self, limit: u64) -> Result<Vec<Comment>, StorageError> {
        self.store.list_recent(limit).await
    }
}
