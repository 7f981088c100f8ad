//! Builders that collect field assignments, fill in defaults, validate, and
//! hand the finished record to a [`QueryExecutor`].

use crate::comment::{FIELD_CREATED, FIELD_ID, FIELD_NAME, FIELD_TEXT, FIELD_UPDATED};
use crate::policy;
use crate::{
    Clock, Comment, Query, QueryExecutor, StorageDatetime, StorageError, TransactionExecutor,
    Update,
};

/// Field assignments for a new comment.
///
/// `name` and `text` come from the caller; `created` and `updated` are
/// normally left to [`CommentCreate::defaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentCreate {
    name: Option<String>,
    text: Option<String>,
    created: Option<StorageDatetime>,
    updated: Option<StorageDatetime>,
}

impl CommentCreate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets `name` if a value is given.
    pub fn set_nillable_name(self, name: Option<String>) -> Self {
        match name {
            Some(name) => self.set_name(name),
            None => self,
        }
    }

    pub fn set_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets `text` if a value is given.
    pub fn set_nillable_text(self, text: Option<String>) -> Self {
        match text {
            Some(text) => self.set_text(text),
            None => self,
        }
    }

    /// Values are truncated to the microseconds the store keeps.
    pub fn set_created(mut self, created: StorageDatetime) -> Self {
        self.created = Some(StorageDatetime::from(created.0));
        self
    }

    /// Values are truncated to the microseconds the store keeps.
    pub fn set_updated(mut self, updated: StorageDatetime) -> Self {
        self.updated = Some(StorageDatetime::from(updated.0));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn created(&self) -> Option<&StorageDatetime> {
        self.created.as_ref()
    }

    pub fn updated(&self) -> Option<&StorageDatetime> {
        self.updated.as_ref()
    }

    /// Install the policy default for every unset field. Idempotent.
    pub fn defaults(&mut self, clock: &dyn Clock) {
        if self.name.is_none() {
            self.name = Some(policy::default_name());
        }
        if self.text.is_none() {
            self.text = Some(policy::default_text());
        }
        if self.created.is_none() {
            self.created = Some(policy::default_created(clock));
        }
        if self.updated.is_none() {
            self.updated = Some(policy::default_updated(clock));
        }
    }

    /// Run presence checks and validators; the first failure wins.
    ///
    /// Order: name presence, name format, text presence, text format,
    /// created presence, updated presence, then `updated >= created`.
    pub fn check(&self) -> Result<(), StorageError> {
        let name = self
            .name
            .as_deref()
            .ok_or(StorageError::MissingField(FIELD_NAME))?;
        policy::validate_name(name).map_err(|reason| StorageError::Validation {
            field: FIELD_NAME,
            reason,
        })?;

        let text = self
            .text
            .as_deref()
            .ok_or(StorageError::MissingField(FIELD_TEXT))?;
        policy::validate_text(text).map_err(|reason| StorageError::Validation {
            field: FIELD_TEXT,
            reason,
        })?;

        let created = self
            .created
            .as_ref()
            .ok_or(StorageError::MissingField(FIELD_CREATED))?;
        let updated = self
            .updated
            .as_ref()
            .ok_or(StorageError::MissingField(FIELD_UPDATED))?;
        if updated < created {
            return Err(StorageError::UpdatedBeforeCreated {
                created: created.clone(),
                updated: updated.clone(),
            });
        }
        Ok(())
    }

    /// Defaults, check, and the unsaved record (id 0).
    fn into_node(mut self, clock: &dyn Clock) -> Result<Comment, StorageError> {
        self.defaults(clock);
        self.check()?;

        Ok(Comment {
            id: 0,
            name: self.name.ok_or(StorageError::MissingField(FIELD_NAME))?,
            text: self.text.ok_or(StorageError::MissingField(FIELD_TEXT))?,
            created: self
                .created
                .ok_or(StorageError::MissingField(FIELD_CREATED))?,
            updated: self
                .updated
                .ok_or(StorageError::MissingField(FIELD_UPDATED))?,
        })
    }

    /// Create the comment. Validation failures return before storage is touched.
    pub async fn save<E: QueryExecutor>(
        self,
        executor: &E,
        clock: &dyn Clock,
    ) -> Result<Comment, StorageError> {
        let mut node = self.into_node(clock)?;
        node.id = executor.insert(&node).await?;
        Ok(node)
    }
}

/// Creates many comments with a single atomic insert.
#[derive(Debug, Clone, Default)]
pub struct CommentCreateBulk {
    builders: Vec<CommentCreate>,
}

impl CommentCreateBulk {
    pub fn new(builders: Vec<CommentCreate>) -> Self {
        Self { builders }
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Validate every builder, then insert all rows or none.
    ///
    /// Returned comments carry their identifiers in input order.
    pub async fn save<E: QueryExecutor>(
        self,
        executor: &E,
        clock: &dyn Clock,
    ) -> Result<Vec<Comment>, StorageError> {
        if self.builders.is_empty() {
            return Ok(Vec::new());
        }

        let mut nodes = self
            .builders
            .into_iter()
            .map(|builder| builder.into_node(clock))
            .collect::<Result<Vec<_>, _>>()?;

        let ids = executor.insert_many(&nodes).await?;
        if ids.len() != nodes.len() {
            return Err(StorageError::StorageError(format!(
                "expected {} identifiers from bulk insert, got {}",
                nodes.len(),
                ids.len()
            )));
        }

        for (node, id) in nodes.iter_mut().zip(ids) {
            node.id = id;
        }
        Ok(nodes)
    }
}

/// Changes to one existing comment.
///
/// `created` cannot be changed. `updated` is always recomputed from the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentUpdateOne {
    id: i64,
    name: Option<String>,
    text: Option<String>,
    updated: Option<StorageDatetime>,
}

impl CommentUpdateOne {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            name: None,
            text: None,
            updated: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn defaults(&mut self, clock: &dyn Clock) {
        self.updated = Some(policy::default_updated(clock));
    }

    /// Validators run only on the fields being changed.
    pub fn check(&self) -> Result<(), StorageError> {
        if let Some(name) = &self.name {
            policy::validate_name(name).map_err(|reason| StorageError::Validation {
                field: FIELD_NAME,
                reason,
            })?;
        }
        if let Some(text) = &self.text {
            policy::validate_text(text).map_err(|reason| StorageError::Validation {
                field: FIELD_TEXT,
                reason,
            })?;
        }
        if self.updated.is_none() {
            return Err(StorageError::MissingField(FIELD_UPDATED));
        }
        Ok(())
    }

    /// Apply the changes and return the record as stored.
    ///
    /// The store raises `updated` to the stamped time only if that is later
    /// than what it holds, so `updated` never moves backwards even when
    /// clocks disagree or updates race.
    pub async fn save<E: QueryExecutor>(
        mut self,
        executor: &E,
        clock: &dyn Clock,
    ) -> Result<Comment, StorageError> {
        self.defaults(clock);
        self.check()?;
        let stamped = self
            .updated
            .ok_or(StorageError::MissingField(FIELD_UPDATED))?;

        let mut update = Update::<Comment>::new().eq(FIELD_ID, self.id);
        if let Some(name) = &self.name {
            update = update.set(FIELD_NAME, name);
        }
        if let Some(text) = &self.text {
            update = update.set(FIELD_TEXT, text);
        }
        update = update.set_at_least(FIELD_UPDATED, stamped);

        let mut tx = executor.begin_transaction().await?;
        if tx.update(update).await? == 0 {
            tx.rollback().await?;
            return Err(StorageError::NotFound(format!("comment {}", self.id)));
        }

        let stored = tx
            .fetch(Query::<Comment>::new().eq(FIELD_ID, self.id).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound(format!("comment {}", self.id)))?;
        tx.commit().await?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{DEFAULT_NAME, LengthViolation};
    use crate::{FixedClock, MemoryExecutor};
    use chrono::DateTime;
    use std::time::Duration;

    fn clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn defaults_fill_only_unset_fields() {
        let clock = clock();
        let mut builder = CommentCreate::new().set_name("job");
        builder.defaults(&clock);
        assert_eq!(builder.name(), Some("job"));
        assert_eq!(builder.text(), Some(""));
        assert_eq!(builder.created(), Some(&clock.now()));
        assert_eq!(builder.updated(), Some(&clock.now()));

        let before = builder.clone();
        clock.advance(Duration::from_secs(60));
        builder.defaults(&clock);
        assert_eq!(builder, before);
    }

    #[test]
    fn check_without_defaults_reports_missing_name_first() {
        let err = CommentCreate::new().set_text("hi").check().unwrap_err();
        assert!(matches!(err, StorageError::MissingField("name")));
    }

    #[test]
    fn missing_timestamps_are_reported_after_content() {
        let err = CommentCreate::new()
            .set_name("job")
            .set_text("hi")
            .check()
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingField("created")));
    }

    #[test]
    fn name_is_checked_before_text() {
        let mut builder = CommentCreate::new().set_name("n".repeat(21)).set_text("");
        builder.defaults(&clock());
        let err = builder.check().unwrap_err();
        assert!(matches!(
            err,
            StorageError::Validation {
                field: "name",
                reason: LengthViolation::TooLong
            }
        ));
    }

    #[test]
    fn omitted_text_defaults_to_empty_and_is_rejected() {
        // The empty default and the non-empty rule coexist on purpose:
        // every create without text fails.
        for name in [None, Some("job".to_string()), Some(String::new())] {
            let mut builder = CommentCreate::new().set_nillable_name(name);
            builder.defaults(&clock());
            let err = builder.check().unwrap_err();
            assert_eq!(
                err.to_string(),
                "validator failed for field \"text\": value is less than the required length"
            );
        }
    }

    #[tokio::test]
    async fn save_assigns_id_and_matching_timestamps() {
        let executor = MemoryExecutor::new();
        let clock = clock();

        let saved = CommentCreate::new()
            .set_text("hello")
            .save(&executor, &clock)
            .await
            .unwrap();
        assert_eq!(saved.id, 1);
        assert_eq!(saved.name, DEFAULT_NAME);
        assert_eq!(saved.created, saved.updated);
        assert_eq!(saved.created, clock.now());
    }

    #[tokio::test]
    async fn invalid_create_never_reaches_storage() {
        let executor = MemoryExecutor::new();
        let err = CommentCreate::new()
            .set_text("x".repeat(201))
            .save(&executor, &clock())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Validation {
                field: "text",
                reason: LengthViolation::TooLong
            }
        ));
        assert!(executor.fetch(Query::<Comment>::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bulk_assigns_ids_in_input_order() {
        let executor = MemoryExecutor::new();
        let saved = CommentCreateBulk::new(vec![
            CommentCreate::new().set_text("first"),
            CommentCreate::new().set_text("second"),
            CommentCreate::new().set_text("third"),
        ])
        .save(&executor, &clock())
        .await
        .unwrap();

        let pairs: Vec<(i64, &str)> = saved.iter().map(|c| (c.id, c.text.as_str())).collect();
        assert_eq!(pairs, vec![(1, "first"), (2, "second"), (3, "third")]);
    }

    #[tokio::test]
    async fn bulk_with_one_invalid_item_writes_nothing() {
        let executor = MemoryExecutor::new();
        let err = CommentCreateBulk::new(vec![
            CommentCreate::new().set_text("fine"),
            CommentCreate::new(),
        ])
        .save(&executor, &clock())
        .await
        .unwrap_err();
        assert!(err.is_validation());
        assert!(executor.fetch(Query::<Comment>::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bulk_constraint_violation_is_translated() {
        let executor = MemoryExecutor::new();
        executor.add_unique_constraint("comments", &["text"]).await;

        let err = CommentCreateBulk::new(vec![
            CommentCreate::new().set_text("dup"),
            CommentCreate::new().set_text("dup"),
        ])
        .save(&executor, &clock())
        .await
        .unwrap_err();
        assert!(err.is_constraint());
        assert!(executor.fetch(Query::<Comment>::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_bulk_is_a_no_op() {
        let executor = MemoryExecutor::new();
        let saved = CommentCreateBulk::default()
            .save(&executor, &clock())
            .await
            .unwrap();
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn update_moves_updated_and_keeps_created() {
        let executor = MemoryExecutor::new();
        let clock = clock();
        let saved = CommentCreate::new()
            .set_text("hello")
            .save(&executor, &clock)
            .await
            .unwrap();

        clock.advance(Duration::from_secs(30));
        let changed = CommentUpdateOne::new(saved.id)
            .set_text("edited")
            .save(&executor, &clock)
            .await
            .unwrap();

        assert_eq!(changed.text, "edited");
        assert_eq!(changed.name, saved.name);
        assert_eq!(changed.created, saved.created);
        assert_eq!(changed.updated, clock.now());

        let stored = executor
            .fetch_optional(Query::<Comment>::new().eq("id", saved.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, changed);
    }

    #[tokio::test]
    async fn update_never_moves_updated_backwards() {
        let executor = MemoryExecutor::new();
        let clock = clock();
        let saved = CommentCreate::new()
            .set_text("hello")
            .save(&executor, &clock)
            .await
            .unwrap();

        clock.set(DateTime::from_timestamp(1_000, 0).unwrap());
        let changed = CommentUpdateOne::new(saved.id)
            .save(&executor, &clock)
            .await
            .unwrap();
        assert_eq!(changed.updated, saved.updated);
        assert!(changed.updated >= changed.created);
    }

    #[tokio::test]
    async fn update_of_missing_comment_is_not_found() {
        let executor = MemoryExecutor::new();
        let err = CommentUpdateOne::new(42)
            .set_text("nobody")
            .save(&executor, &clock())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn invalid_update_writes_nothing() {
        let executor = MemoryExecutor::new();
        let clock = clock();
        let saved = CommentCreate::new()
            .set_text("hello")
            .save(&executor, &clock)
            .await
            .unwrap();

        let err = CommentUpdateOne::new(saved.id)
            .set_text("")
            .save(&executor, &clock)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let stored = executor
            .fetch_optional(Query::<Comment>::new().eq("id", saved.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.text, "hello");
    }

    #[tokio::test]
    async fn caller_timestamps_are_stored_at_microsecond_precision() {
        let executor = MemoryExecutor::new();
        let precise =
            StorageDatetime(DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap());

        let saved = CommentCreate::new()
            .set_text("hello")
            .set_created(precise.clone())
            .set_updated(precise)
            .save(&executor, &clock())
            .await
            .unwrap();
        assert_eq!(saved.created.inner().timestamp_subsec_nanos(), 123_456_000);

        let stored = executor
            .fetch_optional(Query::<Comment>::new().eq("id", saved.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, saved);
    }

    #[tokio::test]
    async fn updated_before_created_is_rejected() {
        let executor = MemoryExecutor::new();
        let created = StorageDatetime::from(DateTime::from_timestamp(2_000, 0).unwrap());
        let updated = StorageDatetime::from(DateTime::from_timestamp(1_000, 0).unwrap());

        let err = CommentCreate::new()
            .set_text("hello")
            .set_created(created)
            .set_updated(updated)
            .save(&executor, &clock())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UpdatedBeforeCreated { .. }));
        assert!(err.is_validation());
        assert!(executor.fetch(Query::<Comment>::new()).await.unwrap().is_empty());
    }
}
