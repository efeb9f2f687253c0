//! Snapshot storage for datasets and publications.
//!
//! Every record version is one row `(snapshot_id, id, data, date_from,
//! date_until)`. The current version is the row whose `date_until` is NULL.
//! Updates lock that row, compare its snapshot id with the caller's
//! `If-Match` token and only then close it and insert the next version.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use biblio_core::{ChangeCursor, ChangeListener, Error, Record, RecordRepository, Result, User};

const SELECT_COLUMNS: &str = "snapshot_id, id, data, date_from, date_until";

/// Prepare a record for its first snapshot.
pub(crate) fn stamp_created<T: Record>(record: &mut T, user: Option<&User>, now: DateTime<Utc>) {
    let common = record.common_mut();
    if common.id.is_nil() {
        common.id = Uuid::now_v7();
    }
    common.snapshot_id = Some(Uuid::now_v7());
    common.date_from = Some(now);
    common.date_until = None;
    common.date_created.get_or_insert(now);
    common.date_updated = Some(now);
    if let Some(user) = user {
        common.creator_id.get_or_insert_with(|| user.id.clone());
        common.user_id.get_or_insert_with(|| user.id.clone());
        common.last_user_id = Some(user.id.clone());
    }
}

/// Prepare a record for a follow-up snapshot.
pub(crate) fn stamp_updated<T: Record>(
    record: &mut T,
    user: Option<&User>,
    created: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) {
    let common = record.common_mut();
    common.snapshot_id = Some(Uuid::now_v7());
    common.date_from = Some(now);
    common.date_until = None;
    if common.date_created.is_none() {
        common.date_created = created;
    }
    common.date_updated = Some(now);
    if let Some(user) = user {
        common.last_user_id = Some(user.id.clone());
    }
}

/// Broadcast a write to every listener.
pub(crate) fn notify_changed<T>(listeners: &[Arc<dyn ChangeListener<T>>], record: &T) {
    for listener in listeners {
        listener.record_changed(record);
    }
}

pub(crate) fn notify_purged<T>(listeners: &[Arc<dyn ChangeListener<T>>], id: Uuid) {
    for listener in listeners {
        listener.record_purged(id);
    }
}

/// PostgreSQL implementation of [`RecordRepository`].
pub struct PgRecordRepository<T: Record> {
    pool: Pool<Postgres>,
    listeners: Vec<Arc<dyn ChangeListener<T>>>,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Record> PgRecordRepository<T> {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            listeners: Vec::new(),
            _kind: PhantomData,
        }
    }

    /// Register a listener notified after every successful write.
    pub fn with_listener(mut self, listener: Arc<dyn ChangeListener<T>>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn table() -> &'static str {
        T::KIND.table()
    }

    fn decode(row: &PgRow) -> Result<T> {
        let Json(mut record): Json<T> = row.try_get("data")?;
        let common = record.common_mut();
        common.id = row.try_get("id")?;
        common.snapshot_id = Some(row.try_get("snapshot_id")?);
        common.date_from = Some(row.try_get("date_from")?);
        common.date_until = row.try_get("date_until")?;
        Ok(record)
    }

    fn decode_all(rows: &[PgRow]) -> Result<Vec<T>> {
        rows.iter().map(Self::decode).collect()
    }

    async fn insert_snapshot(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        record: &T,
    ) -> Result<()> {
        let common = record.common();
        sqlx::query(&format!(
            "INSERT INTO {} (snapshot_id, id, data, date_from) VALUES ($1, $2, $3, $4)",
            Self::table()
        ))
        .bind(common.snapshot_id)
        .bind(common.id)
        .bind(Json(record))
        .bind(common.date_from)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Turn a lost race on the current-version index into a conflict.
    ///
    /// Two creates of the same id both pass the existence check; the second
    /// insert then fails with a unique violation once the first commits.
    async fn duplicate_as_conflict(&self, id: Uuid, err: Error) -> Error {
        if !is_unique_violation(&err) {
            return err;
        }
        let actual: Option<Uuid> = sqlx::query_scalar(&format!(
            "SELECT snapshot_id FROM {} WHERE id = $1 AND date_until IS NULL",
            Self::table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten();
        warn!(
            subsystem = "database",
            component = "snapshots",
            op = "create",
            record_kind = T::KIND.as_str(),
            record_id = %id,
            "Concurrent create, record already exists"
        );
        Error::Conflict {
            id,
            expected: Uuid::nil(),
            actual: actual.unwrap_or_default(),
        }
    }
}

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

pub(crate) fn is_unique_violation(err: &Error) -> bool {
    match err {
        Error::Database(e) => {
            e.as_database_error().and_then(|d| d.code()).as_deref() == Some(UNIQUE_VIOLATION)
        }
        _ => false,
    }
}

#[async_trait]
impl<T: Record> RecordRepository<T> for PgRecordRepository<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = $1 AND date_until IS NULL",
            SELECT_COLUMNS,
            Self::table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = ANY($1) AND date_until IS NULL",
            SELECT_COLUMNS,
            Self::table()
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut by_id: HashMap<Uuid, T> = Self::decode_all(&rows)?
            .into_iter()
            .map(|r| (r.id(), r))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn create(&self, mut record: T, user: Option<&User>) -> Result<T> {
        let start = Instant::now();
        stamp_created(&mut record, user, Utc::now());
        let id = record.id();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let existing: Option<Uuid> = sqlx::query_scalar(&format!(
            "SELECT snapshot_id FROM {} WHERE id = $1 AND date_until IS NULL FOR UPDATE",
            Self::table()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if let Some(actual) = existing {
            return Err(Error::Conflict {
                id,
                expected: Uuid::nil(),
                actual,
            });
        }

        if let Err(e) = Self::insert_snapshot(&mut tx, &record).await {
            return Err(self.duplicate_as_conflict(id, e).await);
        }
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "snapshots",
            op = "create",
            record_kind = T::KIND.as_str(),
            record_id = %id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Record created"
        );
        notify_changed(&self.listeners, &record);
        Ok(record)
    }

    async fn update(&self, if_match: Uuid, mut record: T, user: Option<&User>) -> Result<T> {
        let start = Instant::now();
        let id = record.id();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let current = sqlx::query(&format!(
            "SELECT snapshot_id, data->>'date_created' AS date_created FROM {} \
             WHERE id = $1 AND date_until IS NULL FOR UPDATE",
            Self::table()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::RecordNotFound(id))?;

        let actual: Uuid = current.try_get("snapshot_id")?;
        if actual != if_match {
            warn!(
                subsystem = "database",
                component = "snapshots",
                op = "update",
                record_kind = T::KIND.as_str(),
                record_id = %id,
                expected = %if_match,
                actual = %actual,
                "Stale snapshot, update rejected"
            );
            return Err(Error::Conflict {
                id,
                expected: if_match,
                actual,
            });
        }
        let created: Option<String> = current.try_get("date_created")?;
        let created = created
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc));

        sqlx::query(&format!(
            "UPDATE {} SET date_until = $1 WHERE snapshot_id = $2",
            Self::table()
        ))
        .bind(now)
        .bind(actual)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        stamp_updated(&mut record, user, created, now);
        Self::insert_snapshot(&mut tx, &record).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "snapshots",
            op = "update",
            record_kind = T::KIND.as_str(),
            record_id = %id,
            snapshot_id = ?record.snapshot_id(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Record updated"
        );
        notify_changed(&self.listeners, &record);
        Ok(record)
    }

    async fn history(&self, id: Uuid) -> Result<Vec<T>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = $1 ORDER BY date_from DESC",
            SELECT_COLUMNS,
            Self::table()
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::decode_all(&rows)
    }

    async fn page(&self, after: Option<Uuid>, limit: i64) -> Result<Vec<T>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE date_until IS NULL AND ($1::uuid IS NULL OR id > $1) \
             ORDER BY id LIMIT $2",
            SELECT_COLUMNS,
            Self::table()
        ))
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::decode_all(&rows)
    }

    async fn updated_since(&self, after: ChangeCursor, limit: i64) -> Result<Vec<T>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE date_until IS NULL AND (date_from, id) > ($1, $2) \
             ORDER BY date_from, id LIMIT $3",
            SELECT_COLUMNS,
            Self::table()
        ))
        .bind(after.date_from)
        .bind(after.id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::decode_all(&rows)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE date_until IS NULL",
            Self::table()
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn purge(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", Self::table()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound(id));
        }
        info!(
            subsystem = "database",
            component = "snapshots",
            op = "purge",
            record_kind = T::KIND.as_str(),
            record_id = %id,
            result_count = result.rows_affected(),
            "Record purged"
        );
        notify_purged(&self.listeners, id);
        Ok(())
    }
}
