//! Dataset and publication links.
//!
//! A link is stored on both records. The record in the URL (the near side)
//! is written with the client's `If-Match` snapshot; the other record (the
//! far side) is written with whatever snapshot is current, reloading on
//! conflict. Both sides are checked before anything is written, and the near
//! side is reverted when the far write still fails.

use std::sync::Arc;

use axum::response::Response;
use tracing::{error, info, warn};
use uuid::Uuid;

use biblio_core::{permissions, Dataset, Publication, Record, RecordRepository, Status, User};

use crate::error::ApiError;
use crate::handlers::{edit, ensure, Allowed};
use crate::state::{AppState, RecordStore};

/// Attempts made when updating the far side of a relation.
pub const RELATION_RETRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationChange {
    Link,
    Unlink,
}

impl RelationChange {
    fn as_str(&self) -> &'static str {
        match self {
            RelationChange::Link => "link",
            RelationChange::Unlink => "unlink",
        }
    }

    fn inverse(self) -> Self {
        match self {
            RelationChange::Link => RelationChange::Unlink,
            RelationChange::Unlink => RelationChange::Link,
        }
    }
}

/// A record kind that keeps a list of related `O` records.
pub trait Relates<O: RecordStore>: RecordStore {
    /// Add `other`; false when already present.
    fn link(&mut self, other: Uuid) -> bool;

    /// Remove `other`; false when absent.
    fn unlink(&mut self, other: Uuid) -> bool;

    /// Apply `change`, returning whether the record changed.
    fn apply(&mut self, change: RelationChange, other: Uuid) -> bool {
        match change {
            RelationChange::Link => self.link(other),
            RelationChange::Unlink => self.unlink(other),
        }
    }
}

impl Relates<Publication> for Dataset {
    fn link(&mut self, other: Uuid) -> bool {
        self.add_related_publication(other)
    }

    fn unlink(&mut self, other: Uuid) -> bool {
        self.remove_related_publication(other)
    }
}

impl Relates<Dataset> for Publication {
    fn link(&mut self, other: Uuid) -> bool {
        self.add_related_dataset(other)
    }

    fn unlink(&mut self, other: Uuid) -> bool {
        self.remove_related_dataset(other)
    }
}

fn allow_all<T>(_: &User, _: &T) -> bool {
    true
}

/// Apply `mutate` to the current version of a record, reloading on conflict.
///
/// `allowed` is checked against every reloaded version, so a record locked
/// or deleted between attempts is refused with 403. Returns false when the
/// record needed no change.
///
/// # Returns
/// - `Ok(true)` when a new snapshot was stored
/// - `Ok(false)` when `mutate` left the record unchanged
/// - `Err(NotFound)` when the record is gone
/// - `Err(Conflict)` after [`RELATION_RETRIES`] lost races
pub async fn update_with_retry<T, F>(
    repository: Arc<dyn RecordRepository<T>>,
    id: Uuid,
    user: &User,
    allowed: Allowed<T>,
    mutate: F,
) -> Result<bool, ApiError>
where
    T: Record,
    F: Fn(&mut T) -> bool + Send + Sync,
{
    let mut attempt = 1;
    loop {
        let mut record = repository
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", T::KIND, id)))?;
        let permitted = allowed(user, &record);
        if !mutate(&mut record) {
            return Ok(false);
        }
        ensure(permitted)?;
        record.validate()?;

        let snapshot = record.snapshot_id().unwrap_or_default();
        match repository.update(snapshot, record, Some(user)).await {
            Ok(_) => return Ok(true),
            Err(e) if e.is_conflict() && attempt < RELATION_RETRIES => {
                warn!(
                    subsystem = "api",
                    record_kind = T::KIND.as_str(),
                    record_id = %id,
                    attempt,
                    "Relation update conflict, retrying"
                );
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Check the far record before the near one is written.
///
/// Returns whether the far record needs a write. Unlinking skips far
/// records that are gone or deleted.
async fn check_far<N, F>(
    state: &AppState,
    user: &User,
    id: Uuid,
    other_id: Uuid,
    change: RelationChange,
) -> Result<bool, ApiError>
where
    N: RecordStore,
    F: Relates<N>,
{
    let far = F::repository(state).get(other_id).await?;
    let mut far = match (far, change) {
        (Some(far), RelationChange::Unlink) if far.status() == Status::Deleted => return Ok(false),
        (Some(far), _) => far,
        (None, RelationChange::Unlink) => return Ok(false),
        (None, RelationChange::Link) => {
            return Err(ApiError::NotFound(format!(
                "{} {} not found",
                F::KIND,
                other_id
            )))
        }
    };
    if change == RelationChange::Link {
        ensure(permissions::can_view(user, &far))?;
    }
    if !far.apply(change, id) {
        return Ok(false);
    }
    ensure(permissions::can_edit(user, &far))?;
    far.validate()?;
    Ok(true)
}

/// Link or unlink two records, writing both sides.
///
/// # Returns
/// - 200 OK with the near record as stored and its new `ETag`
/// - 403 Forbidden if the user may not edit either record
/// - 404 Not Found if the far record is missing (link) or the link does not
///   exist (unlink)
/// - 409 Conflict if the client's snapshot of the near record is stale, or
///   the far record kept changing; the near record is left as it was
/// - 422 Unprocessable Entity if either record would fail validation
pub async fn relate<N, F>(
    state: &AppState,
    user: &User,
    id: Uuid,
    if_match: Uuid,
    other_id: Uuid,
    change: RelationChange,
) -> Result<Response, ApiError>
where
    N: Relates<F>,
    F: Relates<N>,
{
    let far_pending = check_far::<N, F>(state, user, id, other_id, change).await?;

    let response = edit::<N, _>(state, user, id, if_match, permissions::can_edit, |near| {
        if !near.apply(change, other_id) && change == RelationChange::Unlink {
            return Err(ApiError::NotFound(format!(
                "{} {} is not linked",
                F::KIND,
                other_id
            )));
        }
        Ok(())
    })
    .await?;

    if far_pending {
        let far = update_with_retry(
            F::repository(state),
            other_id,
            user,
            permissions::can_edit,
            |far: &mut F| far.apply(change, id),
        )
        .await;
        match far {
            Ok(_) => {}
            Err(ApiError::NotFound(_)) if change == RelationChange::Unlink => {}
            Err(e) => {
                revert::<N, F>(state, user, id, other_id, change).await;
                return Err(e);
            }
        }
    }

    info!(
        subsystem = "api",
        op = change.as_str(),
        record_kind = N::KIND.as_str(),
        record_id = %id,
        related_id = %other_id,
        "Records {}ed",
        change.as_str()
    );
    Ok(response)
}

/// Undo the near side after the far write failed.
async fn revert<N, F>(
    state: &AppState,
    user: &User,
    id: Uuid,
    other_id: Uuid,
    change: RelationChange,
) where
    N: Relates<F>,
    F: Relates<N>,
{
    let undo = change.inverse();
    let reverted = update_with_retry(N::repository(state), id, user, allow_all, |near: &mut N| {
        near.apply(undo, other_id)
    })
    .await;
    if let Err(e) = reverted {
        error!(
            subsystem = "api",
            op = change.as_str(),
            record_kind = N::KIND.as_str(),
            record_id = %id,
            related_id = %other_id,
            error = ?e,
            "Could not revert one-sided relation"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_core::Role;
    use biblio_db::{test_fixtures, MemoryRecordRepository};

    #[tokio::test]
    async fn test_retry_refuses_locked_record() {
        let repo = Arc::new(MemoryRecordRepository::<Dataset>::new());
        let alice = test_fixtures::user("alice", Role::User);
        let mut dataset = test_fixtures::complete_dataset("Soil");
        dataset.common.locked = true;
        let dataset = repo.create(dataset, Some(&alice)).await.unwrap();

        let result = update_with_retry(
            repo.clone() as Arc<dyn RecordRepository<Dataset>>,
            dataset.id(),
            &alice,
            permissions::can_edit,
            |d: &mut Dataset| d.link(Uuid::now_v7()),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
        let stored = repo.get(dataset.id()).await.unwrap().unwrap();
        assert_eq!(stored.snapshot_id(), dataset.snapshot_id());
    }

    #[tokio::test]
    async fn test_retry_skips_unchanged_record() {
        let repo = Arc::new(MemoryRecordRepository::<Dataset>::new());
        let alice = test_fixtures::user("alice", Role::User);
        let linked = Uuid::now_v7();
        let mut dataset = test_fixtures::complete_dataset("Soil");
        dataset.link(linked);
        dataset.common.locked = true;
        let dataset = repo.create(dataset, Some(&alice)).await.unwrap();

        let changed = update_with_retry(
            repo as Arc<dyn RecordRepository<Dataset>>,
            dataset.id(),
            &alice,
            permissions::can_edit,
            |d: &mut Dataset| d.link(linked),
        )
        .await
        .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_retry_reports_missing_record() {
        let repo: Arc<dyn RecordRepository<Publication>> =
            Arc::new(MemoryRecordRepository::<Publication>::new());
        let alice = test_fixtures::user("alice", Role::User);
        let result = update_with_retry(repo, Uuid::now_v7(), &alice, allow_all, |p: &mut Publication| {
            p.link(Uuid::now_v7())
        })
        .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
