//! HTTP handlers.
//!
//! Every mutation follows the same recipe: load the record, check the
//! permission, apply the change in memory, validate, and store it guarded by
//! the client's `If-Match` snapshot. [`edit`] implements that recipe; the
//! handler modules only supply the permission check and the mutation.

pub mod contributors;
pub mod dashboard;
pub mod datasets;
pub mod directory;
pub mod editing;
pub mod export;
pub mod frontoffice;
pub mod publications;
pub mod records;
pub mod relations;
pub mod tasks;
pub mod workflow;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;
use uuid::Uuid;

use biblio_core::{Record, User};

use crate::error::ApiError;
use crate::state::{AppState, RecordStore};

/// Permission predicate from [`biblio_core::permissions`].
pub type Allowed<T> = fn(&User, &T) -> bool;

/// Load the current version of a record or fail with 404.
pub async fn load<T: RecordStore>(state: &AppState, id: Uuid) -> Result<T, ApiError> {
    T::repository(state)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", T::KIND, id)))
}

pub fn ensure(allowed: bool) -> Result<(), ApiError> {
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

/// Record JSON as `user` may see it, with its snapshot id as `ETag`.
pub fn record_response<T: Record>(status: StatusCode, mut record: T, user: &User) -> Response {
    record.redact_for(user);
    let etag = record
        .snapshot_id()
        .and_then(|s| HeaderValue::from_str(&format!("\"{}\"", s)).ok());
    let mut response = (status, Json(record)).into_response();
    if let Some(etag) = etag {
        response.headers_mut().insert(header::ETAG, etag);
    }
    response
}

/// Load, check, mutate, validate and store a record.
pub async fn edit<T, F>(
    state: &AppState,
    user: &User,
    id: Uuid,
    if_match: Uuid,
    allowed: Allowed<T>,
    mutate: F,
) -> Result<Response, ApiError>
where
    T: RecordStore,
    F: FnOnce(&mut T) -> Result<(), ApiError> + Send,
{
    let mut record = load::<T>(state, id).await?;
    ensure(allowed(user, &record))?;

    let current = record.snapshot_id().unwrap_or_default();
    if current != if_match {
        debug!(
            subsystem = "api",
            record_id = %id,
            expected = %if_match,
            actual = %current,
            "Stale If-Match"
        );
        return Err(biblio_core::Error::Conflict {
            id,
            expected: if_match,
            actual: current,
        }
        .into());
    }

    mutate(&mut record)?;
    record.validate()?;

    let saved = T::repository(state)
        .update(if_match, record, Some(user))
        .await?;
    Ok(record_response(StatusCode::OK, saved, user))
}
