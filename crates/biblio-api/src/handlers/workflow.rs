//! Publication workflow: draft, publish, withdraw, republish, lock.

use axum::{
    extract::{Path, State},
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use biblio_core::{permissions, Record};

use crate::error::ApiError;
use crate::extract::{CurrentUser, IfMatch};
use crate::handlers::editing::curator_can_edit;
use crate::handlers::edit;
use crate::state::{AppState, RecordStore};

fn log_transition<T: RecordStore>(action: &str, id: Uuid, user_id: &str) {
    info!(
        subsystem = "api",
        op = action,
        record_kind = T::KIND.as_str(),
        record_id = %id,
        user_id = user_id,
        "Workflow transition"
    );
}

/// Save a new record as a private draft.
pub async fn save_draft<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut().save_draft()?;
        Ok(())
    })
    .await
}

/// Publish; the record must then pass the stricter public validation.
///
/// # Returns
/// - 200 OK with the public record and its new `ETag`
/// - 403 Forbidden if the user may not edit the record or it is already public
/// - 409 Conflict if `If-Match` is stale
/// - 422 Unprocessable Entity if a field required for publication is missing
pub async fn publish<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let response = edit::<T, _>(&state, &user, id, if_match, permissions::can_publish, |r| {
        r.common_mut().publish()?;
        Ok(())
    })
    .await?;
    log_transition::<T>("publish", id, &user.id);
    Ok(response)
}

/// Take a public record offline again (status `returned`).
///
/// # Returns
/// - 200 OK with the record and its new `ETag`
/// - 403 Forbidden if the user may not edit the record or it is not public
/// - 409 Conflict if `If-Match` is stale
pub async fn withdraw<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let response = edit::<T, _>(&state, &user, id, if_match, permissions::can_withdraw, |r| {
        r.common_mut().withdraw()?;
        Ok(())
    })
    .await?;
    log_transition::<T>("withdraw", id, &user.id);
    Ok(response)
}

/// Make a withdrawn record public again; validated like [`publish`].
pub async fn republish<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let response = edit::<T, _>(
        &state,
        &user,
        id,
        if_match,
        permissions::can_republish,
        |r| {
            r.common_mut().republish()?;
            Ok(())
        },
    )
    .await?;
    log_transition::<T>("republish", id, &user.id);
    Ok(response)
}

/// Lock a record against researcher edits (curators).
///
/// # Returns
/// - 200 OK with the locked record and its new `ETag`
/// - 403 Forbidden for non-curators
pub async fn lock<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, curator_can_edit, |r| {
        r.common_mut().lock();
        Ok(())
    })
    .await
}

pub async fn unlock<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, curator_can_edit, |r| {
        r.common_mut().unlock();
        Ok(())
    })
    .await
}
