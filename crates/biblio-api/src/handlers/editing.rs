//! Editing of the fields datasets and publications share.

use axum::{
    extract::{Path, State},
    response::Response,
};
use serde::Deserialize;
use uuid::Uuid;

use biblio_core::{permissions, Record, User};

use crate::error::ApiError;
use crate::extract::{CurrentUser, IfMatch, JsonBody};
use crate::handlers::edit;
use crate::state::{AppState, RecordStore};

/// Reviewer fields, locking, type and classification changes.
pub(crate) fn curator_can_edit<T: Record>(user: &User, record: &T) -> bool {
    permissions::can_curate_fields(user) && permissions::can_edit(user, record)
}

// =============================================================================
// ABSTRACTS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AbstractBody {
    pub lang: String,
    pub text: String,
}

/// Add an abstract in `lang`.
///
/// # Returns
/// - 200 OK with the record and its new `ETag`
/// - 403 Forbidden if the record is locked or not the user's
/// - 409 Conflict if `If-Match` is stale
pub async fn add_abstract<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<AbstractBody>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut().add_abstract(&body.lang, &body.text);
        Ok(())
    })
    .await
}

pub async fn update_abstract<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, abstract_id)): Path<(Uuid, Uuid)>,
    JsonBody(body): JsonBody<AbstractBody>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut()
            .update_abstract(abstract_id, &body.lang, &body.text)?;
        Ok(())
    })
    .await
}

pub async fn remove_abstract<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, abstract_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut().remove_abstract(abstract_id)?;
        Ok(())
    })
    .await
}

// =============================================================================
// LINKS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LinkBody {
    pub url: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub description: String,
}

pub async fn add_link<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<LinkBody>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut()
            .add_link(&body.url, &body.relation, &body.description);
        Ok(())
    })
    .await
}

pub async fn update_link<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, link_id)): Path<(Uuid, Uuid)>,
    JsonBody(body): JsonBody<LinkBody>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut()
            .update_link(link_id, &body.url, &body.relation, &body.description)?;
        Ok(())
    })
    .await
}

pub async fn remove_link<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, link_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut().remove_link(link_id)?;
        Ok(())
    })
    .await
}

// =============================================================================
// DEPARTMENTS & PROJECTS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DepartmentBody {
    pub organization_id: String,
}

/// Link a department; the organization must exist in the directory.
///
/// # Returns
/// - 200 OK with the record and its new `ETag`
/// - 404 Not Found if the organization is unknown
pub async fn add_department<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<DepartmentBody>,
) -> Result<Response, ApiError> {
    let org = state
        .organizations
        .get_organization(&body.organization_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Organization {} not found", body.organization_id))
        })?;
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut().add_organization(&org.id);
        Ok(())
    })
    .await
}

pub async fn remove_department<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, organization_id)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut().remove_organization(&organization_id)?;
        Ok(())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct ProjectBody {
    pub project_id: String,
}

/// Link a project; the project must exist in the directory.
pub async fn add_project<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<ProjectBody>,
) -> Result<Response, ApiError> {
    let project = state
        .projects
        .get_project(&body.project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project {} not found", body.project_id)))?;
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut().add_project(&project.id);
        Ok(())
    })
    .await
}

pub async fn remove_project<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, project_id)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut().remove_project(&project_id)?;
        Ok(())
    })
    .await
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub message: String,
}

/// Researcher's message to the reviewers.
pub async fn update_message<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<MessageBody>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.common_mut().message = body.message.trim().to_string();
        Ok(())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct ReviewerNoteBody {
    #[serde(default)]
    pub reviewer_note: String,
}

pub async fn update_reviewer_note<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<ReviewerNoteBody>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, curator_can_edit, |r| {
        r.common_mut().reviewer_note = body.reviewer_note.trim().to_string();
        Ok(())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct ReviewerTagsBody {
    #[serde(default)]
    pub reviewer_tags: Vec<String>,
}

/// Replace the reviewer tags (curators).
///
/// Tags are trimmed; blanks and repeats are dropped.
pub async fn update_reviewer_tags<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<ReviewerTagsBody>,
) -> Result<Response, ApiError> {
    edit::<T, _>(&state, &user, id, if_match, curator_can_edit, |r| {
        r.common_mut().set_reviewer_tags(body.reviewer_tags);
        Ok(())
    })
    .await
}
