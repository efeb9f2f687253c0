//! Publication specific editing: details, type, classification, files and
//! related datasets.

use axum::{
    extract::{Path, State},
    response::Response,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use biblio_core::record::clean_list;
use biblio_core::{
    defaults, permissions, AccessLevel, Conference, Dataset, Publication, PublicationFile,
    PublicationKind,
};

use crate::error::ApiError;
use crate::extract::{CurrentUser, IfMatch, JsonBody};
use crate::handlers::editing::curator_can_edit;
use crate::handlers::edit;
use crate::handlers::relations::{relate, RelationChange};
use crate::state::AppState;

fn trimmed(value: String) -> String {
    value.trim().to_string()
}

/// Replacement values for the publication details form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PublicationDetails {
    pub title: String,
    pub year: String,
    /// Journal or book series title.
    pub publication: String,
    pub volume: String,
    pub issue: String,
    pub page_first: String,
    pub page_last: String,
    pub isbn: Vec<String>,
    pub issn: Vec<String>,
    pub doi: String,
    pub publisher: String,
    pub place_of_publication: String,
    pub language: Vec<String>,
    pub keywords: Vec<String>,
    pub defense_date: Option<NaiveDate>,
    pub defense_place: String,
    pub conference: Option<Conference>,
}

impl PublicationDetails {
    fn apply(self, p: &mut Publication) {
        p.common.title = trimmed(self.title);
        p.common.year = trimmed(self.year);
        p.common.keywords = clean_list(self.keywords);
        p.publication = trimmed(self.publication);
        p.volume = trimmed(self.volume);
        p.issue = trimmed(self.issue);
        p.page_first = trimmed(self.page_first);
        p.page_last = trimmed(self.page_last);
        p.isbn = clean_list(self.isbn);
        p.issn = clean_list(self.issn);
        p.doi = trimmed(self.doi);
        p.publisher = trimmed(self.publisher);
        p.place_of_publication = trimmed(self.place_of_publication);
        p.language = clean_list(self.language);
        p.defense_date = self.defense_date;
        p.defense_place = trimmed(self.defense_place);
        p.conference = self.conference;
    }
}

pub async fn update_details(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(details): JsonBody<PublicationDetails>,
) -> Result<Response, ApiError> {
    edit::<Publication, _>(&state, &user, id, if_match, permissions::can_edit, |p| {
        details.apply(p);
        Ok(())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct TypeBody {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Change the publication type (curators).
///
/// Editors are moved to authors when the new type has no editors and the
/// record has no authors yet.
pub async fn update_type(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<TypeBody>,
) -> Result<Response, ApiError> {
    let kind: PublicationKind = body.kind.parse()?;
    edit::<Publication, _>(&state, &user, id, if_match, curator_can_edit, |p| {
        p.kind = kind;
        if !kind.uses_editors() && p.author.is_empty() && !p.editor.is_empty() {
            p.author = std::mem::take(&mut p.editor);
        }
        Ok(())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct ClassificationBody {
    pub classification: String,
}

/// Change the classification (curators).
///
/// # Returns
/// - 200 OK with the publication and its new `ETag`
/// - 400 Bad Request for an unknown classification
/// - 403 Forbidden for non-curators
pub async fn update_classification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<ClassificationBody>,
) -> Result<Response, ApiError> {
    let classification = body.classification.trim().to_string();
    if !defaults::CLASSIFICATIONS.contains(&classification.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "unknown classification '{}'",
            classification
        )));
    }
    edit::<Publication, _>(&state, &user, id, if_match, curator_can_edit, |p| {
        p.classification = classification;
        Ok(())
    })
    .await
}

// =============================================================================
// FILES
// =============================================================================

/// File metadata as submitted by the client; the id is assigned here.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileBody {
    pub name: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub access_level: Option<AccessLevel>,
    pub access_level_after_embargo: Option<AccessLevel>,
    pub embargo_date: Option<NaiveDate>,
    pub license: String,
    pub relation: String,
    pub publication_version: Option<String>,
}

impl FileBody {
    fn into_file(self, id: Uuid) -> Result<PublicationFile, ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("file name is required".to_string()));
        }
        if self.size < 0 {
            return Err(ApiError::BadRequest("file size must not be negative".to_string()));
        }
        Ok(PublicationFile {
            id,
            name: trimmed(self.name),
            content_type: self.content_type,
            size: self.size,
            sha256: self.sha256,
            access_level: self.access_level,
            access_level_after_embargo: self.access_level_after_embargo,
            embargo_date: self.embargo_date,
            license: self.license,
            relation: if self.relation.is_empty() {
                "main_file".to_string()
            } else {
                self.relation
            },
            publication_version: self.publication_version.filter(|v| !v.is_empty()),
        })
    }
}

/// Attach file metadata; the file id is assigned here.
///
/// # Returns
/// - 200 OK with the publication and its new `ETag`
/// - 400 Bad Request without a file name or with a negative size
/// - 422 Unprocessable Entity if the file fails validation
pub async fn add_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<FileBody>,
) -> Result<Response, ApiError> {
    let file = body.into_file(Uuid::now_v7())?;
    edit::<Publication, _>(&state, &user, id, if_match, permissions::can_edit, |p| {
        p.files.push(file);
        Ok(())
    })
    .await
}

pub async fn update_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, file_id)): Path<(Uuid, Uuid)>,
    JsonBody(body): JsonBody<FileBody>,
) -> Result<Response, ApiError> {
    let file = body.into_file(file_id)?;
    edit::<Publication, _>(&state, &user, id, if_match, permissions::can_edit, |p| {
        let slot = p
            .file_mut(file_id)
            .ok_or_else(|| ApiError::NotFound(format!("File {} not found", file_id)))?;
        *slot = file;
        Ok(())
    })
    .await
}

pub async fn remove_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, file_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    edit::<Publication, _>(&state, &user, id, if_match, permissions::can_edit, |p| {
        p.remove_file(file_id)
            .ok_or_else(|| ApiError::NotFound(format!("File {} not found", file_id)))?;
        Ok(())
    })
    .await
}

// =============================================================================
// RELATED DATASETS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RelatedDatasetBody {
    pub dataset_id: Uuid,
}

/// Link a dataset; both records are updated.
///
/// # Returns
/// - 200 OK with the publication and its new `ETag`
/// - 403 Forbidden if either record is locked or deleted for this user; the
///   publication is left untouched
/// - 404 Not Found if the dataset does not exist
/// - 409 Conflict if `If-Match` is stale
pub async fn add_dataset(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<RelatedDatasetBody>,
) -> Result<Response, ApiError> {
    relate::<Publication, Dataset>(
        &state,
        &user,
        id,
        if_match,
        body.dataset_id,
        RelationChange::Link,
    )
    .await
}

/// Unlink a dataset from both sides.
pub async fn remove_dataset(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, dataset_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    relate::<Publication, Dataset>(
        &state,
        &user,
        id,
        if_match,
        dataset_id,
        RelationChange::Unlink,
    )
    .await
}
