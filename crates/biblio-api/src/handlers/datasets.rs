//! Dataset specific editing.

use axum::{
    extract::{Path, State},
    response::Response,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use biblio_core::record::clean_list;
use biblio_core::{permissions, AccessLevel, Dataset, Identifier, Publication};

use crate::error::ApiError;
use crate::extract::{CurrentUser, IfMatch, JsonBody};
use crate::handlers::edit;
use crate::handlers::relations::{relate, RelationChange};
use crate::state::AppState;

/// Replacement values for the dataset details form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatasetDetails {
    pub title: String,
    pub year: String,
    pub publisher: String,
    pub identifiers: Vec<Identifier>,
    pub format: Vec<String>,
    pub language: Vec<String>,
    pub keywords: Vec<String>,
    pub license: String,
    pub other_license: String,
    pub access_level: Option<AccessLevel>,
    pub access_level_after_embargo: Option<AccessLevel>,
    pub embargo_date: Option<NaiveDate>,
}

impl DatasetDetails {
    fn apply(self, d: &mut Dataset) {
        d.common.title = self.title.trim().to_string();
        d.common.year = self.year.trim().to_string();
        d.common.keywords = clean_list(self.keywords);
        d.publisher = self.publisher.trim().to_string();
        d.identifiers = self
            .identifiers
            .into_iter()
            .filter(|i| !i.value.trim().is_empty())
            .collect();
        d.format = clean_list(self.format);
        d.language = clean_list(self.language);
        d.license = self.license;
        d.other_license = self.other_license;
        d.access_level = self.access_level;
        d.access_level_after_embargo = self.access_level_after_embargo;
        d.embargo_date = self.embargo_date;
    }
}

/// Replace the dataset details form fields.
///
/// # Returns
/// - 200 OK with the dataset and its new `ETag`
/// - 422 Unprocessable Entity if a value is invalid
pub async fn update_details(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(details): JsonBody<DatasetDetails>,
) -> Result<Response, ApiError> {
    edit::<Dataset, _>(&state, &user, id, if_match, permissions::can_edit, |d| {
        details.apply(d);
        Ok(())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct RelatedPublicationBody {
    pub publication_id: Uuid,
}

/// Link a publication; both records are updated.
///
/// # Returns
/// - 200 OK with the dataset and its new `ETag`
/// - 403 Forbidden if either record is locked or deleted for this user; the
///   dataset is left untouched
/// - 404 Not Found if the publication does not exist
/// - 409 Conflict if `If-Match` is stale
pub async fn add_publication(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<RelatedPublicationBody>,
) -> Result<Response, ApiError> {
    relate::<Dataset, Publication>(
        &state,
        &user,
        id,
        if_match,
        body.publication_id,
        RelationChange::Link,
    )
    .await
}

/// Unlink a publication from both sides.
///
/// A publication that was purged or deleted in the meantime only loses the
/// link on the dataset side.
pub async fn remove_publication(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, publication_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    relate::<Dataset, Publication>(
        &state,
        &user,
        id,
        if_match,
        publication_id,
        RelationChange::Unlink,
    )
    .await
}
