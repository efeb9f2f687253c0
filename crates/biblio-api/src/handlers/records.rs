//! Search, create, read, history and delete for datasets and publications.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use biblio_core::{permissions, FacetValue, Record, SearchArgs, SearchScope, Status, User};

use crate::error::ApiError;
use crate::extract::{CurrentUser, IfMatch, JsonBody};
use crate::handlers::{edit, ensure, load, record_response};
use crate::state::{AppState, RecordStore};

/// A page of search results with the records themselves.
#[derive(Debug, Serialize)]
pub struct SearchPage<T> {
    pub total: u64,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub hits: Vec<T>,
    pub facets: BTreeMap<String, Vec<FacetValue>>,
}

/// Run a search in the user's scope and load the matching records.
pub async fn search_records<T: RecordStore>(
    state: &AppState,
    user: &User,
    args: &SearchArgs,
) -> Result<SearchPage<T>, ApiError> {
    let scope = SearchScope::for_user(user);
    let hits = state.searcher.search(T::KIND, args, &scope).await?;
    let mut records = T::repository(state).get_many(&hits.ids).await?;
    for record in &mut records {
        record.redact_for(user);
    }
    Ok(SearchPage {
        total: hits.total,
        page: hits.page,
        page_size: hits.page_size,
        total_pages: hits.total_pages(),
        has_next_page: hits.has_next_page(),
        hits: records,
        facets: hits.facets,
    })
}

/// Faceted search within the user's scope.
///
/// Researchers see records they created, own or are credited on; curators
/// see everything.
///
/// # Query Parameters
/// - `q`: free text
/// - `f[<field>]`: filter value (repeatable)
/// - `facet`: facet field (repeatable)
/// - `page`, `page_size`, `sort`
///
/// # Returns
/// - 200 OK with the page of records, the total and the facet counts
/// - 400 Bad Request for unknown fields, sorts or pages past the result window
/// - 500 Internal Server Error if the search backend fails
pub async fn search<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<SearchPage<T>>, ApiError> {
    let args = SearchArgs::from_query_pairs(&pairs)?;
    Ok(Json(search_records::<T>(&state, &user, &args).await?))
}

/// Create a record owned by the current user.
///
/// Identity, snapshot, workflow and reviewer fields in the body are ignored.
///
/// # Returns
/// - 201 Created with the stored record and its `ETag`
/// - 400 Bad Request if the body is not a record
/// - 422 Unprocessable Entity if the record is invalid
pub async fn create<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(mut record): JsonBody<T>,
) -> Result<Response, ApiError> {
    {
        let common = record.common_mut();
        common.id = Uuid::now_v7();
        common.snapshot_id = None;
        common.date_from = None;
        common.date_until = None;
        common.date_created = None;
        common.date_updated = None;
        common.creator_id = Some(user.id.clone());
        common.last_user_id = None;
        common.status = Status::New;
        common.locked = false;
        common.has_been_public = false;
        if !user.can_curate() {
            common.user_id = None;
            common.reviewer_note.clear();
            common.reviewer_tags.clear();
        }
    }
    record.validate()?;

    let saved = T::repository(&state).create(record, Some(&user)).await?;
    info!(
        subsystem = "api",
        op = "create",
        record_kind = T::KIND.as_str(),
        record_id = %saved.id(),
        user_id = %user.id,
        "Record created"
    );
    Ok(record_response(StatusCode::CREATED, saved, &user))
}

/// A record as the current user may see it.
///
/// # Returns
/// - 200 OK with the record and its `ETag`
/// - 403 Forbidden if the user may not view it
/// - 404 Not Found if it does not exist
pub async fn get<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = load::<T>(&state, id).await?;
    ensure(permissions::can_view(&user, &record))?;
    Ok(record_response(StatusCode::OK, record, &user))
}

/// Every stored version of a record, newest first.
pub async fn history<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<T>>, ApiError> {
    let record = load::<T>(&state, id).await?;
    ensure(permissions::can_view(&user, &record))?;
    let mut versions = T::repository(&state).history(id).await?;
    for version in &mut versions {
        version.redact_for(&user);
    }
    Ok(Json(versions))
}

/// Soft-delete a record.
///
/// The record stays in storage with status `deleted` and disappears from
/// researcher searches.
///
/// # Returns
/// - 200 OK with the deleted record and its new `ETag`
/// - 403 Forbidden if the record is already deleted, or was public once and
///   the user is not a curator
/// - 409 Conflict if `If-Match` is stale
/// - 428 Precondition Required without `If-Match`
pub async fn delete<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    edit::<T, _>(
        &state,
        &user,
        id,
        if_match,
        permissions::can_delete,
        |record| {
            record.common_mut().soft_delete()?;
            Ok(())
        },
    )
    .await
}
