//! Directory lookups, the current user, cache statistics and health.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use biblio_core::{defaults, validation::is_orcid, Organization, Person, Project, User};

use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};
use crate::handlers::ensure;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

impl SuggestQuery {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(defaults::SUGGEST_LIMIT)
            .clamp(1, defaults::SUGGEST_LIMIT * 5)
    }
}

pub async fn suggest_people(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<Vec<Person>>, ApiError> {
    let people = state
        .people
        .suggest_people(query.q.trim(), query.limit())
        .await?;
    Ok(Json(people))
}

pub async fn get_person(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Person>, ApiError> {
    state
        .people
        .get_person(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Person {} not found", id)))
}

pub async fn suggest_organizations(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<Vec<Organization>>, ApiError> {
    let orgs = state
        .organizations
        .suggest_organizations(query.q.trim(), query.limit())
        .await?;
    Ok(Json(orgs))
}

pub async fn get_organization(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Organization>, ApiError> {
    state
        .organizations
        .get_organization(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Organization {} not found", id)))
}

/// The organization and its parents up to the root.
pub async fn organization_tree(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Organization>>, ApiError> {
    let chain = state.organizations.organization_tree(&id).await?;
    if chain.is_empty() {
        return Err(ApiError::NotFound(format!("Organization {} not found", id)));
    }
    Ok(Json(chain))
}

pub async fn suggest_projects(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let projects = state
        .projects
        .suggest_projects(query.q.trim(), query.limit())
        .await?;
    Ok(Json(projects))
}

pub async fn get_project(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    state
        .projects
        .get_project(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Project {} not found", id)))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[derive(Debug, Deserialize)]
pub struct OrcidTokenBody {
    pub orcid: String,
    pub token: String,
}

/// Store the ORCID iD and access token obtained by the current user.
///
/// # Request Body
/// - `orcid`: ORCID iD, `0000-0000-0000-000X`
/// - `token`: member API access token
///
/// # Returns
/// - 204 No Content on success
/// - 400 Bad Request if the iD is malformed, the token is empty, or the
///   account is not linked to a person
pub async fn set_orcid_token(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<OrcidTokenBody>,
) -> Result<StatusCode, ApiError> {
    let person_id = user
        .person_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Your account is not linked to a person".into()))?;
    let orcid = body.orcid.trim();
    if !is_orcid(orcid) {
        return Err(ApiError::BadRequest(format!("'{}' is not an ORCID iD", orcid)));
    }
    if body.token.trim().is_empty() {
        return Err(ApiError::BadRequest("token is required".into()));
    }
    state
        .people
        .set_orcid_token(person_id, orcid, body.token.trim())
        .await?;
    info!(subsystem = "api", user_id = %user.id, person_id = person_id, "ORCID token stored");
    Ok(StatusCode::NO_CONTENT)
}

/// Directory cache counters (admins).
///
/// # Returns
/// - 200 OK with hits, misses and sizes per cache (`{}` when caching is off)
/// - 403 Forbidden for non-admins
pub async fn cache_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    ensure(user.is_admin())?;
    let stats = match &state.caches {
        Some(caches) => caches.stats().await,
        None => json!({}),
    };
    Ok(Json(stats))
}

/// Drop every cached directory entry (admins).
pub async fn clear_caches(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, ApiError> {
    ensure(user.is_admin())?;
    if let Some(caches) = &state.caches {
        caches.clear().await;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
