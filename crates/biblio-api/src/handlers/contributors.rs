//! Authors, editors, supervisors and other contributors.
//!
//! Contributors are addressed by role and zero-based position. When a body
//! names a directory `person_id`, name and ORCID come from the directory and
//! only the credit roles of the body are kept.

use axum::{
    extract::{Path, State},
    response::Response,
};
use serde::Deserialize;
use uuid::Uuid;

use biblio_core::record::{remove_contributor, reorder_contributors, set_contributor};
use biblio_core::{permissions, Contributor, ContributorRole, Record};

use crate::error::ApiError;
use crate::extract::{CurrentUser, IfMatch, JsonBody};
use crate::handlers::edit;
use crate::state::{AppState, RecordStore};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContributorBody {
    pub person_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub orcid: Option<String>,
    pub credit_roles: Vec<String>,
    pub affiliations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    /// Current positions in their new order.
    pub positions: Vec<usize>,
}

fn parse_role(role: &str) -> Result<ContributorRole, ApiError> {
    role.parse().map_err(ApiError::from)
}

async fn resolve(state: &AppState, body: ContributorBody) -> Result<Contributor, ApiError> {
    let mut contributor = match body.person_id.as_deref().filter(|id| !id.is_empty()) {
        Some(person_id) => {
            let person = state
                .people
                .get_person(person_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Person {} not found", person_id)))?;
            Contributor::from_person(&person)
        }
        None => {
            let mut c = Contributor::external(body.first_name.trim(), body.last_name.trim());
            if !body.full_name.trim().is_empty() {
                c.full_name = body.full_name.trim().to_string();
            }
            c.orcid = body.orcid.filter(|o| !o.is_empty());
            if !body.affiliations.is_empty() {
                c.affiliations = body.affiliations;
            }
            c
        }
    };
    contributor.credit_roles = body.credit_roles;
    Ok(contributor)
}

/// Append a contributor to the list of `role`.
///
/// # Path Parameters
/// - `id`: record id
/// - `role`: `author`, `editor`, `supervisor` or `contributor`
///
/// # Returns
/// - 200 OK with the record and its new `ETag`
/// - 400 Bad Request for an unknown role or one the record kind does not have
/// - 404 Not Found if the record or the named directory person is missing
/// - 409 Conflict if `If-Match` is stale
pub async fn add<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, role)): Path<(Uuid, String)>,
    JsonBody(body): JsonBody<ContributorBody>,
) -> Result<Response, ApiError> {
    let role = parse_role(&role)?;
    let contributor = resolve(&state, body).await?;
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        r.contributors_for(role)?.push(contributor);
        Ok(())
    })
    .await
}

/// Replace the contributor at `position`.
///
/// # Returns
/// - 200 OK with the record and its new `ETag`
/// - 400 Bad Request if `position` is out of range
pub async fn update<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, role, position)): Path<(Uuid, String, usize)>,
    JsonBody(body): JsonBody<ContributorBody>,
) -> Result<Response, ApiError> {
    let role = parse_role(&role)?;
    let contributor = resolve(&state, body).await?;
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        set_contributor(r.contributors_for(role)?, position, contributor)?;
        Ok(())
    })
    .await
}

pub async fn remove<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, role, position)): Path<(Uuid, String, usize)>,
) -> Result<Response, ApiError> {
    let role = parse_role(&role)?;
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        remove_contributor(r.contributors_for(role)?, position)?;
        Ok(())
    })
    .await
}

/// Reorder the contributors of `role`.
///
/// `positions` lists every current position exactly once, in the new order.
///
/// # Returns
/// - 200 OK with the record and its new `ETag`
/// - 400 Bad Request if `positions` is not a permutation of the list
pub async fn reorder<T: RecordStore>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IfMatch(if_match): IfMatch,
    Path((id, role)): Path<(Uuid, String)>,
    JsonBody(body): JsonBody<ReorderBody>,
) -> Result<Response, ApiError> {
    let role = parse_role(&role)?;
    edit::<T, _>(&state, &user, id, if_match, permissions::can_edit, |r| {
        reorder_contributors(r.contributors_for(role)?, &body.positions)?;
        Ok(())
    })
    .await
}
