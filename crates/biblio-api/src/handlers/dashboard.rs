//! Curator dashboard: record counts per status and faculty.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use futures::future::try_join_all;
use serde::Serialize;

use biblio_core::{RecordKind, SearchArgs, SearchScope, Status};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::handlers::ensure;
use crate::state::AppState;

const STATUSES: [Status; 4] = [Status::New, Status::Private, Status::Public, Status::Returned];

#[derive(Debug, Default, Serialize)]
pub struct StatusCounts {
    pub total: u64,
    /// Faculty id to record count.
    pub faculties: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub datasets: BTreeMap<String, StatusCounts>,
    pub publications: BTreeMap<String, StatusCounts>,
}

async fn counts(
    state: &AppState,
    kind: RecordKind,
) -> Result<BTreeMap<String, StatusCounts>, ApiError> {
    let searches = STATUSES.iter().map(|status| async move {
        let args = SearchArgs::new()
            .with_filter("status", status.as_str())
            .with_facets(["faculty_id"])
            .with_page(1, 1);
        let hits = state.searcher.search(kind, &args, &SearchScope::All).await?;
        let faculties = hits
            .facets
            .get("faculty_id")
            .map(|values| values.iter().map(|v| (v.value.clone(), v.count)).collect())
            .unwrap_or_default();
        Ok::<_, ApiError>((
            status.as_str().to_string(),
            StatusCounts {
                total: hits.total,
                faculties,
            },
        ))
    });
    Ok(try_join_all(searches).await?.into_iter().collect())
}

/// Status × faculty counts for datasets and publications.
///
/// # Returns
/// - 200 OK with one count table per record kind
/// - 403 Forbidden for non-curators
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Dashboard>, ApiError> {
    ensure(user.can_curate())?;
    let (datasets, publications) = futures::try_join!(
        counts(&state, RecordKind::Dataset),
        counts(&state, RecordKind::Publication)
    )?;
    Ok(Json(Dashboard {
        datasets,
        publications,
    }))
}
