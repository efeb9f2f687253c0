//! Starting and polling background tasks.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use biblio_core::{Dataset, Publication, User};
use biblio_jobs::{EmbargoSweepTask, OrcidSyncTask, ReindexTask, Task, TaskInfo};
use biblio_search::Reindexer;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::handlers::ensure;
use crate::state::{AppState, RecordStore, SearchIndex};

#[derive(Debug, Serialize)]
pub struct StartedTasks {
    pub ids: Vec<Uuid>,
}

/// Embargo sweeps for both record kinds.
pub fn embargo_tasks(state: &AppState) -> Vec<Arc<dyn Task>> {
    let datasets: Arc<dyn Task> = Arc::new(EmbargoSweepTask::new(state.datasets.clone()));
    let publications: Arc<dyn Task> =
        Arc::new(EmbargoSweepTask::new(state.publications.clone()));
    vec![datasets, publications]
}

fn reindex_task<T: RecordStore>(state: &AppState, index: &SearchIndex) -> Arc<dyn Task> {
    let reindexer = Reindexer::new(
        index.client.clone(),
        index.names.alias(T::KIND),
        T::repository(state),
    )
    .with_documents(index.documents.clone());
    Arc::new(ReindexTask::new(reindexer))
}

async fn start_all(
    state: &AppState,
    user: &User,
    tasks: Vec<Arc<dyn Task>>,
) -> Result<(StatusCode, Json<StartedTasks>), ApiError> {
    let mut ids = Vec::with_capacity(tasks.len());
    for task in tasks {
        ids.push(state.tasks.submit(task, Some(user.id.clone())).await?);
    }
    Ok((StatusCode::ACCEPTED, Json(StartedTasks { ids })))
}

/// Push the current user's public publications to their ORCID record.
///
/// # Returns
/// - 202 Accepted with the id of the queued task; poll it with [`get_status`]
/// - 400 Bad Request if the account is not linked to a person
pub async fn start_orcid_sync(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<(StatusCode, Json<StartedTasks>), ApiError> {
    let person_id = user
        .person_id
        .clone()
        .ok_or_else(|| ApiError::BadRequest("Your account is not linked to a person".into()))?;
    let mut task = OrcidSyncTask::new(
        person_id.clone(),
        state.people.clone(),
        state.publications.clone(),
        state.searcher.clone(),
        state.orcid.clone(),
    );
    if let Some(url) = &state.frontoffice_url {
        task = task.with_frontoffice_url(url.clone());
    }
    let task = task.with_user(user.clone());

    info!(subsystem = "api", user_id = %user.id, person_id = %person_id, "ORCID sync requested");
    start_all(&state, &user, vec![Arc::new(task)]).await
}

/// Rebuild both search indices (admins).
///
/// # Returns
/// - 202 Accepted with one task id per record kind
/// - 400 Bad Request if search indexing is disabled
/// - 403 Forbidden for non-admins
pub async fn start_reindex(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<(StatusCode, Json<StartedTasks>), ApiError> {
    ensure(user.is_admin())?;
    let index = state
        .search_index
        .clone()
        .ok_or_else(|| ApiError::BadRequest("Search indexing is disabled".into()))?;
    let tasks = vec![
        reindex_task::<Dataset>(&state, &index),
        reindex_task::<Publication>(&state, &index),
    ];
    start_all(&state, &user, tasks).await
}

/// Lift due embargoes now instead of waiting for the scheduled sweep.
///
/// Curators only; 202 with one task id per record kind.
pub async fn start_embargo_sweep(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<(StatusCode, Json<StartedTasks>), ApiError> {
    ensure(user.can_curate())?;
    let tasks = embargo_tasks(&state);
    start_all(&state, &user, tasks).await
}

/// Curators see every task, everyone else only the tasks they started.
fn can_view_task(user: &User, info: &TaskInfo) -> bool {
    user.can_curate() || info.submitted_by.as_deref() == Some(user.id.as_str())
}

/// Status and progress of a task.
///
/// # Returns
/// - 200 OK with the state: `waiting`, `running` with `done`/`total`, `done`,
///   or `failed` with the error
/// - 404 Not Found if the task is unknown, expired, or was started by someone
///   else (curators see every task)
pub async fn get_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskInfo>, ApiError> {
    state
        .tasks
        .status(id)
        .await?
        .filter(|info| can_view_task(&user, info))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_core::Role;
    use biblio_db::test_fixtures;
    use biblio_jobs::TaskStatus;
    use chrono::Utc;

    fn info(submitted_by: Option<&str>) -> TaskInfo {
        TaskInfo {
            id: Uuid::now_v7(),
            name: "orcid_sync".into(),
            submitted_by: submitted_by.map(str::to_string),
            status: TaskStatus::Waiting,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_task_visibility() {
        let alice = test_fixtures::user("alice", Role::User);
        let bob = test_fixtures::user("bob", Role::User);
        let carol = test_fixtures::user("carol", Role::Curator);

        let own = info(Some(alice.id.as_str()));
        assert!(can_view_task(&alice, &own));
        assert!(!can_view_task(&bob, &own));
        assert!(can_view_task(&carol, &own));

        let scheduled = info(None);
        assert!(!can_view_task(&alice, &scheduled));
        assert!(can_view_task(&carol, &scheduled));
    }
}
