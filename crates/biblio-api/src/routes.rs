//! Route table and middleware stack.

use std::time::Duration;

use axum::{
    http::{header, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use biblio_core::{Dataset, Publication};

use crate::config::ServerConfig;
use crate::handlers::{
    contributors, dashboard, datasets, directory, editing, export, frontoffice, publications,
    records, tasks, workflow,
};
use crate::handlers::{export::ExportCsv, frontoffice::PublicView};
use crate::state::AppState;

/// Request ids are UUIDv7 so they sort by arrival time in the logs.
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Routes shared by datasets and publications, relative to `/<kind>`.
fn record_routes<T: ExportCsv + PublicView>() -> Router<AppState> {
    Router::new()
        .route("/", get(records::search::<T>).post(records::create::<T>))
        .route("/:id", get(records::get::<T>).delete(records::delete::<T>))
        .route("/:id/history", get(records::history::<T>))
        .route("/:id/abstracts", post(editing::add_abstract::<T>))
        .route(
            "/:id/abstracts/:abstract_id",
            put(editing::update_abstract::<T>).delete(editing::remove_abstract::<T>),
        )
        .route("/:id/links", post(editing::add_link::<T>))
        .route(
            "/:id/links/:link_id",
            put(editing::update_link::<T>).delete(editing::remove_link::<T>),
        )
        .route("/:id/departments", post(editing::add_department::<T>))
        .route(
            "/:id/departments/:organization_id",
            delete(editing::remove_department::<T>),
        )
        .route("/:id/projects", post(editing::add_project::<T>))
        .route(
            "/:id/projects/:project_id",
            delete(editing::remove_project::<T>),
        )
        .route(
            "/:id/contributors/:role",
            post(contributors::add::<T>).put(contributors::reorder::<T>),
        )
        .route(
            "/:id/contributors/:role/:position",
            put(contributors::update::<T>).delete(contributors::remove::<T>),
        )
        .route("/:id/message", put(editing::update_message::<T>))
        .route("/:id/reviewer-note", put(editing::update_reviewer_note::<T>))
        .route("/:id/reviewer-tags", put(editing::update_reviewer_tags::<T>))
        .route("/:id/draft", post(workflow::save_draft::<T>))
        .route("/:id/publish", post(workflow::publish::<T>))
        .route("/:id/withdraw", post(workflow::withdraw::<T>))
        .route("/:id/republish", post(workflow::republish::<T>))
        .route("/:id/lock", post(workflow::lock::<T>))
        .route("/:id/unlock", post(workflow::unlock::<T>))
}

fn dataset_routes() -> Router<AppState> {
    record_routes::<Dataset>()
        .route("/:id/details", put(datasets::update_details))
        .route("/:id/publications", post(datasets::add_publication))
        .route(
            "/:id/publications/:publication_id",
            delete(datasets::remove_publication),
        )
}

fn publication_routes() -> Router<AppState> {
    record_routes::<Publication>()
        .route("/:id/details", put(publications::update_details))
        .route("/:id/type", put(publications::update_type))
        .route(
            "/:id/classification",
            put(publications::update_classification),
        )
        .route("/:id/files", post(publications::add_file))
        .route(
            "/:id/files/:file_id",
            put(publications::update_file).delete(publications::remove_file),
        )
        .route("/:id/datasets", post(publications::add_dataset))
        .route(
            "/:id/datasets/:dataset_id",
            delete(publications::remove_dataset),
        )
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/datasets", dataset_routes())
        .nest("/publications", publication_routes())
        .route("/dashboard", get(dashboard::dashboard))
        .route("/export/datasets", get(export::export::<Dataset>))
        .route("/export/publications", get(export::export::<Publication>))
        .route("/tasks/orcid-sync", post(tasks::start_orcid_sync))
        .route("/tasks/reindex", post(tasks::start_reindex))
        .route("/tasks/embargo-sweep", post(tasks::start_embargo_sweep))
        .route("/tasks/:id", get(tasks::get_status))
        .route("/people", get(directory::suggest_people))
        .route("/people/:id", get(directory::get_person))
        .route("/organizations", get(directory::suggest_organizations))
        .route("/organizations/:id", get(directory::get_organization))
        .route("/organizations/:id/tree", get(directory::organization_tree))
        .route("/projects", get(directory::suggest_projects))
        .route("/projects/:id", get(directory::get_project))
        .route("/me", get(directory::me))
        .route("/me/orcid", put(directory::set_orcid_token))
        .route(
            "/admin/cache",
            get(directory::cache_stats).delete(directory::clear_caches),
        )
}

fn frontoffice_routes() -> Router<AppState> {
    Router::new()
        .route("/datasets", get(frontoffice::harvest::<Dataset>))
        .route("/datasets/:id", get(frontoffice::get::<Dataset>))
        .route("/publications", get(frontoffice::harvest::<Publication>))
        .route("/publications/:id", get(frontoffice::get::<Publication>))
}

/// Router with the default server configuration.
pub fn router(state: AppState) -> Router {
    router_with_config(state, &ServerConfig::default())
}

pub fn router_with_config(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(directory::health_check))
        .nest("/api/v1", api_routes())
        .nest("/frontoffice", frontoffice_routes())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config.allowed_origins.clone()))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::IF_MATCH,
                ])
                .expose_headers([header::ETAG])
                .allow_credentials(true)
                .max_age(Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(config.request_body_limit))
        .with_state(state)
}
