//! Shared router state.

use std::sync::Arc;

use biblio_core::{
    Dataset, OrganizationService, PersonService, ProjectService, Publication, RecordRepository,
    RecordSearcher, UserService,
};
use biblio_jobs::{OrcidClient, TaskHubHandle};
use biblio_search::{DocumentBuilder, EsClient, IndexNames, Indexable};

use crate::services::DirectoryCaches;

/// Elasticsearch handles needed to start a reindex.
#[derive(Clone)]
pub struct SearchIndex {
    pub client: EsClient,
    pub names: IndexNames,
    pub documents: DocumentBuilder,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub datasets: Arc<dyn RecordRepository<Dataset>>,
    pub publications: Arc<dyn RecordRepository<Publication>>,
    pub people: Arc<dyn PersonService>,
    pub organizations: Arc<dyn OrganizationService>,
    pub projects: Arc<dyn ProjectService>,
    pub users: Arc<dyn UserService>,
    pub searcher: Arc<dyn RecordSearcher>,
    pub tasks: TaskHubHandle,
    pub orcid: OrcidClient,
    /// None when search is disabled; reindexing is then unavailable.
    pub search_index: Option<SearchIndex>,
    /// Set when directory services are wrapped in caches.
    pub caches: Option<DirectoryCaches>,
    /// Public site the frontoffice download links point to.
    pub frontoffice_url: Option<String>,
}

/// Record kinds served by the generic record routes.
pub trait RecordStore: Indexable {
    /// Path segment under `/api/v1` and `/frontoffice`.
    const PATH: &'static str;

    fn repository(state: &AppState) -> Arc<dyn RecordRepository<Self>>;
}

impl RecordStore for Dataset {
    const PATH: &'static str = "datasets";

    fn repository(state: &AppState) -> Arc<dyn RecordRepository<Self>> {
        state.datasets.clone()
    }
}

impl RecordStore for Publication {
    const PATH: &'static str = "publications";

    fn repository(state: &AppState) -> Arc<dyn RecordRepository<Self>> {
        state.publications.clone()
    }
}
