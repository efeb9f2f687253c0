//! Biblio API server.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biblio_api::handlers::tasks::embargo_tasks;
use biblio_api::{
    router_with_config, AppState, CacheConfig, DirectoryCaches, SearchIndex, ServerConfig,
};
use biblio_core::{
    ChangeListener, Dataset, OrganizationService, PersonService, ProjectService, Publication,
    RecordSearcher,
};
use biblio_db::{
    log_pool_metrics, log_snapshot_metrics, Database, PgOrganizationRepository, PoolConfig,
};
use biblio_jobs::{spawn_periodic, HubConfig, OrcidClient, TaskHub};
use biblio_search::{
    ensure_alias, DocumentBuilder, EsClient, EsSearcher, IndexNames, IndexQueue, IndexQueueConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "biblio_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "biblio_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("biblio-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ServerConfig::from_env();

    let es = EsClient::from_env()?;
    let names = IndexNames::from_env();

    info!("Connecting to database...");
    let db = Database::connect_with_config(&config.database_url, PoolConfig::from_env()).await?;
    info!("Database connected");

    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");
    log_pool_metrics(db.pool());
    log_snapshot_metrics(db.pool()).await;

    // Faculties are resolved at index time, uncached so documents see renames
    let index_organizations: Arc<dyn OrganizationService> =
        Arc::new(PgOrganizationRepository::new(db.pool().clone()));
    let documents = DocumentBuilder::with_organizations(index_organizations);

    let (index_queue, index_handle) = if config.search_enabled {
        for kind in [biblio_core::RecordKind::Dataset, biblio_core::RecordKind::Publication] {
            if let Err(e) = ensure_alias(&es, names.alias(kind)).await {
                warn!(error = %e, alias = names.alias(kind), "Search index unavailable at startup");
            }
        }
        let (queue, handle) = IndexQueue::start(
            es.clone(),
            names.clone(),
            documents.clone(),
            IndexQueueConfig::from_env(),
        );
        (Some(queue), Some(handle))
    } else {
        info!("Search indexing disabled");
        (None, None)
    };

    let db = match &index_queue {
        Some(queue) => {
            let datasets: Arc<dyn ChangeListener<Dataset>> = Arc::new(queue.clone());
            let publications: Arc<dyn ChangeListener<Publication>> = Arc::new(queue.clone());
            db.with_listeners(datasets, publications)
        }
        None => db,
    };

    let Database {
        pool: _,
        datasets,
        publications,
        people,
        organizations,
        projects,
        users,
    } = db;

    let caches = DirectoryCaches::new(
        Arc::new(people),
        Arc::new(organizations),
        Arc::new(projects),
        CacheConfig::from_env(),
    );

    let (tasks, hub_handle) = TaskHub::start(HubConfig::from_env());
    let searcher: Arc<dyn RecordSearcher> = Arc::new(EsSearcher::new(es.clone(), names.clone()));

    let state = AppState {
        datasets: Arc::new(datasets),
        publications: Arc::new(publications),
        people: caches.people.clone() as Arc<dyn PersonService>,
        organizations: caches.organizations.clone() as Arc<dyn OrganizationService>,
        projects: caches.projects.clone() as Arc<dyn ProjectService>,
        users: Arc::new(users),
        searcher,
        tasks: tasks.clone(),
        orcid: OrcidClient::from_env()?,
        search_index: config.search_enabled.then(|| SearchIndex {
            client: es.clone(),
            names: names.clone(),
            documents,
        }),
        caches: Some(caches),
        frontoffice_url: config.frontoffice_url.clone(),
    };

    let sweeper = if config.embargo_sweep_enabled {
        info!(
            interval_secs = config.embargo_sweep_interval.as_secs(),
            "Embargo sweep scheduled"
        );
        let sweep_state = state.clone();
        Some(spawn_periodic(
            tasks.clone(),
            config.embargo_sweep_interval,
            move || embargo_tasks(&sweep_state),
        ))
    } else {
        None
    };

    let app = router_with_config(state, &config);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    if let Err(e) = tasks.shutdown().await {
        warn!(error = %e, "Task hub shutdown failed");
    }
    let _ = hub_handle.await;
    if let Some(queue) = index_queue {
        queue.shutdown().await;
    }
    if let Some(handle) = index_handle {
        let _ = handle.await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
