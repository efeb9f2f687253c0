//! # biblio-db
//!
//! PostgreSQL storage for the Biblio backoffice.
//!
//! This crate provides:
//! - Connection pool management
//! - Versioned snapshot storage for datasets and publications with
//!   optimistic concurrency (`If-Match` snapshot ids)
//! - Directory repositories for people, organizations, projects and users
//! - In-memory repositories with identical semantics for tests and local runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use biblio_db::{Database, RecordRepository};
//!
//! let db = Database::connect("postgres://localhost/biblio").await?;
//! let dataset = db.datasets.create(Dataset::new("Soil samples"), Some(&user)).await?;
//! let snapshot = dataset.snapshot_id().unwrap();
//! db.datasets.update(snapshot, dataset, Some(&user)).await?;
//! ```

pub mod directory;
pub mod memory;
pub mod pool;
pub mod snapshots;

// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

pub use biblio_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use directory::{
    hash_api_key, PgOrganizationRepository, PgPersonRepository, PgProjectRepository,
    PgUserRepository,
};
pub use memory::{MemoryDirectory, MemoryRecordRepository};
pub use pool::{
    create_pool, create_pool_with_config, log_pool_metrics, log_snapshot_metrics, snapshot_stats,
    PoolConfig, SnapshotStats,
};
pub use snapshots::PgRecordRepository;

/// Combined database context with all repositories.
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub datasets: PgRecordRepository<Dataset>,
    pub publications: PgRecordRepository<Publication>,
    pub people: PgPersonRepository,
    pub organizations: PgOrganizationRepository,
    pub projects: PgProjectRepository,
    pub users: PgUserRepository,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            datasets: PgRecordRepository::new(pool.clone()),
            publications: PgRecordRepository::new(pool.clone()),
            people: PgPersonRepository::new(pool.clone()),
            organizations: PgOrganizationRepository::new(pool.clone()),
            projects: PgProjectRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            pool,
        }
    }

    /// Attach change listeners (typically the search index queue).
    pub fn with_listeners(
        mut self,
        datasets: std::sync::Arc<dyn ChangeListener<Dataset>>,
        publications: std::sync::Arc<dyn ChangeListener<Publication>>,
    ) -> Self {
        self.datasets = self.datasets.with_listener(datasets);
        self.publications = self.publications.with_listener(publications);
        self
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }
}
