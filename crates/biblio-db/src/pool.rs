//! Postgres pool for the record and directory stores.
//!
//! Connections identify themselves as `biblio` in `pg_stat_activity` and may
//! carry a server-side statement timeout, so a runaway snapshot scan cannot
//! hold a connection forever.

use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use biblio_core::{Error, RecordKind, Result};

/// Default maximum number of connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default time to wait for a free connection, in seconds.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// `application_name` reported to Postgres.
pub const APPLICATION_NAME: &str = "biblio";

/// Pool settings, read from `DATABASE_*` variables by [`PoolConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on open connections (`DATABASE_MAX_CONNECTIONS`).
    pub max_connections: u32,
    /// Connections kept open while idle (`DATABASE_MIN_CONNECTIONS`).
    pub min_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    /// Server-side `statement_timeout` (`DATABASE_STATEMENT_TIMEOUT_SECS`);
    /// `None` keeps the server default.
    pub statement_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            statement_timeout: None,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool settings from the environment; unset or unparsable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| get(key).and_then(|v| v.trim().parse::<u64>().ok());
        let base = Self::default();
        Self {
            max_connections: parse("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(base.max_connections),
            min_connections: parse("DATABASE_MIN_CONNECTIONS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(base.min_connections),
            statement_timeout: parse("DATABASE_STATEMENT_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            ..base
        }
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    fn connect_options(&self, database_url: &str) -> Result<PgConnectOptions> {
        let mut options = PgConnectOptions::from_str(database_url)
            .map_err(Error::Database)?
            .application_name(APPLICATION_NAME);
        if let Some(timeout) = self.statement_timeout {
            options = options.options([("statement_timeout", statement_timeout_setting(timeout))]);
        }
        Ok(options)
    }
}

/// Postgres accepts a millisecond count with an `ms` unit.
fn statement_timeout_setting(timeout: Duration) -> String {
    format!("{}ms", timeout.as_millis())
}

/// Create a pool with [`PoolConfig::default`].
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = "database",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        statement_timeout_ms = config.statement_timeout.map(|t| t.as_millis() as u64),
        "Creating database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(config.acquire_timeout)
        .connect_with(config.connect_options(database_url)?)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Log pool usage; warns when every connection is checked out.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "database",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "database",
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections"
        );
    }
}

/// Row counts of one snapshot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotStats {
    pub kind: RecordKind,
    /// Records with an open (current) snapshot.
    pub current: i64,
    /// Every stored version, current and closed.
    pub versions: i64,
}

impl SnapshotStats {
    /// Closed snapshots kept as history.
    pub fn history(&self) -> i64 {
        self.versions - self.current
    }
}

/// Count current and historical snapshots for datasets and publications.
pub async fn snapshot_stats(pool: &PgPool) -> Result<Vec<SnapshotStats>> {
    let mut stats = Vec::with_capacity(2);
    for kind in [RecordKind::Dataset, RecordKind::Publication] {
        let (current, versions): (i64, i64) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FILTER (WHERE date_until IS NULL), COUNT(*) FROM {}",
            kind.table()
        ))
        .fetch_one(pool)
        .await
        .map_err(Error::Database)?;
        stats.push(SnapshotStats {
            kind,
            current,
            versions,
        });
    }
    Ok(stats)
}

/// Log [`snapshot_stats`] at startup; failures are logged, not returned.
pub async fn log_snapshot_metrics(pool: &PgPool) {
    match snapshot_stats(pool).await {
        Ok(stats) => {
            for s in stats {
                info!(
                    subsystem = "database",
                    component = "snapshots",
                    op = "metrics",
                    record_kind = s.kind.as_str(),
                    current = s.current,
                    history = s.history(),
                    "Snapshot table size"
                );
            }
        }
        Err(e) => warn!(
            subsystem = "database",
            component = "snapshots",
            error = %e,
            "Could not count snapshots"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::from_lookup(lookup(&[]));
        assert_eq!(config, PoolConfig::default());
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.statement_timeout.is_none());
    }

    #[test]
    fn test_pool_config_from_environment() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("DATABASE_MAX_CONNECTIONS", "25"),
            ("DATABASE_MIN_CONNECTIONS", "2"),
            ("DATABASE_STATEMENT_TIMEOUT_SECS", "15"),
        ]));
        assert_eq!(config.max_connections, 25);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.statement_timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("DATABASE_MAX_CONNECTIONS", "0"),
            ("DATABASE_MIN_CONNECTIONS", "many"),
            ("DATABASE_STATEMENT_TIMEOUT_SECS", "0"),
        ]));
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn test_statement_timeout_setting() {
        assert_eq!(statement_timeout_setting(Duration::from_secs(15)), "15000ms");
        assert_eq!(statement_timeout_setting(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn test_connect_options_reject_bad_url() {
        assert!(PoolConfig::new().connect_options("not a url").is_err());
        assert!(PoolConfig::new()
            .statement_timeout(Some(Duration::from_secs(5)))
            .connect_options("postgres://localhost/biblio")
            .is_ok());
    }

    #[test]
    fn test_history_is_closed_versions() {
        let stats = SnapshotStats {
            kind: RecordKind::Dataset,
            current: 4,
            versions: 11,
        };
        assert_eq!(stats.history(), 7);
    }
}
