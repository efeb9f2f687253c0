//! Centralized default constants for the Biblio backoffice.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers; environment configuration falls back to them.

// =============================================================================
// SERVER
// =============================================================================

/// Default bind address.
pub const HOST: &str = "0.0.0.0";

/// Default HTTP port.
pub const PORT: u16 = 3000;

/// Default maximum request body size in bytes.
pub const REQUEST_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Default database URL for local development.
pub const DATABASE_URL: &str = "postgres://localhost/biblio";

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for search results.
pub const PAGE_SIZE: usize = 20;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: usize = 500;

/// Deepest hit a paged search may reach (`index.max_result_window`).
pub const MAX_RESULT_WINDOW: usize = 10_000;

/// Default limit for suggest (autocomplete) lookups.
pub const SUGGEST_LIMIT: i64 = 10;

/// Default limit for frontoffice harvesting pages.
pub const HARVEST_LIMIT: i64 = 100;

/// Largest frontoffice harvesting page.
pub const MAX_HARVEST_LIMIT: i64 = 1000;

/// Page size used when iterating a whole repository (reindex, sweeps).
pub const REPOSITORY_PAGE_SIZE: i64 = 250;

// =============================================================================
// SEARCH
// =============================================================================

/// Default Elasticsearch URL.
pub const ES_URL: &str = "http://localhost:9200";

/// Default alias for the dataset index.
pub const ES_DATASET_ALIAS: &str = "biblio_datasets";

/// Default alias for the publication index.
pub const ES_PUBLICATION_ALIAS: &str = "biblio_publications";

/// Number of buckets returned per facet.
pub const FACET_SIZE: usize = 50;

/// Number of operations per bulk request.
pub const INDEX_BATCH_SIZE: usize = 250;

/// Maximum time a queued index operation waits before a flush (milliseconds).
pub const INDEX_FLUSH_MS: u64 = 1000;

/// Capacity of the asynchronous index queue.
pub const INDEX_QUEUE_CAPACITY: usize = 4096;

/// HTTP timeout for search requests (seconds).
pub const ES_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// TASKS
// =============================================================================

/// Number of tasks that may run concurrently in the task hub.
pub const TASK_WORKERS: usize = 4;

/// How long finished task statuses are retained (seconds).
pub const TASK_RETENTION_SECS: u64 = 3600;

/// Interval of the task status cleanup sweep (seconds).
pub const TASK_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Capacity of the task hub command channel.
pub const TASK_COMMAND_CAPACITY: usize = 256;

/// Interval between scheduled embargo sweeps (seconds).
pub const EMBARGO_SWEEP_INTERVAL_SECS: u64 = 6 * 3600;

// =============================================================================
// ORCID
// =============================================================================

/// ORCID member API base URL.
pub const ORCID_URL: &str = "https://api.orcid.org";

/// HTTP timeout for ORCID requests (seconds).
pub const ORCID_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CACHING
// =============================================================================

/// Capacity of each directory read-through cache.
pub const CACHE_SIZE: usize = 1000;

/// Time-to-live of directory cache entries (seconds).
pub const CACHE_TTL_SECS: u64 = 300;

// =============================================================================
// VALIDATION
// =============================================================================

/// Supported language codes for abstracts (ISO 639-2/B subset plus "und").
pub const LANGUAGES: &[&str] = &[
    "dut", "eng", "fre", "ger", "ita", "spa", "por", "swe", "dan", "nor", "fin", "pol", "cze",
    "rus", "chi", "jpn", "ara", "lat", "gre", "tur", "und",
];

/// Publication classifications.
pub const CLASSIFICATIONS: &[&str] = &[
    "U", "A1", "A2", "A3", "A4", "B1", "B2", "B3", "C1", "C3", "D1", "D2", "P1", "V",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_within_max() {
        assert!(PAGE_SIZE <= MAX_PAGE_SIZE);
        assert!(MAX_PAGE_SIZE <= MAX_RESULT_WINDOW);
        assert!(HARVEST_LIMIT <= MAX_HARVEST_LIMIT);
    }

    #[test]
    fn test_languages_contain_undetermined() {
        assert!(LANGUAGES.contains(&"und"));
        assert!(LANGUAGES.contains(&"eng"));
    }
}
