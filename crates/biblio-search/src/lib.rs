//! # biblio-search
//!
//! Elasticsearch indexing and faceted search for the Biblio backoffice.
//!
//! This crate provides:
//! - A small Elasticsearch 6 REST client (indices, aliases, bulk, search)
//! - Flattened search documents for datasets and publications
//! - A faceted query builder whose facet counts ignore their own filter
//! - Buffered bulk indexing, alias-switching reindexing and an asynchronous
//!   index queue fed by repository change notifications
//!
//! ## Example
//!
//! ```ignore
//! use biblio_search::{EsClient, EsSearcher, IndexNames};
//!
//! let searcher = EsSearcher::new(EsClient::from_env()?, IndexNames::from_env());
//! let args = SearchArgs::new().with_query("soil").with_facets(["status"]);
//! let hits = searcher.search(RecordKind::Dataset, &args, &SearchScope::All).await?;
//! ```

pub mod bulk;
pub mod client;
pub mod docs;
pub mod mapping;
pub mod query;
pub mod queue;
pub mod reindex;
pub mod searcher;

pub use bulk::BulkIndexer;
pub use client::{BulkFailure, BulkOp, BulkReport, EsClient, IndexNames};
pub use docs::{DocumentBuilder, Indexable};
pub use mapping::{index_settings, versioned_index_name};
pub use query::{build_search, is_allowed_field, parse_search};
pub use queue::{IndexQueue, IndexQueueConfig};
pub use reindex::{ensure_alias, ReindexProgress, ReindexReport, Reindexer};
pub use searcher::EsSearcher;
