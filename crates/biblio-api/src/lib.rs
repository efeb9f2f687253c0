//! # biblio-api
//!
//! HTTP API of the Biblio backoffice: record editing with optimistic
//! concurrency, faceted search, dashboard, CSV export, background tasks,
//! directory lookups and the public frontoffice API.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{parse_allowed_origins, CacheConfig, ServerConfig};
pub use error::ApiError;
pub use extract::{CurrentUser, IfMatch, JsonBody};
pub use routes::{router, router_with_config};
pub use services::DirectoryCaches;
pub use state::{AppState, RecordStore, SearchIndex};
