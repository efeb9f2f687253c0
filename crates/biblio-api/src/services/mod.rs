//! Service layer wrapping the directory backends.

pub mod cache;

pub use cache::{
    CacheStats, CachedOrganizationService, CachedPersonService, CachedProjectService,
    DirectoryCaches, TtlLruCache,
};
