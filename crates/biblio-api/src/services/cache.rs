//! Read-through caches for directory lookups.
//!
//! People, organizations and projects are resolved on almost every editing
//! request (contributor autofill, department checks, frontoffice rendering)
//! while changing rarely. Each `Cached*Service` wraps the real backend and
//! keeps recently fetched entries in a TTL-bounded LRU. Suggestions always
//! go to the backend and missing entries are never cached.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use biblio_core::{
    Organization, OrganizationService, Person, PersonService, Project, ProjectService, Result,
};

use crate::config::CacheConfig;

/// Hit and miss counters of one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// LRU cache whose entries expire `ttl` after insertion.
pub struct TtlLruCache<V> {
    entries: Mutex<LruCache<String, (Instant, V)>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlLruCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: CacheConfig) -> Self {
        Self::new(config.capacity, config.ttl)
    }

    /// Cached value for `key`; expired entries are evicted and count as a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        let fresh = match entries.get(key) {
            Some((inserted, value)) if inserted.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        };
        match fresh {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn put(&self, key: impl Into<String>, value: V) {
        self.entries
            .lock()
            .await
            .put(key.into(), (Instant::now(), value));
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.lock().await.pop(key);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().await.len(),
        }
    }
}

/// Caching [`PersonService`].
pub struct CachedPersonService {
    inner: Arc<dyn PersonService>,
    cache: TtlLruCache<Person>,
}

impl CachedPersonService {
    pub fn new(inner: Arc<dyn PersonService>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: TtlLruCache::from_config(config),
        }
    }

    pub fn cache(&self) -> &TtlLruCache<Person> {
        &self.cache
    }
}

#[async_trait]
impl PersonService for CachedPersonService {
    async fn get_person(&self, id: &str) -> Result<Option<Person>> {
        if let Some(person) = self.cache.get(id).await {
            trace!(subsystem = "api", component = "cache", person_id = id, "Person cache hit");
            return Ok(Some(person));
        }
        let person = self.inner.get_person(id).await?;
        if let Some(p) = &person {
            self.cache.put(id, p.clone()).await;
        }
        Ok(person)
    }

    async fn suggest_people(&self, query: &str, limit: i64) -> Result<Vec<Person>> {
        self.inner.suggest_people(query, limit).await
    }

    async fn set_orcid_token(&self, id: &str, orcid: &str, token: &str) -> Result<()> {
        self.inner.set_orcid_token(id, orcid, token).await?;
        self.cache.invalidate(id).await;
        Ok(())
    }
}

/// Caching [`OrganizationService`].
pub struct CachedOrganizationService {
    inner: Arc<dyn OrganizationService>,
    cache: TtlLruCache<Organization>,
}

impl CachedOrganizationService {
    pub fn new(inner: Arc<dyn OrganizationService>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: TtlLruCache::from_config(config),
        }
    }

    pub fn cache(&self) -> &TtlLruCache<Organization> {
        &self.cache
    }
}

#[async_trait]
impl OrganizationService for CachedOrganizationService {
    async fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
        if let Some(org) = self.cache.get(id).await {
            return Ok(Some(org));
        }
        let org = self.inner.get_organization(id).await?;
        if let Some(o) = &org {
            self.cache.put(id, o.clone()).await;
        }
        Ok(org)
    }

    async fn suggest_organizations(&self, query: &str, limit: i64) -> Result<Vec<Organization>> {
        self.inner.suggest_organizations(query, limit).await
    }
}

/// Caching [`ProjectService`].
pub struct CachedProjectService {
    inner: Arc<dyn ProjectService>,
    cache: TtlLruCache<Project>,
}

impl CachedProjectService {
    pub fn new(inner: Arc<dyn ProjectService>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: TtlLruCache::from_config(config),
        }
    }

    pub fn cache(&self) -> &TtlLruCache<Project> {
        &self.cache
    }
}

#[async_trait]
impl ProjectService for CachedProjectService {
    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        if let Some(project) = self.cache.get(id).await {
            return Ok(Some(project));
        }
        let project = self.inner.get_project(id).await?;
        if let Some(p) = &project {
            self.cache.put(id, p.clone()).await;
        }
        Ok(project)
    }

    async fn suggest_projects(&self, query: &str, limit: i64) -> Result<Vec<Project>> {
        self.inner.suggest_projects(query, limit).await
    }
}

/// The three directory caches, shared by the router state.
#[derive(Clone)]
pub struct DirectoryCaches {
    pub people: Arc<CachedPersonService>,
    pub organizations: Arc<CachedOrganizationService>,
    pub projects: Arc<CachedProjectService>,
}

impl DirectoryCaches {
    pub fn new(
        people: Arc<dyn PersonService>,
        organizations: Arc<dyn OrganizationService>,
        projects: Arc<dyn ProjectService>,
        config: CacheConfig,
    ) -> Self {
        Self {
            people: Arc::new(CachedPersonService::new(people, config)),
            organizations: Arc::new(CachedOrganizationService::new(organizations, config)),
            projects: Arc::new(CachedProjectService::new(projects, config)),
        }
    }

    pub async fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "people": self.people.cache().stats().await,
            "organizations": self.organizations.cache().stats().await,
            "projects": self.projects.cache().stats().await,
        })
    }

    pub async fn clear(&self) {
        self.people.cache().clear().await;
        self.organizations.cache().clear().await;
        self.projects.cache().clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = TtlLruCache::new(10, Duration::from_secs(60));
        cache.put("a", 1).await;
        assert_eq!(cache.get("a").await, Some(1));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("a").await, None);

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = TtlLruCache::new(2, Duration::from_secs(60));
        cache.put("a", 1).await;
        cache.put("b", 2).await;
        cache.get("a").await;
        cache.put("c", 3).await;
        assert_eq!(cache.get("b").await, None);
        assert_eq!(cache.get("a").await, Some(1));
        assert_eq!(cache.get("c").await, Some(3));
    }

    #[tokio::test]
    async fn test_zero_capacity_still_caches_one() {
        let cache = TtlLruCache::new(0, Duration::from_secs(60));
        cache.put("a", 1).await;
        assert_eq!(cache.get("a").await, Some(1));
    }

    struct CountingPeople {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PersonService for CountingPeople {
        async fn get_person(&self, id: &str) -> Result<Option<Person>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((id == "p1").then(|| Person {
                id: id.into(),
                full_name: "Jane Doe".into(),
                ..Default::default()
            }))
        }

        async fn suggest_people(&self, _query: &str, _limit: i64) -> Result<Vec<Person>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn set_orcid_token(&self, _id: &str, _orcid: &str, _token: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_person_read_through_and_invalidation() {
        let inner = Arc::new(CountingPeople {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedPersonService::new(inner.clone(), CacheConfig::default());

        cached.get_person("p1").await.unwrap();
        cached.get_person("p1").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        // misses are not cached
        assert!(cached.get_person("p2").await.unwrap().is_none());
        assert!(cached.get_person("p2").await.unwrap().is_none());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);

        cached.suggest_people("jane", 5).await.unwrap();
        cached.suggest_people("jane", 5).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 5);

        cached
            .set_orcid_token("p1", "0000-0002-1825-0097", "t")
            .await
            .unwrap();
        cached.get_person("p1").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 6);
    }
}
