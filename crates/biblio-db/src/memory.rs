//! In-memory repositories with the same semantics as the Postgres ones.
//!
//! Used by router tests and for running the backoffice locally without a
//! database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use biblio_core::{
    ChangeCursor, ChangeListener, Error, Organization, OrganizationService, Person, PersonService, Project,
    ProjectService, Record, RecordRepository, Result, User, UserService,
};

use crate::directory::hash_api_key;
use crate::snapshots::{notify_changed, notify_purged, stamp_created, stamp_updated};

/// Snapshot history per record id, oldest first.
pub struct MemoryRecordRepository<T: Record> {
    records: RwLock<BTreeMap<Uuid, Vec<T>>>,
    listeners: Vec<Arc<dyn ChangeListener<T>>>,
}

impl<T: Record> Default for MemoryRecordRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> MemoryRecordRepository<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ChangeListener<T>>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn current(versions: &[T]) -> Option<&T> {
        versions.last()
    }
}

#[async_trait]
impl<T: Record> RecordRepository<T> for MemoryRecordRepository<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>> {
        let records = self.records.read().await;
        Ok(records
            .get(&id)
            .and_then(|v| Self::current(v))
            .cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<T>> {
        let records = self.records.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id).and_then(|v| Self::current(v)).cloned())
            .collect())
    }

    async fn create(&self, mut record: T, user: Option<&User>) -> Result<T> {
        stamp_created(&mut record, user, Utc::now());
        let id = record.id();
        {
            let mut records = self.records.write().await;
            if let Some(existing) = records.get(&id).and_then(|v| Self::current(v)) {
                return Err(Error::Conflict {
                    id,
                    expected: Uuid::nil(),
                    actual: existing.snapshot_id().unwrap_or_default(),
                });
            }
            records.insert(id, vec![record.clone()]);
        }
        notify_changed(&self.listeners, &record);
        Ok(record)
    }

    async fn update(&self, if_match: Uuid, mut record: T, user: Option<&User>) -> Result<T> {
        let id = record.id();
        let now = Utc::now();
        {
            let mut records = self.records.write().await;
            let versions = records.get_mut(&id).ok_or(Error::RecordNotFound(id))?;
            let current = versions.last_mut().ok_or(Error::RecordNotFound(id))?;
            let actual = current.snapshot_id().unwrap_or_default();
            if actual != if_match {
                return Err(Error::Conflict {
                    id,
                    expected: if_match,
                    actual,
                });
            }
            current.common_mut().date_until = Some(now);
            let created = current.common().date_created;
            stamp_updated(&mut record, user, created, now);
            versions.push(record.clone());
        }
        notify_changed(&self.listeners, &record);
        Ok(record)
    }

    async fn history(&self, id: Uuid) -> Result<Vec<T>> {
        let records = self.records.read().await;
        Ok(records
            .get(&id)
            .map(|v| v.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn page(&self, after: Option<Uuid>, limit: i64) -> Result<Vec<T>> {
        let records = self.records.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        let range = match after {
            Some(after) => records.range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded)),
            None => records.range(..),
        };
        Ok(range
            .filter_map(|(_, v)| Self::current(v).cloned())
            .take(limit)
            .collect())
    }

    async fn updated_since(&self, after: ChangeCursor, limit: i64) -> Result<Vec<T>> {
        let records = self.records.read().await;
        let mut hits: Vec<T> = records
            .values()
            .filter_map(|v| Self::current(v))
            .filter(|r| ChangeCursor::of(*r).is_some_and(|c| c > after))
            .cloned()
            .collect();
        hits.sort_by_key(|r| ChangeCursor::of(r));
        hits.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(hits)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.records.read().await.len() as i64)
    }

    async fn purge(&self, id: Uuid) -> Result<()> {
        if self.records.write().await.remove(&id).is_none() {
            return Err(Error::RecordNotFound(id));
        }
        notify_purged(&self.listeners, id);
        Ok(())
    }
}

// =============================================================================
// DIRECTORY
// =============================================================================

#[derive(Default)]
struct DirectoryData {
    people: HashMap<String, Person>,
    organizations: HashMap<String, Organization>,
    projects: HashMap<String, Project>,
    users: HashMap<String, User>,
    api_keys: HashMap<String, String>,
}

/// In-memory people, organizations, projects and users.
#[derive(Default)]
pub struct MemoryDirectory {
    data: RwLock<DirectoryData>,
}

fn matches(haystack: &str, query: &str) -> bool {
    haystack.to_lowercase().contains(&query.trim().to_lowercase())
}

fn take(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(0)
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_person(mut self, person: Person) -> Self {
        self.data
            .get_mut()
            .people
            .insert(person.id.clone(), person);
        self
    }

    pub fn with_organization(mut self, org: Organization) -> Self {
        self.data
            .get_mut()
            .organizations
            .insert(org.id.clone(), org);
        self
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.data
            .get_mut()
            .projects
            .insert(project.id.clone(), project);
        self
    }

    /// Register a user, optionally reachable by API key.
    pub fn with_user(mut self, user: User, api_key: Option<&str>) -> Self {
        let data = self.data.get_mut();
        if let Some(key) = api_key {
            data.api_keys.insert(hash_api_key(key), user.id.clone());
        }
        data.users.insert(user.id.clone(), user);
        self
    }
}

#[async_trait]
impl PersonService for MemoryDirectory {
    async fn get_person(&self, id: &str) -> Result<Option<Person>> {
        Ok(self.data.read().await.people.get(id).cloned())
    }

    async fn suggest_people(&self, query: &str, limit: i64) -> Result<Vec<Person>> {
        let data = self.data.read().await;
        let query = query.trim();
        let mut hits: Vec<Person> = data
            .people
            .values()
            .filter(|p| p.active)
            .filter(|p| {
                matches(&p.full_name, query) || p.id == query || p.orcid.as_deref() == Some(query)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name))
        });
        hits.truncate(take(limit));
        Ok(hits)
    }

    async fn set_orcid_token(&self, id: &str, orcid: &str, token: &str) -> Result<()> {
        let mut data = self.data.write().await;
        let person = data
            .people
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("person {}", id)))?;
        person.orcid = Some(orcid.to_string());
        person.orcid_token = Some(token.to_string());
        Ok(())
    }
}

#[async_trait]
impl OrganizationService for MemoryDirectory {
    async fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
        Ok(self.data.read().await.organizations.get(id).cloned())
    }

    async fn suggest_organizations(&self, query: &str, limit: i64) -> Result<Vec<Organization>> {
        let data = self.data.read().await;
        let mut hits: Vec<Organization> = data
            .organizations
            .values()
            .filter(|o| matches(&o.name, query) || matches(&o.id, query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name));
        hits.truncate(take(limit));
        Ok(hits)
    }
}

#[async_trait]
impl ProjectService for MemoryDirectory {
    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.data.read().await.projects.get(id).cloned())
    }

    async fn suggest_projects(&self, query: &str, limit: i64) -> Result<Vec<Project>> {
        let data = self.data.read().await;
        let mut hits: Vec<Project> = data
            .projects
            .values()
            .filter(|p| {
                matches(&p.title, query) || p.acronym.as_deref().is_some_and(|a| matches(a, query))
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then_with(|| a.title.cmp(&b.title))
        });
        hits.truncate(take(limit));
        Ok(hits)
    }
}

#[async_trait]
impl UserService for MemoryDirectory {
    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.data.read().await.users.get(id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.values().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_api_key_hash(&self, key_hash: &str) -> Result<Option<User>> {
        let data = self.data.read().await;
        Ok(data
            .api_keys
            .get(key_hash)
            .and_then(|id| data.users.get(id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_core::{Dataset, Status};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        changed: Mutex<Vec<Uuid>>,
        purged: Mutex<Vec<Uuid>>,
    }

    impl ChangeListener<Dataset> for Recorder {
        fn record_changed(&self, record: &Dataset) {
            self.changed.lock().unwrap().push(record.id());
        }

        fn record_purged(&self, id: Uuid) {
            self.purged.lock().unwrap().push(id);
        }
    }

    fn owner() -> User {
        User {
            id: "u1".into(),
            username: "owner".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_update_requires_current_snapshot() {
        let repo = MemoryRecordRepository::<Dataset>::new();
        let created = repo.create(Dataset::new("first"), Some(&owner())).await.unwrap();
        let snapshot = created.snapshot_id().unwrap();

        let mut edit = created.clone();
        edit.common.title = "second".into();
        let updated = repo.update(snapshot, edit, None).await.unwrap();
        assert_ne!(updated.snapshot_id(), Some(snapshot));
        assert_eq!(updated.common.creator_id.as_deref(), Some("u1"));

        let mut stale = created.clone();
        stale.common.title = "lost".into();
        let err = repo.update(snapshot, stale, None).await.unwrap_err();
        assert!(err.is_conflict());

        let current = repo.get(created.id()).await.unwrap().unwrap();
        assert_eq!(current.common.title, "second");
    }

    #[tokio::test]
    async fn test_history_newest_first_and_closed() {
        let repo = MemoryRecordRepository::<Dataset>::new();
        let v1 = repo.create(Dataset::new("v1"), None).await.unwrap();
        let mut next = v1.clone();
        next.common.title = "v2".into();
        let v2 = repo
            .update(v1.snapshot_id().unwrap(), next, None)
            .await
            .unwrap();

        let history = repo.history(v1.id()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].snapshot_id(), v2.snapshot_id());
        assert!(history[0].common.date_until.is_none());
        assert!(history[1].common.date_until.is_some());
    }

    #[tokio::test]
    async fn test_create_duplicate_id_conflicts() {
        let repo = MemoryRecordRepository::<Dataset>::new();
        let d = repo.create(Dataset::new("x"), None).await.unwrap();
        let again = repo.create(d.clone(), None).await.unwrap_err();
        assert!(again.is_conflict());
    }

    #[tokio::test]
    async fn test_page_and_get_many() {
        let repo = MemoryRecordRepository::<Dataset>::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(repo.create(Dataset::new(format!("d{}", i)), None).await.unwrap().id());
        }
        let first = repo.page(None, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let rest = repo.page(Some(first[1].id()), 10).await.unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(repo.count().await.unwrap(), 5);

        let wanted = vec![ids[3], Uuid::now_v7(), ids[0]];
        let got = repo.get_many(&wanted).await.unwrap();
        assert_eq!(got.iter().map(|d| d.id()).collect::<Vec<_>>(), vec![ids[3], ids[0]]);
    }

    #[tokio::test]
    async fn test_updated_since_orders_by_last_write() {
        let repo = MemoryRecordRepository::<Dataset>::new();
        let before = Utc::now() - chrono::Duration::seconds(1);
        let a = repo.create(Dataset::new("a"), None).await.unwrap();
        let b = repo.create(Dataset::new("b"), None).await.unwrap();
        let mut a2 = a.clone();
        a2.common.status = Status::Public;
        repo.update(a.snapshot_id().unwrap(), a2, None).await.unwrap();

        let since = ChangeCursor::since(before);
        let hits = repo.updated_since(since, 10).await.unwrap();
        assert_eq!(hits.iter().map(|d| d.id()).collect::<Vec<_>>(), vec![b.id(), a.id()]);
        assert_eq!(repo.updated_since(since, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_updated_since_pages_through_equal_timestamps() {
        let repo = MemoryRecordRepository::<Dataset>::new();
        for title in ["a", "b", "c"] {
            repo.create(Dataset::new(title), None).await.unwrap();
        }
        let stamp = Utc::now();
        for versions in repo.records.write().await.values_mut() {
            for version in versions.iter_mut() {
                version.common.date_from = Some(stamp);
            }
        }

        let start = ChangeCursor::since(stamp - chrono::Duration::seconds(1));
        let first = repo.updated_since(start, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let cursor = ChangeCursor::of(&first[1]).unwrap();
        let rest = repo.updated_since(cursor, 2).await.unwrap();
        assert_eq!(rest.len(), 1);

        let mut seen: Vec<Uuid> = first.iter().chain(&rest).map(|d| d.id()).collect();
        seen.dedup();
        assert_eq!(seen.len(), 3);
        assert!(repo.updated_since(ChangeCursor::since(stamp), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listeners_notified() {
        let recorder = Arc::new(Recorder::default());
        let repo = MemoryRecordRepository::<Dataset>::new().with_listener(recorder.clone());
        let d = repo.create(Dataset::new("x"), None).await.unwrap();
        repo.purge(d.id()).await.unwrap();
        assert!(repo.purge(d.id()).await.is_err());

        assert_eq!(*recorder.changed.lock().unwrap(), vec![d.id()]);
        assert_eq!(*recorder.purged.lock().unwrap(), vec![d.id()]);
    }

    #[tokio::test]
    async fn test_directory_lookups() {
        let dir = MemoryDirectory::new()
            .with_person(Person {
                id: "p1".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                full_name: "Ada Lovelace".into(),
                active: true,
                ..Default::default()
            })
            .with_person(Person {
                id: "p2".into(),
                full_name: "Ada Inactive".into(),
                active: false,
                ..Default::default()
            })
            .with_user(owner(), Some("key-1"));

        let hits = dir.suggest_people("ada", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p1");

        let user = dir
            .get_user_by_api_key_hash(&hash_api_key("key-1"))
            .await
            .unwrap();
        assert_eq!(user.map(|u| u.id), Some("u1".to_string()));
        assert!(dir.get_user_by_username("owner").await.unwrap().is_some());

        dir.set_orcid_token("p1", "0000-0002-1825-0097", "tok")
            .await
            .unwrap();
        let p = dir.get_person("p1").await.unwrap().unwrap();
        assert_eq!(p.orcid_token.as_deref(), Some("tok"));
        assert!(dir.set_orcid_token("nobody", "x", "y").await.is_err());
    }
}
