//! Core traits for Biblio abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! (Postgres, in-memory, Elasticsearch, caches) must satisfy, so handlers and
//! tasks stay independent of the backends behind them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Organization, Person, Project, User};
use crate::record::{Record, RecordKind};
use crate::search::{SearchArgs, SearchHits, SearchScope};

// =============================================================================
// RECORD REPOSITORY
// =============================================================================

/// Position in the change feed.
///
/// Current versions are ordered by `(date_from, id)`; a feed page holds the
/// versions strictly after the cursor, so writes sharing a timestamp are
/// never skipped at a page boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeCursor {
    pub date_from: DateTime<Utc>,
    pub id: Uuid,
}

impl ChangeCursor {
    pub fn new(date_from: DateTime<Utc>, id: Uuid) -> Self {
        Self { date_from, id }
    }

    /// Cursor past every version written at or before `since`.
    pub fn since(since: DateTime<Utc>) -> Self {
        Self::new(since, Uuid::from_u128(u128::MAX))
    }

    /// Cursor at `record`; None for records that were never stored.
    pub fn of<T: Record>(record: &T) -> Option<Self> {
        record
            .common()
            .date_from
            .map(|date_from| Self::new(date_from, record.id()))
    }
}

/// Versioned storage of datasets or publications.
///
/// Every write produces a new snapshot. `update` only succeeds when the
/// caller's `if_match` equals the current snapshot id, otherwise it fails
/// with [`crate::Error::Conflict`].
#[async_trait]
pub trait RecordRepository<T: Record>: Send + Sync {
    /// Current version of a record.
    async fn get(&self, id: Uuid) -> Result<Option<T>>;

    /// Current versions in the order of `ids`; unknown ids are skipped.
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<T>>;

    /// Store a new record.
    async fn create(&self, record: T, user: Option<&User>) -> Result<T>;

    /// Store a new version of an existing record, guarded by `if_match`.
    async fn update(&self, if_match: Uuid, record: T, user: Option<&User>) -> Result<T>;

    /// Every stored version, newest first.
    async fn history(&self, id: Uuid) -> Result<Vec<T>>;

    /// Current versions ordered by id, starting after `after`.
    async fn page(&self, after: Option<Uuid>, limit: i64) -> Result<Vec<T>>;

    /// Current versions after `after` in `(date_from, id)` order.
    async fn updated_since(&self, after: ChangeCursor, limit: i64) -> Result<Vec<T>>;

    /// Number of records (current versions).
    async fn count(&self) -> Result<i64>;

    /// Remove a record and its history.
    async fn purge(&self, id: Uuid) -> Result<()>;
}

/// Notified after a repository write; implementations must not block.
pub trait ChangeListener<T>: Send + Sync {
    fn record_changed(&self, record: &T);

    fn record_purged(&self, id: Uuid);
}

// =============================================================================
// DIRECTORY SERVICES
// =============================================================================

#[async_trait]
pub trait PersonService: Send + Sync {
    async fn get_person(&self, id: &str) -> Result<Option<Person>>;

    /// Known people among `ids`, in the order given.
    async fn get_people(&self, ids: &[String]) -> Result<Vec<Person>> {
        let mut people = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(person) = self.get_person(id).await? {
                people.push(person);
            }
        }
        Ok(people)
    }

    /// People whose name matches `query`.
    async fn suggest_people(&self, query: &str, limit: i64) -> Result<Vec<Person>>;

    /// Store the ORCID iD and member API token obtained for a person.
    async fn set_orcid_token(&self, id: &str, orcid: &str, token: &str) -> Result<()>;
}

#[async_trait]
pub trait OrganizationService: Send + Sync {
    async fn get_organization(&self, id: &str) -> Result<Option<Organization>>;

    async fn suggest_organizations(&self, query: &str, limit: i64) -> Result<Vec<Organization>>;

    /// The organization followed by its parents up to the root.
    async fn organization_tree(&self, id: &str) -> Result<Vec<Organization>> {
        let mut chain = Vec::new();
        let mut next = Some(id.to_string());
        while let Some(current) = next {
            if chain.iter().any(|o: &Organization| o.id == current) {
                break;
            }
            match self.get_organization(&current).await? {
                Some(org) => {
                    next = org.parent_id.clone();
                    chain.push(org);
                }
                None => break,
            }
        }
        Ok(chain)
    }
}

#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    async fn suggest_projects(&self, query: &str, limit: i64) -> Result<Vec<Project>>;
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Look a user up by the hex SHA-256 of their API key.
    async fn get_user_by_api_key_hash(&self, key_hash: &str) -> Result<Option<User>>;
}

// =============================================================================
// SEARCH
// =============================================================================

/// Faceted search over indexed records.
#[async_trait]
pub trait RecordSearcher: Send + Sync {
    async fn search(
        &self,
        kind: RecordKind,
        args: &SearchArgs,
        scope: &SearchScope,
    ) -> Result<SearchHits>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Orgs(HashMap<String, Organization>);

    #[async_trait]
    impl OrganizationService for Orgs {
        async fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
            Ok(self.0.get(id).cloned())
        }

        async fn suggest_organizations(&self, _q: &str, _l: i64) -> Result<Vec<Organization>> {
            Ok(Vec::new())
        }
    }

    fn org(id: &str, parent: Option<&str>) -> (String, Organization) {
        (
            id.to_string(),
            Organization {
                id: id.into(),
                name: id.into(),
                parent_id: parent.map(String::from),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_organization_tree_walks_parents() {
        let orgs = Orgs(HashMap::from([
            org("UGent", None),
            org("CA", Some("UGent")),
            org("CA20", Some("CA")),
        ]));
        let chain = orgs.organization_tree("CA20").await.unwrap();
        let ids: Vec<&str> = chain.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["CA20", "CA", "UGent"]);
        assert!(orgs.organization_tree("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_organization_tree_stops_on_cycle() {
        let orgs = Orgs(HashMap::from([org("A", Some("B")), org("B", Some("A"))]));
        let chain = orgs.organization_tree("A").await.unwrap();
        assert_eq!(chain.len(), 2);
    }
}
