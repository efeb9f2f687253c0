//! Types shared by datasets and publications.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::directory::Person;

// =============================================================================
// STATUS & ACCESS
// =============================================================================

/// Workflow status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Created but never saved as a draft.
    #[default]
    New,
    /// Draft, only visible to owners and curators.
    Private,
    /// Published.
    Public,
    /// Withdrawn after having been public.
    Returned,
    /// Soft-deleted.
    Deleted,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "new",
            Status::Private => "private",
            Status::Public => "public",
            Status::Returned => "returned",
            Status::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Status::New),
            "private" => Ok(Status::Private),
            "public" => Ok(Status::Public),
            "returned" => Ok(Status::Returned),
            "deleted" => Ok(Status::Deleted),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level of a dataset or file (info:eu-repo vocabulary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    #[serde(rename = "info:eu-repo/semantics/openAccess")]
    Open,
    #[serde(rename = "info:eu-repo/semantics/embargoedAccess")]
    Embargoed,
    #[serde(rename = "info:eu-repo/semantics/restrictedAccess")]
    Restricted,
    #[serde(rename = "info:eu-repo/semantics/closedAccess")]
    Closed,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Open => "info:eu-repo/semantics/openAccess",
            AccessLevel::Embargoed => "info:eu-repo/semantics/embargoedAccess",
            AccessLevel::Restricted => "info:eu-repo/semantics/restrictedAccess",
            AccessLevel::Closed => "info:eu-repo/semantics/closedAccess",
        }
    }

    /// Levels a record may fall back to once its embargo ends.
    pub fn valid_after_embargo(&self) -> bool {
        matches!(self, AccessLevel::Open | AccessLevel::Restricted)
    }
}

/// Embargo fields shared by datasets and publication files.
///
/// Returns true when the embargo was lifted.
pub(crate) fn lift_embargo(
    access_level: &mut Option<AccessLevel>,
    after: &mut Option<AccessLevel>,
    embargo_date: &mut Option<NaiveDate>,
    today: NaiveDate,
) -> bool {
    if *access_level != Some(AccessLevel::Embargoed) {
        return false;
    }
    match (*embargo_date, *after) {
        (Some(date), Some(next)) if date <= today => {
            *access_level = Some(next);
            *after = None;
            *embargo_date = None;
            true
        }
        _ => false,
    }
}

// =============================================================================
// REPEATED SUBSTRUCTURES
// =============================================================================

/// A language-tagged text (abstract, lay summary).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Text {
    pub id: Uuid,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub text: String,
}

/// A link to an external resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub description: String,
}

/// A typed persistent identifier (doi, handle, url, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identifier {
    pub kind: String,
    pub value: String,
}

/// Role a contributor plays on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributorRole {
    Author,
    Editor,
    Supervisor,
    Contributor,
}

impl ContributorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributorRole::Author => "author",
            ContributorRole::Editor => "editor",
            ContributorRole::Supervisor => "supervisor",
            ContributorRole::Contributor => "contributor",
        }
    }
}

impl std::str::FromStr for ContributorRole {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "author" => Ok(ContributorRole::Author),
            "editor" => Ok(ContributorRole::Editor),
            "supervisor" => Ok(ContributorRole::Supervisor),
            "contributor" => Ok(ContributorRole::Contributor),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown contributor role '{}'",
                other
            ))),
        }
    }
}

/// A person credited on a record, either linked to the directory or
/// entered as free text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contributor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credit_roles: Vec<String>,
    /// Organization ids the contributor was affiliated with on this record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affiliations: Vec<String>,
}

impl Contributor {
    /// Free-text contributor without a directory link.
    pub fn external(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            full_name: format!("{} {}", first_name, last_name).trim().to_string(),
            ..Default::default()
        }
    }

    /// Contributor linked to a directory person, copying name and ORCID.
    pub fn from_person(person: &Person) -> Self {
        Self {
            person_id: Some(person.id.clone()),
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            full_name: person.full_name.clone(),
            orcid: person.orcid.clone(),
            credit_roles: Vec::new(),
            affiliations: person.affiliations.clone(),
        }
    }

    /// Display name, preferring the full name.
    pub fn name(&self) -> String {
        if !self.full_name.is_empty() {
            self.full_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
                .trim()
                .to_string()
        }
    }
}

/// Link from a record to a department or other organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedOrganization {
    pub organization_id: String,
}

/// Link from a record to a research project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedProject {
    pub project_id: String,
}

// =============================================================================
// COMMON RECORD FIELDS
// =============================================================================

/// Fields every dataset and publication carries, flattened into both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordCommon {
    pub id: Uuid,
    /// Optimistic concurrency token, assigned by the repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_until: Option<DateTime<Utc>>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_user_id: Option<String>,
    pub status: Status,
    pub locked: bool,
    pub has_been_public: bool,
    pub title: String,
    pub year: String,
    #[serde(rename = "abstract")]
    pub abstracts: Vec<Text>,
    pub links: Vec<Link>,
    pub keywords: Vec<String>,
    pub related_organizations: Vec<RelatedOrganization>,
    pub related_projects: Vec<RelatedProject>,
    pub message: String,
    pub reviewer_note: String,
    pub reviewer_tags: Vec<String>,
}

impl RecordCommon {
    /// Fresh common fields for a newly created record.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Organization ids in link order.
    pub fn organization_ids(&self) -> Vec<&str> {
        self.related_organizations
            .iter()
            .map(|o| o.organization_id.as_str())
            .collect()
    }

    /// Project ids in link order.
    pub fn project_ids(&self) -> Vec<&str> {
        self.related_projects
            .iter()
            .map(|p| p.project_id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            Status::New,
            Status::Private,
            Status::Public,
            Status::Returned,
            Status::Deleted,
        ] {
            let parsed: Status = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        assert!("published".parse::<Status>().is_err());
    }

    #[test]
    fn test_access_level_serializes_eu_repo_uri() {
        let v = serde_json::to_value(AccessLevel::Embargoed).unwrap();
        assert_eq!(v, "info:eu-repo/semantics/embargoedAccess");
        let back: AccessLevel =
            serde_json::from_str("\"info:eu-repo/semantics/openAccess\"").unwrap();
        assert_eq!(back, AccessLevel::Open);
    }

    #[test]
    fn test_lift_embargo_only_when_due() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut level = Some(AccessLevel::Embargoed);
        let mut after = Some(AccessLevel::Open);
        let mut date = NaiveDate::from_ymd_opt(2026, 10, 20);
        assert!(!lift_embargo(&mut level, &mut after, &mut date, today));
        assert_eq!(level, Some(AccessLevel::Embargoed));

        date = NaiveDate::from_ymd_opt(2026, 10, 19);
        assert!(lift_embargo(&mut level, &mut after, &mut date, today));
        assert_eq!(level, Some(AccessLevel::Open));
        assert_eq!(after, None);
        assert_eq!(date, None);
    }

    #[test]
    fn test_lift_embargo_ignores_non_embargoed() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut level = Some(AccessLevel::Closed);
        let mut after = Some(AccessLevel::Open);
        let mut date = NaiveDate::from_ymd_opt(2020, 1, 1);
        assert!(!lift_embargo(&mut level, &mut after, &mut date, today));
        assert_eq!(level, Some(AccessLevel::Closed));
    }

    #[test]
    fn test_contributor_name_falls_back_to_parts() {
        let mut c = Contributor::external("Ada", "Lovelace");
        assert_eq!(c.name(), "Ada Lovelace");
        c.full_name.clear();
        assert_eq!(c.name(), "Ada Lovelace");
    }

    #[test]
    fn test_record_common_abstract_field_name() {
        let mut common = RecordCommon::new("A title");
        common.abstracts.push(Text {
            id: Uuid::nil(),
            lang: "eng".into(),
            text: "Summary".into(),
        });
        let v = serde_json::to_value(&common).unwrap();
        assert!(v.get("abstract").is_some());
        assert!(v.get("snapshot_id").is_none());
    }
}
