//! Authority records: people, organizations, projects and backoffice users.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A person from the institutional directory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    /// ORCID member API access token; never serialized to clients.
    #[serde(skip_serializing)]
    pub orcid_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub active: bool,
    /// Organization ids the person is affiliated with.
    pub affiliations: Vec<String>,
}

/// Kind of organizational unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationKind {
    University,
    Faculty,
    #[default]
    Department,
    ResearchGroup,
}

impl OrganizationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationKind::University => "university",
            OrganizationKind::Faculty => "faculty",
            OrganizationKind::Department => "department",
            OrganizationKind::ResearchGroup => "research_group",
        }
    }
}

impl std::str::FromStr for OrganizationKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "university" => Ok(OrganizationKind::University),
            "faculty" => Ok(OrganizationKind::Faculty),
            "department" => Ok(OrganizationKind::Department),
            "research_group" => Ok(OrganizationKind::ResearchGroup),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown organization kind '{}'",
                other
            ))),
        }
    }
}

/// An organizational unit (faculty, department, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub kind: OrganizationKind,
}

/// A funded research project.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acronym: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Backoffice role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Curator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Curator => "curator",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "curator" => Ok(Role::Curator),
            "admin" => Ok(Role::Admin),
            other => Err(crate::Error::InvalidInput(format!("unknown role '{}'", other))),
        }
    }
}

/// An authenticated backoffice user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    /// Directory person this account belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
}

impl User {
    /// Curators and admins review and curate every record.
    pub fn can_curate(&self) -> bool {
        self.role >= Role::Curator
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering_drives_curation() {
        let mut user = User {
            id: "u1".into(),
            ..Default::default()
        };
        assert!(!user.can_curate());
        user.role = Role::Curator;
        assert!(user.can_curate());
        assert!(!user.is_admin());
        user.role = Role::Admin;
        assert!(user.can_curate());
        assert!(user.is_admin());
    }

    #[test]
    fn test_person_token_not_serialized() {
        let person = Person {
            id: "p1".into(),
            orcid_token: Some("secret".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&person).unwrap();
        assert!(v.get("orcid_token").is_none());
    }
}
