//! The `Record` abstraction over datasets and publications, plus the
//! in-memory mutations handlers apply before persisting.

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Contributor, ContributorRole, Dataset, Link, Publication, RecordCommon, RelatedOrganization,
    RelatedProject, Status, Text, User,
};
use crate::validation::{validate_dataset, validate_publication, ValidationErrors};

/// Kind of bibliographic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Dataset,
    Publication,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Dataset => "dataset",
            RecordKind::Publication => "publication",
        }
    }

    /// Snapshot table holding this kind.
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Dataset => "datasets",
            RecordKind::Publication => "publications",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour shared by datasets and publications.
pub trait Record:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: RecordKind;

    /// Contributor roles this kind supports, in display order.
    const ROLES: &'static [ContributorRole];

    fn common(&self) -> &RecordCommon;

    fn common_mut(&mut self) -> &mut RecordCommon;

    fn contributors(&self, role: ContributorRole) -> Option<&Vec<Contributor>>;

    fn contributors_mut(&mut self, role: ContributorRole) -> Option<&mut Vec<Contributor>>;

    fn validate(&self) -> std::result::Result<(), ValidationErrors>;

    /// Lift every embargo that is due; true when the record changed.
    fn lift_embargoes(&mut self, today: NaiveDate) -> bool;

    fn id(&self) -> Uuid {
        self.common().id
    }

    fn snapshot_id(&self) -> Option<Uuid> {
        self.common().snapshot_id
    }

    fn status(&self) -> Status {
        self.common().status
    }

    /// Contributors of every role.
    fn all_contributors(&self) -> Vec<&Contributor> {
        Self::ROLES
            .iter()
            .filter_map(|role| self.contributors(*role))
            .flatten()
            .collect()
    }

    /// Directory person ids credited on the record.
    fn person_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .all_contributors()
            .into_iter()
            .filter_map(|c| c.person_id.as_deref())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Contributor list for `role`, or `InvalidInput` when unsupported.
    fn contributors_for(&mut self, role: ContributorRole) -> Result<&mut Vec<Contributor>> {
        self.contributors_mut(role).ok_or_else(|| {
            Error::InvalidInput(format!(
                "{} does not support role '{}'",
                Self::KIND,
                role.as_str()
            ))
        })
    }

    /// Hide curator-only fields from users who may not see them.
    fn redact_for(&mut self, user: &User) {
        if !user.can_curate() {
            let common = self.common_mut();
            common.reviewer_note.clear();
            common.reviewer_tags.clear();
        }
    }
}

impl Record for Dataset {
    const KIND: RecordKind = RecordKind::Dataset;
    const ROLES: &'static [ContributorRole] =
        &[ContributorRole::Author, ContributorRole::Contributor];

    fn common(&self) -> &RecordCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut RecordCommon {
        &mut self.common
    }

    fn contributors(&self, role: ContributorRole) -> Option<&Vec<Contributor>> {
        match role {
            ContributorRole::Author => Some(&self.author),
            ContributorRole::Contributor => Some(&self.contributor),
            _ => None,
        }
    }

    fn contributors_mut(&mut self, role: ContributorRole) -> Option<&mut Vec<Contributor>> {
        match role {
            ContributorRole::Author => Some(&mut self.author),
            ContributorRole::Contributor => Some(&mut self.contributor),
            _ => None,
        }
    }

    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        validate_dataset(self)
    }

    fn lift_embargoes(&mut self, today: NaiveDate) -> bool {
        self.lift_embargo(today)
    }
}

impl Record for Publication {
    const KIND: RecordKind = RecordKind::Publication;
    const ROLES: &'static [ContributorRole] = &[
        ContributorRole::Author,
        ContributorRole::Editor,
        ContributorRole::Supervisor,
    ];

    fn common(&self) -> &RecordCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut RecordCommon {
        &mut self.common
    }

    fn contributors(&self, role: ContributorRole) -> Option<&Vec<Contributor>> {
        match role {
            ContributorRole::Author => Some(&self.author),
            ContributorRole::Editor => Some(&self.editor),
            ContributorRole::Supervisor => Some(&self.supervisor),
            ContributorRole::Contributor => None,
        }
    }

    fn contributors_mut(&mut self, role: ContributorRole) -> Option<&mut Vec<Contributor>> {
        match role {
            ContributorRole::Author => Some(&mut self.author),
            ContributorRole::Editor => Some(&mut self.editor),
            ContributorRole::Supervisor => Some(&mut self.supervisor),
            ContributorRole::Contributor => None,
        }
    }

    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        validate_publication(self)
    }

    fn lift_embargoes(&mut self, today: NaiveDate) -> bool {
        self.lift_file_embargoes(today)
    }
}

// =============================================================================
// SUB-RESOURCE MUTATIONS
// =============================================================================

impl RecordCommon {
    /// Append an abstract, assigning an id; returns the id.
    pub fn add_abstract(&mut self, lang: &str, text: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.abstracts.push(Text {
            id,
            lang: lang.to_string(),
            text: text.to_string(),
        });
        id
    }

    pub fn update_abstract(&mut self, id: Uuid, lang: &str, text: &str) -> Result<()> {
        let a = self
            .abstracts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("abstract {}", id)))?;
        a.lang = lang.to_string();
        a.text = text.to_string();
        Ok(())
    }

    pub fn remove_abstract(&mut self, id: Uuid) -> Result<()> {
        let pos = self
            .abstracts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("abstract {}", id)))?;
        self.abstracts.remove(pos);
        Ok(())
    }

    /// Append a link, assigning an id; returns the id.
    pub fn add_link(&mut self, url: &str, relation: &str, description: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.links.push(Link {
            id,
            url: url.to_string(),
            relation: relation.to_string(),
            description: description.to_string(),
        });
        id
    }

    pub fn update_link(
        &mut self,
        id: Uuid,
        url: &str,
        relation: &str,
        description: &str,
    ) -> Result<()> {
        let l = self
            .links
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| Error::NotFound(format!("link {}", id)))?;
        l.url = url.to_string();
        l.relation = relation.to_string();
        l.description = description.to_string();
        Ok(())
    }

    pub fn remove_link(&mut self, id: Uuid) -> Result<()> {
        let pos = self
            .links
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| Error::NotFound(format!("link {}", id)))?;
        self.links.remove(pos);
        Ok(())
    }

    /// Link an organization; false when already linked.
    pub fn add_organization(&mut self, organization_id: &str) -> bool {
        if self
            .related_organizations
            .iter()
            .any(|o| o.organization_id == organization_id)
        {
            return false;
        }
        self.related_organizations.push(RelatedOrganization {
            organization_id: organization_id.to_string(),
        });
        true
    }

    pub fn remove_organization(&mut self, organization_id: &str) -> Result<()> {
        let pos = self
            .related_organizations
            .iter()
            .position(|o| o.organization_id == organization_id)
            .ok_or_else(|| Error::NotFound(format!("department {}", organization_id)))?;
        self.related_organizations.remove(pos);
        Ok(())
    }

    /// Link a project; false when already linked.
    pub fn add_project(&mut self, project_id: &str) -> bool {
        if self
            .related_projects
            .iter()
            .any(|p| p.project_id == project_id)
        {
            return false;
        }
        self.related_projects.push(RelatedProject {
            project_id: project_id.to_string(),
        });
        true
    }

    pub fn remove_project(&mut self, project_id: &str) -> Result<()> {
        let pos = self
            .related_projects
            .iter()
            .position(|p| p.project_id == project_id)
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;
        self.related_projects.remove(pos);
        Ok(())
    }

    /// Replace reviewer tags, trimming, dropping empties and duplicates.
    pub fn set_reviewer_tags(&mut self, tags: Vec<String>) {
        self.reviewer_tags = clean_list(tags);
    }

    // -------------------------------------------------------------------------
    // Workflow transitions
    // -------------------------------------------------------------------------

    pub fn publish(&mut self) -> Result<()> {
        match self.status {
            Status::New | Status::Private | Status::Returned => {
                self.status = Status::Public;
                self.has_been_public = true;
                Ok(())
            }
            other => Err(invalid_transition(other, "publish")),
        }
    }

    pub fn withdraw(&mut self) -> Result<()> {
        match self.status {
            Status::Public => {
                self.status = Status::Returned;
                Ok(())
            }
            other => Err(invalid_transition(other, "withdraw")),
        }
    }

    pub fn republish(&mut self) -> Result<()> {
        match self.status {
            Status::Returned if self.has_been_public => {
                self.status = Status::Public;
                Ok(())
            }
            other => Err(invalid_transition(other, "republish")),
        }
    }

    /// Save a new record as a private draft.
    pub fn save_draft(&mut self) -> Result<()> {
        match self.status {
            Status::New | Status::Private => {
                self.status = Status::Private;
                Ok(())
            }
            other => Err(invalid_transition(other, "save as draft")),
        }
    }

    pub fn soft_delete(&mut self) -> Result<()> {
        if self.status == Status::Deleted {
            return Err(invalid_transition(self.status, "delete"));
        }
        self.status = Status::Deleted;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }
}

fn invalid_transition(status: Status, action: &str) -> Error {
    Error::InvalidInput(format!("cannot {} a record with status '{}'", action, status))
}

/// Trimmed, non-empty, de-duplicated values in their original order.
pub fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim().to_string();
        if !value.is_empty() && !cleaned.contains(&value) {
            cleaned.push(value);
        }
    }
    cleaned
}

// =============================================================================
// CONTRIBUTOR LISTS
// =============================================================================

/// Replace the contributor at `position`.
pub fn set_contributor(
    list: &mut [Contributor],
    position: usize,
    contributor: Contributor,
) -> Result<()> {
    let slot = list
        .get_mut(position)
        .ok_or_else(|| Error::NotFound(format!("contributor at position {}", position)))?;
    *slot = contributor;
    Ok(())
}

/// Remove and return the contributor at `position`.
pub fn remove_contributor(list: &mut Vec<Contributor>, position: usize) -> Result<Contributor> {
    if position >= list.len() {
        return Err(Error::NotFound(format!(
            "contributor at position {}",
            position
        )));
    }
    Ok(list.remove(position))
}

/// Reorder contributors; `order[i]` is the old position of the new i-th entry.
pub fn reorder_contributors(list: &mut Vec<Contributor>, order: &[usize]) -> Result<()> {
    if order.len() != list.len() {
        return Err(Error::InvalidInput(format!(
            "expected {} positions, got {}",
            list.len(),
            order.len()
        )));
    }
    let mut seen = vec![false; list.len()];
    for &pos in order {
        if pos >= list.len() || seen[pos] {
            return Err(Error::InvalidInput(format!(
                "positions must be a permutation of 0..{}",
                list.len()
            )));
        }
        seen[pos] = true;
    }
    let reordered: Vec<Contributor> = order.iter().map(|&pos| list[pos].clone()).collect();
    *list = reordered;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PublicationKind, Role};

    fn names(list: &[Contributor]) -> Vec<String> {
        list.iter().map(|c| c.last_name.clone()).collect()
    }

    #[test]
    fn test_abstract_lifecycle() {
        let mut c = RecordCommon::new("x");
        let id = c.add_abstract("eng", "first");
        c.update_abstract(id, "dut", "eerste").unwrap();
        assert_eq!(c.abstracts[0].lang, "dut");
        assert!(matches!(
            c.update_abstract(Uuid::now_v7(), "eng", "x"),
            Err(Error::NotFound(_))
        ));
        c.remove_abstract(id).unwrap();
        assert!(c.abstracts.is_empty());
        assert!(c.remove_abstract(id).is_err());
    }

    #[test]
    fn test_link_lifecycle() {
        let mut c = RecordCommon::new("x");
        let id = c.add_link("https://example.org", "data", "");
        c.update_link(id, "https://example.com", "related", "desc")
            .unwrap();
        assert_eq!(c.links[0].url, "https://example.com");
        c.remove_link(id).unwrap();
        assert!(c.links.is_empty());
    }

    #[test]
    fn test_organizations_and_projects_dedup() {
        let mut c = RecordCommon::new("x");
        assert!(c.add_organization("CA20"));
        assert!(!c.add_organization("CA20"));
        assert!(c.add_project("P1"));
        assert!(!c.add_project("P1"));
        assert_eq!(c.organization_ids(), vec!["CA20"]);
        c.remove_organization("CA20").unwrap();
        assert!(c.remove_organization("CA20").is_err());
        c.remove_project("P1").unwrap();
        assert!(c.related_projects.is_empty());
    }

    #[test]
    fn test_reviewer_tags_cleaned() {
        let mut c = RecordCommon::new("x");
        c.set_reviewer_tags(vec![" wos ".into(), "".into(), "wos".into(), "vabb".into()]);
        assert_eq!(c.reviewer_tags, vec!["wos", "vabb"]);
    }

    #[test]
    fn test_clean_list_keeps_first_occurrence() {
        let cleaned = clean_list(vec!["b".into(), " a".into(), "b ".into(), "  ".into()]);
        assert_eq!(cleaned, vec!["b", "a"]);
    }

    #[test]
    fn test_workflow_transitions() {
        let mut c = RecordCommon::new("x");
        assert!(c.withdraw().is_err());
        c.save_draft().unwrap();
        assert_eq!(c.status, Status::Private);
        c.publish().unwrap();
        assert_eq!(c.status, Status::Public);
        assert!(c.has_been_public);
        assert!(c.publish().is_err());
        c.withdraw().unwrap();
        assert_eq!(c.status, Status::Returned);
        c.republish().unwrap();
        assert_eq!(c.status, Status::Public);
        c.soft_delete().unwrap();
        assert!(c.soft_delete().is_err());
        assert!(c.publish().is_err());
    }

    #[test]
    fn test_republish_requires_history() {
        let mut c = RecordCommon::new("x");
        c.status = Status::Returned;
        assert!(c.republish().is_err());
    }

    #[test]
    fn test_contributor_positions() {
        let mut list = vec![
            Contributor::external("A", "One"),
            Contributor::external("B", "Two"),
            Contributor::external("C", "Three"),
        ];
        set_contributor(&mut list, 1, Contributor::external("B", "Deux")).unwrap();
        assert_eq!(names(&list), vec!["One", "Deux", "Three"]);
        assert!(set_contributor(&mut list, 3, Contributor::default()).is_err());

        reorder_contributors(&mut list, &[2, 0, 1]).unwrap();
        assert_eq!(names(&list), vec!["Three", "One", "Deux"]);

        assert!(reorder_contributors(&mut list, &[0, 0, 1]).is_err());
        assert!(reorder_contributors(&mut list, &[0, 1]).is_err());
        assert!(reorder_contributors(&mut list, &[0, 1, 5]).is_err());

        let removed = remove_contributor(&mut list, 0).unwrap();
        assert_eq!(removed.last_name, "Three");
        assert!(remove_contributor(&mut list, 9).is_err());
    }

    #[test]
    fn test_roles_per_kind() {
        let mut d = Dataset::new("x");
        assert!(d.contributors_for(ContributorRole::Contributor).is_ok());
        assert!(d.contributors_for(ContributorRole::Editor).is_err());

        let mut p = Publication::new(PublicationKind::Book, "x");
        assert!(p.contributors_for(ContributorRole::Supervisor).is_ok());
        assert!(p.contributors_for(ContributorRole::Contributor).is_err());
    }

    #[test]
    fn test_person_ids_dedup_across_roles() {
        let mut p = Publication::new(PublicationKind::Book, "x");
        let mut a = Contributor::external("A", "One");
        a.person_id = Some("p1".into());
        p.author.push(a.clone());
        p.editor.push(a);
        let mut b = Contributor::external("B", "Two");
        b.person_id = Some("p2".into());
        p.supervisor.push(b);
        p.author.push(Contributor::external("C", "Three"));
        assert_eq!(p.person_ids(), vec!["p1", "p2"]);
        assert_eq!(p.all_contributors().len(), 4);
    }

    #[test]
    fn test_redact_for_non_curator() {
        let mut d = Dataset::new("x");
        d.common.reviewer_note = "check license".into();
        d.common.reviewer_tags = vec!["todo".into()];

        let curator = User {
            role: Role::Curator,
            ..Default::default()
        };
        let mut visible = d.clone();
        visible.redact_for(&curator);
        assert_eq!(visible.common.reviewer_note, "check license");

        d.redact_for(&User::default());
        assert!(d.common.reviewer_note.is_empty());
        assert!(d.common.reviewer_tags.is_empty());
    }
}
