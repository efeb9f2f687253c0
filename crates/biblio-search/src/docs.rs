//! Flattened search documents for datasets and publications.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use biblio_core::{
    Dataset, OrganizationKind, OrganizationService, Publication, Record, RecordCommon,
};

/// A record that can be turned into a search document.
pub trait Indexable: Record {
    /// Document fields specific to this kind, merged over the common ones.
    fn kind_fields(&self) -> Map<String, Value>;

    /// Extra free text searched through the `all` field.
    fn extra_text(&self) -> Vec<String>;

    /// The complete document, without directory-derived fields.
    fn document(&self) -> Value {
        let mut doc = common_fields(self);
        doc.extend(self.kind_fields());

        let mut all: Vec<String> = vec![self.common().title.clone()];
        all.extend(self.common().abstracts.iter().map(|a| a.text.clone()));
        all.extend(self.common().keywords.iter().cloned());
        all.extend(self.all_contributors().iter().map(|c| c.name()));
        all.extend(self.extra_text());
        all.retain(|s| !s.is_empty());
        doc.insert("all".into(), json!(all.join(" ")));

        Value::Object(doc)
    }
}

fn common_fields<R: Record>(record: &R) -> Map<String, Value> {
    let c: &RecordCommon = record.common();
    let contributors = record.all_contributors();
    let mut doc = Map::new();
    doc.insert("id".into(), json!(c.id.to_string()));
    doc.insert("record_kind".into(), json!(R::KIND.as_str()));
    doc.insert("status".into(), json!(c.status.as_str()));
    doc.insert("title".into(), json!(c.title));
    doc.insert("year".into(), json!(c.year));
    doc.insert("locked".into(), json!(c.locked));
    doc.insert("has_been_public".into(), json!(c.has_been_public));
    doc.insert("keyword".into(), json!(c.keywords));
    doc.insert("reviewer_tags".into(), json!(c.reviewer_tags));
    doc.insert("person_id".into(), json!(record.person_ids()));
    doc.insert(
        "contributor".into(),
        json!(contributors.iter().map(|c| c.name()).collect::<Vec<_>>()),
    );
    doc.insert("organization_id".into(), json!(c.organization_ids()));
    doc.insert("project_id".into(), json!(c.project_ids()));
    doc.insert("creator_id".into(), json!(c.creator_id));
    doc.insert("user_id".into(), json!(c.user_id));
    doc.insert("date_created".into(), json!(c.date_created));
    doc.insert("date_updated".into(), json!(c.date_updated));
    doc
}

impl Indexable for Dataset {
    fn kind_fields(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert(
            "access_level".into(),
            json!(self.access_level.iter().map(|a| a.as_str()).collect::<Vec<_>>()),
        );
        doc.insert("license".into(), json!(self.license));
        doc.insert("format".into(), json!(self.format));
        doc.insert("language".into(), json!(self.language));
        doc.insert("publisher".into(), json!(self.publisher));
        doc.insert(
            "identifier".into(),
            json!(self
                .identifiers
                .iter()
                .map(|i| i.value.clone())
                .collect::<Vec<_>>()),
        );
        doc.insert("embargo_date".into(), json!(self.embargo_date));
        doc
    }

    fn extra_text(&self) -> Vec<String> {
        let mut text = vec![self.publisher.clone()];
        text.extend(self.identifiers.iter().map(|i| i.value.clone()));
        text
    }
}

impl Indexable for Publication {
    fn kind_fields(&self) -> Map<String, Value> {
        let access: BTreeSet<&str> = self
            .files
            .iter()
            .filter_map(|f| f.access_level.map(|a| a.as_str()))
            .collect();
        let mut doc = Map::new();
        doc.insert("type".into(), json!(self.kind.as_str()));
        doc.insert("classification".into(), json!(self.classification));
        doc.insert("doi".into(), json!(self.doi));
        doc.insert("publication".into(), json!(self.publication));
        doc.insert("language".into(), json!(self.language));
        doc.insert("has_files".into(), json!(!self.files.is_empty()));
        doc.insert("access_level".into(), json!(access));
        doc.insert(
            "orcid".into(),
            json!(self
                .orcid_works
                .iter()
                .map(|w| w.orcid.clone())
                .collect::<Vec<_>>()),
        );
        doc
    }

    fn extra_text(&self) -> Vec<String> {
        let mut text = vec![self.doi.clone(), self.publication.clone()];
        text.extend(self.isbn.iter().cloned());
        text.extend(self.issn.iter().cloned());
        if let Some(conference) = &self.conference {
            text.push(conference.name.clone());
        }
        text
    }
}

/// Builds documents, adding the faculties of linked departments.
#[derive(Clone, Default)]
pub struct DocumentBuilder {
    organizations: Option<Arc<dyn OrganizationService>>,
}

impl DocumentBuilder {
    /// Builder that does not resolve organizations (no `faculty_id`).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organizations(organizations: Arc<dyn OrganizationService>) -> Self {
        Self {
            organizations: Some(organizations),
        }
    }

    pub async fn build<T: Indexable>(&self, record: &T) -> Value {
        let mut doc = record.document();
        let Some(orgs) = &self.organizations else {
            return doc;
        };

        let mut faculties = BTreeSet::new();
        for org_id in record.common().organization_ids() {
            match orgs.organization_tree(org_id).await {
                Ok(chain) => faculties.extend(
                    chain
                        .into_iter()
                        .filter(|o| o.kind == OrganizationKind::Faculty)
                        .map(|o| o.id),
                ),
                Err(e) => debug!(
                    subsystem = "search",
                    component = "documents",
                    organization_id = org_id,
                    error = %e,
                    "Organization lookup failed, faculty left out"
                ),
            }
        }
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("faculty_id".into(), json!(faculties));
        }
        doc
    }
}
