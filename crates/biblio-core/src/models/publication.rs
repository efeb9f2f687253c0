//! Publication records and their files.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{lift_embargo, AccessLevel, Contributor, RecordCommon};

/// Publication type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationKind {
    #[default]
    JournalArticle,
    Book,
    BookChapter,
    BookEditor,
    IssueEditor,
    Conference,
    Dissertation,
    Miscellaneous,
}

impl PublicationKind {
    pub const ALL: [PublicationKind; 8] = [
        PublicationKind::JournalArticle,
        PublicationKind::Book,
        PublicationKind::BookChapter,
        PublicationKind::BookEditor,
        PublicationKind::IssueEditor,
        PublicationKind::Conference,
        PublicationKind::Dissertation,
        PublicationKind::Miscellaneous,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationKind::JournalArticle => "journal_article",
            PublicationKind::Book => "book",
            PublicationKind::BookChapter => "book_chapter",
            PublicationKind::BookEditor => "book_editor",
            PublicationKind::IssueEditor => "issue_editor",
            PublicationKind::Conference => "conference",
            PublicationKind::Dissertation => "dissertation",
            PublicationKind::Miscellaneous => "miscellaneous",
        }
    }

    /// Editor-only types credit editors instead of authors.
    pub fn uses_editors(&self) -> bool {
        matches!(self, PublicationKind::BookEditor | PublicationKind::IssueEditor)
    }
}

impl std::str::FromStr for PublicationKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("unknown publication type '{}'", s)))
    }
}

/// Conference details for conference contributions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Conference {
    pub name: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Metadata of a file attached to a publication.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationFile {
    pub id: Uuid,
    pub name: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<AccessLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level_after_embargo: Option<AccessLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embargo_date: Option<NaiveDate>,
    pub license: String,
    /// main_file, colophon, data_fact_sheet, peer_review_report, ...
    pub relation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_version: Option<String>,
}

impl PublicationFile {
    /// Whether the file may be downloaded by the public today.
    pub fn is_openly_accessible(&self) -> bool {
        self.access_level == Some(AccessLevel::Open)
    }
}

/// A work pushed to a researcher's ORCID record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrcidWork {
    pub orcid: String,
    pub put_code: i64,
}

/// A publication record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Publication {
    #[serde(flatten)]
    pub common: RecordCommon,
    #[serde(rename = "type")]
    pub kind: PublicationKind,
    pub classification: String,
    pub author: Vec<Contributor>,
    pub editor: Vec<Contributor>,
    pub supervisor: Vec<Contributor>,
    pub doi: String,
    pub isbn: Vec<String>,
    pub issn: Vec<String>,
    /// Journal or series title.
    pub publication: String,
    pub volume: String,
    pub issue: String,
    pub page_first: String,
    pub page_last: String,
    pub publisher: String,
    pub place_of_publication: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conference: Option<Conference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defense_date: Option<NaiveDate>,
    pub defense_place: String,
    pub language: Vec<String>,
    pub files: Vec<PublicationFile>,
    pub orcid_works: Vec<OrcidWork>,
    pub related_datasets: Vec<Uuid>,
}

impl Publication {
    /// New publication of the given type with a fresh id.
    pub fn new(kind: PublicationKind, title: impl Into<String>) -> Self {
        Self {
            common: RecordCommon::new(title),
            kind,
            classification: "U".to_string(),
            ..Default::default()
        }
    }

    pub fn file(&self, id: Uuid) -> Option<&PublicationFile> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn file_mut(&mut self, id: Uuid) -> Option<&mut PublicationFile> {
        self.files.iter_mut().find(|f| f.id == id)
    }

    /// Remove a file; returns the removed metadata.
    pub fn remove_file(&mut self, id: Uuid) -> Option<PublicationFile> {
        let pos = self.files.iter().position(|f| f.id == id)?;
        Some(self.files.remove(pos))
    }

    /// Lift every file embargo whose date has passed.
    pub fn lift_file_embargoes(&mut self, today: NaiveDate) -> bool {
        let mut changed = false;
        for file in &mut self.files {
            changed |= lift_embargo(
                &mut file.access_level,
                &mut file.access_level_after_embargo,
                &mut file.embargo_date,
                today,
            );
        }
        changed
    }

    /// Put-code of the work already sent to the given ORCID record.
    pub fn orcid_put_code(&self, orcid: &str) -> Option<i64> {
        self.orcid_works
            .iter()
            .find(|w| w.orcid == orcid)
            .map(|w| w.put_code)
    }

    /// Link a dataset; returns false when it was already linked.
    pub fn add_related_dataset(&mut self, id: Uuid) -> bool {
        if self.related_datasets.contains(&id) {
            return false;
        }
        self.related_datasets.push(id);
        true
    }

    /// Unlink a dataset; returns false when it was not linked.
    pub fn remove_related_dataset(&mut self, id: Uuid) -> bool {
        let before = self.related_datasets.len();
        self.related_datasets.retain(|d| *d != id);
        before != self.related_datasets.len()
    }

    /// Page range formatted as `first-last`.
    pub fn pages(&self) -> Option<String> {
        match (self.page_first.is_empty(), self.page_last.is_empty()) {
            (true, true) => None,
            (false, true) => Some(self.page_first.clone()),
            (true, false) => Some(self.page_last.clone()),
            (false, false) => Some(format!("{}-{}", self.page_first, self.page_last)),
        }
    }
}
