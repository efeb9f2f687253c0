//! Dataset records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{lift_embargo, AccessLevel, Contributor, Identifier, RecordCommon};

/// A research dataset description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    #[serde(flatten)]
    pub common: RecordCommon,
    pub author: Vec<Contributor>,
    pub contributor: Vec<Contributor>,
    pub identifiers: Vec<Identifier>,
    pub format: Vec<String>,
    pub language: Vec<String>,
    pub license: String,
    pub other_license: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<AccessLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level_after_embargo: Option<AccessLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embargo_date: Option<NaiveDate>,
    pub publisher: String,
    pub related_publications: Vec<Uuid>,
}

impl Dataset {
    /// New dataset with a fresh id.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            common: RecordCommon::new(title),
            ..Default::default()
        }
    }

    /// Lift the dataset embargo when its date has passed.
    pub fn lift_embargo(&mut self, today: NaiveDate) -> bool {
        lift_embargo(
            &mut self.access_level,
            &mut self.access_level_after_embargo,
            &mut self.embargo_date,
            today,
        )
    }

    /// Link a publication; returns false when it was already linked.
    pub fn add_related_publication(&mut self, id: Uuid) -> bool {
        if self.related_publications.contains(&id) {
            return false;
        }
        self.related_publications.push(id);
        true
    }

    /// Unlink a publication; returns false when it was not linked.
    pub fn remove_related_publication(&mut self, id: Uuid) -> bool {
        let before = self.related_publications.len();
        self.related_publications.retain(|p| *p != id);
        before != self.related_publications.len()
    }

    /// First identifier of the given kind.
    pub fn identifier(&self, kind: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|i| i.kind == kind)
            .map(|i| i.value.as_str())
    }
}
