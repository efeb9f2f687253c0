//! Record validation.
//!
//! Validation produces a list of errors, each pointing into the record with a
//! JSON pointer and carrying a stable code (`dataset.title.required`) that
//! clients translate for display.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{
    AccessLevel, Contributor, ContributorRole, Dataset, Link, Publication, PublicationKind, Status,
    Text,
};

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}$").expect("valid year regex"));

static ORCID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]$").expect("valid ORCID regex")
});

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON pointer to the offending field, e.g. `/author/0/last_name`.
    pub pointer: String,
    /// Stable error code, e.g. `dataset.author.last_name.required`.
    pub code: String,
}

impl ValidationError {
    pub fn new(pointer: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            code: code.into(),
        }
    }
}

/// Collection of validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pointer: impl Into<String>, code: impl Into<String>) {
        self.0.push(ValidationError::new(pointer, code));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Whether any error carries this code.
    pub fn has_code(&self, code: &str) -> bool {
        self.0.iter().any(|e| e.code == code)
    }

    /// `Ok(())` when empty, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let codes: Vec<&str> = self.0.iter().map(|e| e.code.as_str()).collect();
        write!(f, "{}", codes.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Whether `year` is a four digit year.
pub fn is_year(year: &str) -> bool {
    YEAR_RE.is_match(year)
}

/// Whether `orcid` is a well-formed ORCID iD (without URL prefix).
pub fn is_orcid(orcid: &str) -> bool {
    ORCID_RE.is_match(orcid)
}

/// Whether `url` parses as an absolute http(s) URL.
pub fn is_http_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host().is_some(),
        Err(_) => false,
    }
}

// =============================================================================
// SHARED CHECKS
// =============================================================================

fn validate_abstracts(errs: &mut ValidationErrors, prefix: &str, abstracts: &[Text]) {
    for (i, a) in abstracts.iter().enumerate() {
        if a.text.trim().is_empty() {
            errs.push(
                format!("/abstract/{}/text", i),
                format!("{}.abstract.text.required", prefix),
            );
        }
        if a.lang.is_empty() {
            errs.push(
                format!("/abstract/{}/lang", i),
                format!("{}.abstract.lang.required", prefix),
            );
        } else if !crate::defaults::LANGUAGES.contains(&a.lang.as_str()) {
            errs.push(
                format!("/abstract/{}/lang", i),
                format!("{}.abstract.lang.invalid", prefix),
            );
        }
    }
}

fn validate_links(errs: &mut ValidationErrors, prefix: &str, links: &[Link]) {
    for (i, l) in links.iter().enumerate() {
        if l.url.trim().is_empty() {
            errs.push(
                format!("/link/{}/url", i),
                format!("{}.link.url.required", prefix),
            );
        } else if !is_http_url(&l.url) {
            errs.push(
                format!("/link/{}/url", i),
                format!("{}.link.url.invalid", prefix),
            );
        }
    }
}

fn validate_contributors(
    errs: &mut ValidationErrors,
    prefix: &str,
    role: ContributorRole,
    contributors: &[Contributor],
) {
    let role = role.as_str();
    for (i, c) in contributors.iter().enumerate() {
        if c.last_name.trim().is_empty() && c.full_name.trim().is_empty() {
            errs.push(
                format!("/{}/{}/last_name", role, i),
                format!("{}.{}.last_name.required", prefix, role),
            );
        }
        if let Some(orcid) = &c.orcid {
            if !is_orcid(orcid) {
                errs.push(
                    format!("/{}/{}/orcid", role, i),
                    format!("{}.{}.orcid.invalid", prefix, role),
                );
            }
        }
    }
}

/// Embargo consistency for a dataset or file rooted at `pointer`.
fn validate_embargo(
    errs: &mut ValidationErrors,
    pointer: &str,
    prefix: &str,
    access_level: Option<AccessLevel>,
    after: Option<AccessLevel>,
    embargo_date: Option<chrono::NaiveDate>,
) {
    if access_level != Some(AccessLevel::Embargoed) {
        return;
    }
    if embargo_date.is_none() {
        errs.push(
            format!("{}/embargo_date", pointer),
            format!("{}.embargo_date.required", prefix),
        );
    }
    match after {
        None => errs.push(
            format!("{}/access_level_after_embargo", pointer),
            format!("{}.access_level_after_embargo.required", prefix),
        ),
        Some(level) if !level.valid_after_embargo() => errs.push(
            format!("{}/access_level_after_embargo", pointer),
            format!("{}.access_level_after_embargo.invalid", prefix),
        ),
        Some(_) => {}
    }
}

fn validate_year(errs: &mut ValidationErrors, prefix: &str, year: &str, required: bool) {
    if year.is_empty() {
        if required {
            errs.push("/year", format!("{}.year.required", prefix));
        }
    } else if !is_year(year) {
        errs.push("/year", format!("{}.year.invalid", prefix));
    }
}

// =============================================================================
// DATASETS
// =============================================================================

/// Validate a dataset; public datasets must be complete.
pub fn validate_dataset(d: &Dataset) -> Result<(), ValidationErrors> {
    const P: &str = "dataset";
    let mut errs = ValidationErrors::new();
    let public = d.common.status == Status::Public;

    if d.common.id.is_nil() {
        errs.push("/id", "dataset.id.required");
    }

    validate_abstracts(&mut errs, P, &d.common.abstracts);
    validate_links(&mut errs, P, &d.common.links);
    validate_contributors(&mut errs, P, ContributorRole::Author, &d.author);
    validate_contributors(&mut errs, P, ContributorRole::Contributor, &d.contributor);
    validate_year(&mut errs, P, &d.common.year, public);

    for (i, id) in d.identifiers.iter().enumerate() {
        if id.value.trim().is_empty() {
            errs.push(
                format!("/identifiers/{}/value", i),
                "dataset.identifier.value.required",
            );
        }
    }

    validate_embargo(
        &mut errs,
        "",
        P,
        d.access_level,
        d.access_level_after_embargo,
        d.embargo_date,
    );

    if public {
        if d.common.title.trim().is_empty() {
            errs.push("/title", "dataset.title.required");
        }
        if d.publisher.trim().is_empty() {
            errs.push("/publisher", "dataset.publisher.required");
        }
        if d.identifiers.is_empty() {
            errs.push("/identifiers", "dataset.identifier.required");
        }
        if d.format.is_empty() {
            errs.push("/format", "dataset.format.required");
        }
        if d.license.is_empty() && d.other_license.is_empty() {
            errs.push("/license", "dataset.license.required");
        }
        if d.access_level.is_none() {
            errs.push("/access_level", "dataset.access_level.required");
        }
        if d.author.is_empty() {
            errs.push("/author", "dataset.author.required");
        }
    }

    errs.into_result()
}

// =============================================================================
// PUBLICATIONS
// =============================================================================

/// Validate a publication; public publications must be complete for their type.
pub fn validate_publication(p: &Publication) -> Result<(), ValidationErrors> {
    const P: &str = "publication";
    let mut errs = ValidationErrors::new();
    let public = p.common.status == Status::Public;

    if p.common.id.is_nil() {
        errs.push("/id", "publication.id.required");
    }
    if !p.classification.is_empty()
        && !crate::defaults::CLASSIFICATIONS.contains(&p.classification.as_str())
    {
        errs.push("/classification", "publication.classification.invalid");
    }

    validate_abstracts(&mut errs, P, &p.common.abstracts);
    validate_links(&mut errs, P, &p.common.links);
    validate_contributors(&mut errs, P, ContributorRole::Author, &p.author);
    validate_contributors(&mut errs, P, ContributorRole::Editor, &p.editor);
    validate_contributors(&mut errs, P, ContributorRole::Supervisor, &p.supervisor);
    validate_year(&mut errs, P, &p.common.year, public);

    for (i, f) in p.files.iter().enumerate() {
        let pointer = format!("/file/{}", i);
        if f.name.trim().is_empty() {
            errs.push(format!("{}/name", pointer), "publication.file.name.required");
        }
        if f.access_level.is_none() {
            errs.push(
                format!("{}/access_level", pointer),
                "publication.file.access_level.required",
            );
        }
        validate_embargo(
            &mut errs,
            &pointer,
            "publication.file",
            f.access_level,
            f.access_level_after_embargo,
            f.embargo_date,
        );
    }

    if public {
        if p.common.title.trim().is_empty() {
            errs.push("/title", "publication.title.required");
        }
        if p.classification.is_empty() {
            errs.push("/classification", "publication.classification.required");
        }
        if p.kind.uses_editors() {
            if p.editor.is_empty() {
                errs.push("/editor", "publication.editor.required");
            }
        } else if p.author.is_empty() {
            errs.push("/author", "publication.author.required");
        }
        match p.kind {
            PublicationKind::JournalArticle if p.publication.trim().is_empty() => {
                errs.push("/publication", "publication.journal_article.publication.required");
            }
            PublicationKind::Conference
                if p.conference
                    .as_ref()
                    .map(|c| c.name.trim().is_empty())
                    .unwrap_or(true) =>
            {
                errs.push("/conference/name", "publication.conference.name.required");
            }
            PublicationKind::Dissertation => {
                if p.defense_date.is_none() {
                    errs.push("/defense_date", "publication.dissertation.defense_date.required");
                }
                if p.defense_place.trim().is_empty() {
                    errs.push(
                        "/defense_place",
                        "publication.dissertation.defense_place.required",
                    );
                }
            }
            _ => {}
        }
    }

    errs.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conference, Identifier, PublicationFile};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn complete_dataset() -> Dataset {
        let mut d = Dataset::new("Soil samples 2025");
        d.common.year = "2025".into();
        d.publisher = "Zenodo".into();
        d.identifiers.push(Identifier {
            kind: "doi".into(),
            value: "10.5281/zenodo.1".into(),
        });
        d.format.push("text/csv".into());
        d.license = "CC-BY-4.0".into();
        d.access_level = Some(AccessLevel::Open);
        d.author.push(Contributor::external("Ada", "Lovelace"));
        d
    }

    #[test]
    fn test_draft_dataset_needs_little() {
        let d = Dataset::new("");
        assert!(validate_dataset(&d).is_ok());
    }

    #[test]
    fn test_public_dataset_requires_fields() {
        let mut d = Dataset::new("");
        d.common.status = Status::Public;
        let errs = validate_dataset(&d).unwrap_err();
        for code in [
            "dataset.title.required",
            "dataset.year.required",
            "dataset.publisher.required",
            "dataset.identifier.required",
            "dataset.format.required",
            "dataset.license.required",
            "dataset.access_level.required",
            "dataset.author.required",
        ] {
            assert!(errs.has_code(code), "missing {}", code);
        }
    }

    #[test]
    fn test_complete_public_dataset_is_valid() {
        let mut d = complete_dataset();
        d.common.status = Status::Public;
        assert_eq!(validate_dataset(&d), Ok(()));
    }

    #[test]
    fn test_dataset_embargo_rules() {
        let mut d = complete_dataset();
        d.access_level = Some(AccessLevel::Embargoed);
        let errs = validate_dataset(&d).unwrap_err();
        assert!(errs.has_code("dataset.embargo_date.required"));
        assert!(errs.has_code("dataset.access_level_after_embargo.required"));

        d.embargo_date = NaiveDate::from_ymd_opt(2030, 1, 1);
        d.access_level_after_embargo = Some(AccessLevel::Closed);
        let errs = validate_dataset(&d).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs.has_code("dataset.access_level_after_embargo.invalid"));

        d.access_level_after_embargo = Some(AccessLevel::Open);
        assert!(validate_dataset(&d).is_ok());
    }

    #[test]
    fn test_abstract_and_link_pointers() {
        let mut d = Dataset::new("x");
        d.common.abstracts.push(Text {
            id: Uuid::now_v7(),
            lang: "eng".into(),
            text: "fine".into(),
        });
        d.common.abstracts.push(Text {
            id: Uuid::now_v7(),
            lang: "".into(),
            text: " ".into(),
        });
        d.common.links.push(Link {
            id: Uuid::now_v7(),
            url: "ftp://example.org".into(),
            ..Default::default()
        });
        let errs = validate_dataset(&d).unwrap_err();
        let pointers: Vec<&str> = errs.iter().map(|e| e.pointer.as_str()).collect();
        assert!(pointers.contains(&"/abstract/1/text"));
        assert!(pointers.contains(&"/abstract/1/lang"));
        assert!(pointers.contains(&"/link/0/url"));
        assert!(!pointers.contains(&"/abstract/0/text"));
    }

    #[test]
    fn test_contributor_name_and_orcid() {
        let mut d = Dataset::new("x");
        d.author.push(Contributor::default());
        let mut c = Contributor::external("Grace", "Hopper");
        c.orcid = Some("0000-0002-1825-009".into());
        d.author.push(c);
        let errs = validate_dataset(&d).unwrap_err();
        assert!(errs.has_code("dataset.author.last_name.required"));
        assert!(errs.has_code("dataset.author.orcid.invalid"));
        assert_eq!(errs.iter().next().map(|e| e.pointer.as_str()), Some("/author/0/last_name"));
    }

    #[test]
    fn test_year_format() {
        assert!(is_year("2024"));
        assert!(!is_year("24"));
        assert!(!is_year("20245"));
        assert!(!is_year("abcd"));
        let mut d = Dataset::new("x");
        d.common.year = "99".into();
        assert!(validate_dataset(&d).unwrap_err().has_code("dataset.year.invalid"));
    }

    #[test]
    fn test_orcid_format() {
        assert!(is_orcid("0000-0002-1825-0097"));
        assert!(is_orcid("0000-0002-1694-233X"));
        assert!(!is_orcid("https://orcid.org/0000-0002-1825-0097"));
    }

    fn complete_article() -> Publication {
        let mut p = Publication::new(PublicationKind::JournalArticle, "On things");
        p.common.year = "2024".into();
        p.publication = "Journal of Things".into();
        p.author.push(Contributor::external("Ada", "Lovelace"));
        p
    }

    #[test]
    fn test_public_article_requires_journal() {
        let mut p = complete_article();
        p.common.status = Status::Public;
        assert!(validate_publication(&p).is_ok());
        p.publication.clear();
        assert!(validate_publication(&p)
            .unwrap_err()
            .has_code("publication.journal_article.publication.required"));
    }

    #[test]
    fn test_public_editor_types_require_editor() {
        let mut p = complete_article();
        p.kind = PublicationKind::BookEditor;
        p.common.status = Status::Public;
        let errs = validate_publication(&p).unwrap_err();
        assert!(errs.has_code("publication.editor.required"));
        assert!(!errs.has_code("publication.author.required"));
    }

    #[test]
    fn test_public_dissertation_and_conference() {
        let mut p = complete_article();
        p.kind = PublicationKind::Dissertation;
        p.common.status = Status::Public;
        let errs = validate_publication(&p).unwrap_err();
        assert!(errs.has_code("publication.dissertation.defense_date.required"));
        assert!(errs.has_code("publication.dissertation.defense_place.required"));

        p.kind = PublicationKind::Conference;
        assert!(validate_publication(&p)
            .unwrap_err()
            .has_code("publication.conference.name.required"));
        p.conference = Some(Conference {
            name: "RustConf".into(),
            ..Default::default()
        });
        assert!(validate_publication(&p).is_ok());
    }

    #[test]
    fn test_file_rules() {
        let mut p = complete_article();
        p.files.push(PublicationFile {
            id: Uuid::now_v7(),
            access_level: Some(AccessLevel::Embargoed),
            access_level_after_embargo: Some(AccessLevel::Open),
            ..Default::default()
        });
        let errs = validate_publication(&p).unwrap_err();
        assert!(errs.has_code("publication.file.name.required"));
        assert!(errs.has_code("publication.file.embargo_date.required"));
        assert!(errs
            .iter()
            .any(|e| e.pointer == "/file/0/embargo_date"));
    }

    #[test]
    fn test_invalid_classification() {
        let mut p = complete_article();
        p.classification = "Z9".into();
        assert!(validate_publication(&p)
            .unwrap_err()
            .has_code("publication.classification.invalid"));
    }

    #[test]
    fn test_errors_display_lists_codes() {
        let mut errs = ValidationErrors::new();
        errs.push("/title", "dataset.title.required");
        errs.push("/year", "dataset.year.required");
        assert_eq!(
            errs.to_string(),
            "dataset.title.required, dataset.year.required"
        );
    }
}
