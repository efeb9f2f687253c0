//! Mapping of publications to ORCID v3 work documents.

use serde_json::{json, Map, Value};

use biblio_core::{Contributor, Publication, PublicationKind};

/// Longest short description ORCID accepts.
const MAX_DESCRIPTION_CHARS: usize = 5000;

/// ORCID work type for a publication type.
pub fn work_type(kind: PublicationKind) -> &'static str {
    match kind {
        PublicationKind::JournalArticle => "journal-article",
        PublicationKind::Book | PublicationKind::BookEditor => "book",
        PublicationKind::BookChapter => "book-chapter",
        PublicationKind::IssueEditor => "journal-issue",
        PublicationKind::Conference => "conference-paper",
        PublicationKind::Dissertation => "dissertation-thesis",
        PublicationKind::Miscellaneous => "other",
    }
}

/// ISO 639-1 code ORCID expects for a stored ISO 639-2/B code.
fn language_code(lang: &str) -> Option<&'static str> {
    let code = match lang {
        "dut" => "nl",
        "eng" => "en",
        "fre" => "fr",
        "ger" => "de",
        "ita" => "it",
        "spa" => "es",
        "por" => "pt",
        "swe" => "sv",
        "dan" => "da",
        "nor" => "no",
        "fin" => "fi",
        "pol" => "pl",
        "cze" => "cs",
        "rus" => "ru",
        "chi" => "zh",
        "jpn" => "ja",
        "ara" => "ar",
        "lat" => "la",
        "gre" => "el",
        "tur" => "tr",
        _ => return None,
    };
    Some(code)
}

fn external_id(kind: &str, value: &str, relationship: &str) -> Value {
    json!({
        "external-id-type": kind,
        "external-id-value": value,
        "external-id-relationship": relationship,
    })
}

fn contributor(c: &Contributor, role: &str, first: bool) -> Value {
    let mut value = json!({
        "credit-name": {"value": c.name()},
        "contributor-attributes": {
            "contributor-sequence": if first { "first" } else { "additional" },
            "contributor-role": role,
        },
    });
    if let Some(orcid) = &c.orcid {
        value["contributor-orcid"] = json!({"path": orcid});
    }
    value
}

/// Build the ORCID work for `publication`.
///
/// `frontoffice_url` is the public base URL; when given the work links to
/// the publication's public page.
pub fn publication_to_work(publication: &Publication, frontoffice_url: Option<&str>) -> Value {
    let common = &publication.common;
    let mut work = Map::new();

    work.insert("title".into(), json!({"title": {"value": common.title}}));
    work.insert("type".into(), json!(work_type(publication.kind)));

    if let Ok(year) = common.year.trim().parse::<i32>() {
        work.insert(
            "publication-date".into(),
            json!({"year": {"value": format!("{:04}", year)}}),
        );
    }

    let mut ids = vec![external_id("source-work-id", &common.id.to_string(), "self")];
    if !publication.doi.is_empty() {
        ids.push(external_id("doi", &publication.doi, "self"));
    }
    for isbn in &publication.isbn {
        let relationship = if publication.kind == PublicationKind::BookChapter {
            "part-of"
        } else {
            "self"
        };
        ids.push(external_id("isbn", isbn, relationship));
    }
    for issn in &publication.issn {
        ids.push(external_id("issn", issn, "part-of"));
    }
    work.insert("external-ids".into(), json!({"external-id": ids}));

    if let Some(base) = frontoffice_url {
        work.insert(
            "url".into(),
            json!({"value": format!("{}/publication/{}", base.trim_end_matches('/'), common.id)}),
        );
    }

    if !publication.publication.is_empty() {
        work.insert(
            "journal-title".into(),
            json!({"value": publication.publication}),
        );
    }

    if let Some(text) = common.abstracts.iter().map(|a| a.text.trim()).find(|t| !t.is_empty()) {
        let description: String = text.chars().take(MAX_DESCRIPTION_CHARS).collect();
        work.insert("short-description".into(), json!(description));
    }

    if let Some(code) = publication.language.first().and_then(|l| language_code(l)) {
        work.insert("language-code".into(), json!(code));
    }

    let (people, role) = if publication.kind.uses_editors() {
        (&publication.editor, "editor")
    } else {
        (&publication.author, "author")
    };
    let contributors: Vec<Value> = people
        .iter()
        .enumerate()
        .map(|(i, c)| contributor(c, role, i == 0))
        .collect();
    if !contributors.is_empty() {
        work.insert("contributors".into(), json!({"contributor": contributors}));
    }

    Value::Object(work)
}
