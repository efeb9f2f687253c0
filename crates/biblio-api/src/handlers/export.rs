//! CSV export of the current search.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use biblio_core::{defaults, Contributor, Dataset, Publication, Record, SearchArgs, SearchScope};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::{AppState, RecordStore};

/// Record kinds that can be exported as CSV rows.
pub trait ExportCsv: RecordStore {
    const HEADERS: &'static [&'static str];

    fn csv_row(&self) -> Vec<String>;
}

fn names(contributors: &[Contributor]) -> String {
    contributors
        .iter()
        .map(Contributor::name)
        .collect::<Vec<_>>()
        .join("; ")
}

fn departments<T: Record>(record: &T) -> String {
    record.common().organization_ids().join("; ")
}

fn date<T: Record>(record: &T) -> String {
    record
        .common()
        .date_updated
        .map(|d| d.to_rfc3339())
        .unwrap_or_default()
}

impl ExportCsv for Dataset {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "status",
        "title",
        "year",
        "authors",
        "contributors",
        "publisher",
        "doi",
        "license",
        "access_level",
        "embargo_date",
        "keywords",
        "departments",
        "date_updated",
    ];

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.common.id.to_string(),
            self.common.status.to_string(),
            self.common.title.clone(),
            self.common.year.clone(),
            names(&self.author),
            names(&self.contributor),
            self.publisher.clone(),
            self.identifier("doi").unwrap_or_default().to_string(),
            self.license.clone(),
            self.access_level
                .map(|a| a.as_str().to_string())
                .unwrap_or_default(),
            self.embargo_date.map(|d| d.to_string()).unwrap_or_default(),
            self.common.keywords.join("; "),
            departments(self),
            date(self),
        ]
    }
}

impl ExportCsv for Publication {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "status",
        "type",
        "classification",
        "title",
        "year",
        "authors",
        "editors",
        "supervisors",
        "publication",
        "volume",
        "issue",
        "pages",
        "doi",
        "isbn",
        "issn",
        "publisher",
        "language",
        "keywords",
        "departments",
        "files",
        "date_updated",
    ];

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.common.id.to_string(),
            self.common.status.to_string(),
            self.kind.as_str().to_string(),
            self.classification.clone(),
            self.common.title.clone(),
            self.common.year.clone(),
            names(&self.author),
            names(&self.editor),
            names(&self.supervisor),
            self.publication.clone(),
            self.volume.clone(),
            self.issue.clone(),
            self.pages().unwrap_or_default(),
            self.doi.clone(),
            self.isbn.join("; "),
            self.issn.join("; "),
            self.publisher.clone(),
            self.language.join("; "),
            self.common.keywords.join("; "),
            departments(self),
            self.files.len().to_string(),
            date(self),
        ]
    }
}

fn csv_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(biblio_core::Error::Serialization(e.to_string()))
}

/// Write every record matching `args` (all pages) as CSV.
pub async fn export_csv<T: ExportCsv>(
    state: &AppState,
    scope: &SearchScope,
    mut args: SearchArgs,
) -> Result<Vec<u8>, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(T::HEADERS).map_err(csv_error)?;

    let repository = T::repository(state);
    args.page = 1;
    args.page_size = defaults::MAX_PAGE_SIZE;
    let mut rows = 0usize;
    loop {
        let hits = state.searcher.search(T::KIND, &args, scope).await?;
        if hits.ids.is_empty() {
            break;
        }
        for record in repository.get_many(&hits.ids).await? {
            writer.write_record(record.csv_row()).map_err(csv_error)?;
            rows += 1;
        }
        if !hits.has_next_page() {
            break;
        }
        args.page += 1;
        if args.check_window().is_err() {
            warn!(
                subsystem = "api",
                op = "export",
                record_kind = T::KIND.as_str(),
                total = hits.total,
                result_count = rows,
                "Export truncated at the search result window"
            );
            break;
        }
    }

    info!(
        subsystem = "api",
        op = "export",
        record_kind = T::KIND.as_str(),
        result_count = rows,
        "CSV export"
    );
    writer.into_inner().map_err(csv_error)
}

/// Export the records matching the search query parameters as CSV.
///
/// Takes the same query parameters as the search endpoint; every page is
/// written, up to the search result window.
///
/// # Returns
/// - 200 OK with a `text/csv` attachment
/// - 400 Bad Request for an invalid search
pub async fn export<T: ExportCsv>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let args = SearchArgs::from_query_pairs(&pairs)?;
    let scope = SearchScope::for_user(&user);
    let body = export_csv::<T>(&state, &scope, args).await?;
    let disposition = format!("attachment; filename=\"{}.csv\"", T::PATH);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
