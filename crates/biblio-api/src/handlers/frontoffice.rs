//! Public JSON API for the frontoffice and harvesters.
//!
//! Only public records are served. Workflow and reviewer fields are removed,
//! and files that are not openly accessible lose their download details.
//! Harvest lists also report records that were public once and no longer
//! are, as tombstones, so harvesters can drop them.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use biblio_core::{defaults, ChangeCursor, Dataset, Publication, Record, Status};

use crate::error::ApiError;
use crate::state::{AppState, RecordStore};

/// Fields never shown outside the backoffice.
const PRIVATE_FIELDS: &[&str] = &[
    "snapshot_id",
    "date_from",
    "date_until",
    "creator_id",
    "user_id",
    "last_user_id",
    "locked",
    "message",
    "reviewer_note",
    "reviewer_tags",
];

/// Record kinds with a public representation.
pub trait PublicView: RecordStore {
    fn public_json(&self, frontoffice_url: Option<&str>) -> Result<Value, ApiError> {
        let mut map = common_json(self)?;
        self.adjust(&mut map, frontoffice_url);
        Ok(Value::Object(map))
    }

    /// Kind specific changes on top of the common field removal.
    fn adjust(&self, _map: &mut Map<String, Value>, _frontoffice_url: Option<&str>) {}
}

fn common_json<T: Record>(record: &T) -> Result<Map<String, Value>, ApiError> {
    let value = serde_json::to_value(record).map_err(biblio_core::Error::from)?;
    let Value::Object(mut map) = value else {
        return Err(ApiError::Internal(biblio_core::Error::Serialization(
            "record did not serialize to an object".to_string(),
        )));
    };
    for field in PRIVATE_FIELDS {
        map.remove(*field);
    }
    Ok(map)
}

impl PublicView for Dataset {}

impl PublicView for Publication {
    fn adjust(&self, map: &mut Map<String, Value>, frontoffice_url: Option<&str>) {
        let files: Vec<Value> = self
            .files
            .iter()
            .filter_map(|file| {
                let mut value = match serde_json::to_value(file) {
                    Ok(Value::Object(m)) => m,
                    _ => return None,
                };
                if file.is_openly_accessible() {
                    if let Some(base) = frontoffice_url {
                        value.insert(
                            "download_url".to_string(),
                            json!(format!(
                                "{}/download/{}/{}",
                                base.trim_end_matches('/'),
                                self.common.id,
                                file.id
                            )),
                        );
                    }
                } else {
                    value.remove("sha256");
                    value.remove("size");
                }
                Some(Value::Object(value))
            })
            .collect();
        map.insert("files".to_string(), Value::Array(files));
    }
}

fn tombstone<T: Record>(record: &T) -> Value {
    json!({
        "id": record.id(),
        "status": record.status(),
        "date_updated": record.common().date_updated,
    })
}

/// A public record by id.
///
/// # Returns
/// - 200 OK with the public representation
/// - 404 Not Found if the record is missing or not public
pub async fn get<T: PublicView>(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let record = T::repository(&state)
        .get(id)
        .await?
        .filter(|r| r.status() == Status::Public)
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", T::KIND, id)))?;
    Ok(Json(record.public_json(state.frontoffice_url.as_deref())?))
}

#[derive(Debug, Deserialize)]
pub struct HarvestQuery {
    pub updated_since: Option<DateTime<Utc>>,
    /// Id of the last record of the previous page; requires `updated_since`.
    pub after: Option<Uuid>,
    pub limit: Option<i64>,
}

impl HarvestQuery {
    fn cursor(&self) -> ChangeCursor {
        let since = self.updated_since.unwrap_or_default();
        match self.after {
            Some(id) => ChangeCursor::new(since, id),
            None => ChangeCursor::since(since),
        }
    }
}

/// Query parameters of the following harvest page.
#[derive(Debug, Serialize)]
pub struct NextPage {
    pub updated_since: DateTime<Utc>,
    pub after: Uuid,
}

impl From<ChangeCursor> for NextPage {
    fn from(cursor: ChangeCursor) -> Self {
        Self {
            updated_since: cursor.date_from,
            after: cursor.id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HarvestPage {
    pub records: Vec<Value>,
    /// Absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<NextPage>,
}

/// Records changed after the cursor, oldest change first.
///
/// Without `after`, every change made after `updated_since` is included.
/// Records that are no longer public but once were come back as tombstones
/// so harvesters can drop them.
///
/// # Query Parameters
/// - `updated_since`: RFC 3339 timestamp of the cursor
/// - `after`: id of the last record already seen at that timestamp
/// - `limit`: page size, capped at the harvest maximum
///
/// # Returns
/// - 200 OK with `records`, and `next` holding the cursor of the following
///   page when this one is full
pub async fn harvest<T: PublicView>(
    State(state): State<AppState>,
    Query(query): Query<HarvestQuery>,
) -> Result<Json<HarvestPage>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(defaults::HARVEST_LIMIT)
        .clamp(1, defaults::MAX_HARVEST_LIMIT);

    let batch = T::repository(&state)
        .updated_since(query.cursor(), limit)
        .await?;
    let next = if batch.len() as i64 == limit {
        batch.last().and_then(ChangeCursor::of).map(NextPage::from)
    } else {
        None
    };

    let frontoffice_url = state.frontoffice_url.as_deref();
    let mut records = Vec::with_capacity(batch.len());
    for record in &batch {
        match record.status() {
            Status::Public => records.push(record.public_json(frontoffice_url)?),
            _ if record.common().has_been_public => records.push(tombstone(record)),
            _ => {}
        }
    }

    debug!(
        subsystem = "api",
        component = "frontoffice",
        record_kind = T::KIND.as_str(),
        scanned = batch.len(),
        result_count = records.len(),
        "Harvest page"
    );
    Ok(Json(HarvestPage { records, next }))
}
