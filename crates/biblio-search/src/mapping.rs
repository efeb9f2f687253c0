//! Index settings shared by the dataset and publication indices.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::client::DOC_TYPE;

/// Settings and mapping for a freshly created index.
///
/// Strings default to `keyword` so every field can be filtered and faceted;
/// only `title` and `all` are analyzed.
pub fn index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "index": { "max_result_window": 100_000 }
        },
        "mappings": {
            DOC_TYPE: {
                "dynamic_templates": [
                    { "strings": {
                        "match_mapping_type": "string",
                        "mapping": { "type": "keyword" }
                    }}
                ],
                "properties": {
                    "all": { "type": "text" },
                    "title": {
                        "type": "text",
                        "fields": { "raw": { "type": "keyword" } }
                    },
                    "year": { "type": "keyword" },
                    "locked": { "type": "boolean" },
                    "has_files": { "type": "boolean" },
                    "has_been_public": { "type": "boolean" },
                    "date_created": { "type": "date" },
                    "date_updated": { "type": "date" },
                    "embargo_date": { "type": "date" }
                }
            }
        }
    })
}

/// Name of a new versioned index behind `alias`.
pub fn versioned_index_name(alias: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", alias, now.format("%Y%m%d%H%M%S%3f"))
}
