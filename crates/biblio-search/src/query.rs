//! Translation of [`SearchArgs`] into Elasticsearch request bodies and of
//! responses back into [`SearchHits`].
//!
//! User filters go into `post_filter` so they narrow the hits without
//! narrowing the facets. Each facet is a `filter` aggregation applying every
//! *other* active filter, which keeps counts for the other values of a
//! selected facet visible.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use uuid::Uuid;

use biblio_core::{defaults, Error, FacetValue, RecordKind, Result, SearchArgs, SearchHits, SearchScope};

const COMMON_FIELDS: &[&str] = &[
    "status",
    "year",
    "locked",
    "has_been_public",
    "faculty_id",
    "organization_id",
    "project_id",
    "person_id",
    "creator_id",
    "user_id",
    "reviewer_tags",
    "keyword",
    "language",
    "access_level",
];

const DATASET_FIELDS: &[&str] = &["license", "format", "publisher"];

const PUBLICATION_FIELDS: &[&str] = &["type", "classification", "has_files", "orcid"];

/// Whether `field` may be filtered on or faceted for `kind`.
pub fn is_allowed_field(kind: RecordKind, field: &str) -> bool {
    COMMON_FIELDS.contains(&field)
        || match kind {
            RecordKind::Dataset => DATASET_FIELDS.contains(&field),
            RecordKind::Publication => PUBLICATION_FIELDS.contains(&field),
        }
}

fn check_field(kind: RecordKind, field: &str) -> Result<()> {
    if is_allowed_field(kind, field) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "unknown {} search field '{}'",
            kind, field
        )))
    }
}

/// Sort clause for a sort key; `None` sorts by last update.
pub fn sort_clause(sort: Option<&str>) -> Result<Value> {
    let clause = match sort.unwrap_or("date-updated-desc") {
        "date-updated-desc" => json!([{"date_updated": "desc"}, {"id": "desc"}]),
        "date-updated-asc" => json!([{"date_updated": "asc"}, {"id": "asc"}]),
        "date-created-desc" => json!([{"date_created": "desc"}, {"id": "desc"}]),
        "year-desc" => json!([{"year": "desc"}, {"date_updated": "desc"}]),
        "title-asc" => json!([{"title.raw": "asc"}, {"id": "asc"}]),
        "relevance" => json!(["_score", {"date_updated": "desc"}]),
        other => {
            return Err(Error::InvalidInput(format!("unknown sort '{}'", other)));
        }
    };
    Ok(clause)
}

fn scope_filter(scope: &SearchScope) -> Option<Value> {
    match scope {
        SearchScope::All => None,
        SearchScope::Public => Some(json!({"term": {"status": "public"}})),
        SearchScope::Owner { user_id, person_id } => {
            let mut should = vec![
                json!({"term": {"creator_id": user_id}}),
                json!({"term": {"user_id": user_id}}),
            ];
            if let Some(person_id) = person_id {
                should.push(json!({"term": {"person_id": person_id}}));
            }
            Some(json!({"bool": {
                "should": should,
                "minimum_should_match": 1,
                "must_not": [{"term": {"status": "deleted"}}]
            }}))
        }
    }
}

fn text_query(query: &str) -> Value {
    if query.trim().is_empty() {
        json!({"match_all": {}})
    } else {
        json!({"simple_query_string": {
            "query": query,
            "fields": ["title^2", "all"],
            "default_operator": "and"
        }})
    }
}

fn terms_filter(field: &str, values: &[String]) -> Value {
    json!({"terms": { field: values }})
}

fn filters_except(filters: &BTreeMap<String, Vec<String>>, skip: Option<&str>) -> Vec<Value> {
    filters
        .iter()
        .filter(|(field, values)| Some(field.as_str()) != skip && !values.is_empty())
        .map(|(field, values)| terms_filter(field, values))
        .collect()
}

/// Build the `_search` body for `args` within `scope`.
pub fn build_search(kind: RecordKind, args: &SearchArgs, scope: &SearchScope) -> Result<Value> {
    for field in args.filters.keys().chain(args.facets.iter()) {
        check_field(kind, field)?;
    }
    args.check_window()?;

    let mut query = json!({"bool": {"must": [text_query(&args.query)]}});
    if let Some(filter) = scope_filter(scope) {
        query["bool"]["filter"] = json!([filter]);
    }

    let mut body = json!({
        "from": args.offset(),
        "size": args.limit(),
        "query": query,
        "sort": sort_clause(args.sort.as_deref())?,
        "_source": false,
        "track_scores": args.sort.as_deref() == Some("relevance"),
    });

    let active = filters_except(&args.filters, None);
    if !active.is_empty() {
        body["post_filter"] = json!({"bool": {"filter": active}});
    }

    if !args.facets.is_empty() {
        let mut aggs = serde_json::Map::new();
        for facet in &args.facets {
            let others = filters_except(&args.filters, Some(facet));
            let filter = if others.is_empty() {
                json!({"match_all": {}})
            } else {
                json!({"bool": {"filter": others}})
            };
            aggs.insert(
                facet.clone(),
                json!({
                    "filter": filter,
                    "aggs": { "facet": {"terms": {
                        "field": facet,
                        "size": defaults::FACET_SIZE,
                        "min_doc_count": 1
                    }}}
                }),
            );
        }
        body["aggs"] = Value::Object(aggs);
    }

    Ok(body)
}

fn bucket_key(bucket: &Value) -> Option<String> {
    if let Some(s) = bucket.get("key_as_string").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    match bucket.get("key")? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Parse a `_search` response produced for `args`.
pub fn parse_search(args: &SearchArgs, body: &Value) -> Result<SearchHits> {
    let hits = body
        .get("hits")
        .ok_or_else(|| Error::Search("search response without hits".into()))?;

    // ES 6 reports a number, ES 7+ an object with `value`.
    let total = match &hits["total"] {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::Object(o) => o.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    };

    let ids = hits["hits"]
        .as_array()
        .map(|a| a.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(|hit| hit.get("_id").and_then(Value::as_str))
        .map(|id| {
            Uuid::parse_str(id)
                .map_err(|e| Error::Search(format!("invalid document id '{}': {}", id, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut facets = BTreeMap::new();
    for facet in &args.facets {
        let buckets = body["aggregations"][facet]["facet"]["buckets"]
            .as_array()
            .map(|a| a.as_slice())
            .unwrap_or_default();
        let values = buckets
            .iter()
            .filter_map(|b| {
                Some(FacetValue {
                    value: bucket_key(b)?,
                    count: b.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
                })
            })
            .collect();
        facets.insert(facet.clone(), values);
    }

    Ok(SearchHits {
        total,
        page: args.page.max(1),
        page_size: args.limit(),
        ids,
        facets,
    })
}
