//! Minimal Elasticsearch 6 REST client.

use std::time::{Duration, Instant};

use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use biblio_core::{defaults, Error, RecordKind, Result};

/// Mapping type used for every document (ES 6 still requires one).
pub const DOC_TYPE: &str = "_doc";

/// Index aliases per record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    pub datasets: String,
    pub publications: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            datasets: defaults::ES_DATASET_ALIAS.to_string(),
            publications: defaults::ES_PUBLICATION_ALIAS.to_string(),
        }
    }
}

impl IndexNames {
    /// Aliases from `ES_DATASET_ALIAS` and `ES_PUBLICATION_ALIAS`.
    pub fn from_env() -> Self {
        Self {
            datasets: std::env::var("ES_DATASET_ALIAS")
                .unwrap_or_else(|_| defaults::ES_DATASET_ALIAS.to_string()),
            publications: std::env::var("ES_PUBLICATION_ALIAS")
                .unwrap_or_else(|_| defaults::ES_PUBLICATION_ALIAS.to_string()),
        }
    }

    pub fn alias(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Dataset => &self.datasets,
            RecordKind::Publication => &self.publications,
        }
    }
}

/// One line pair of a `_bulk` request.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOp {
    Index { index: String, id: String, doc: Value },
    Delete { index: String, id: String },
}

impl BulkOp {
    pub fn id(&self) -> &str {
        match self {
            BulkOp::Index { id, .. } | BulkOp::Delete { id, .. } => id,
        }
    }

    /// Append the NDJSON lines of this operation to `buf`.
    pub fn write_ndjson(&self, buf: &mut String) -> Result<()> {
        match self {
            BulkOp::Index { index, id, doc } => {
                let action = json!({"index": {"_index": index, "_type": DOC_TYPE, "_id": id}});
                buf.push_str(&serde_json::to_string(&action)?);
                buf.push('\n');
                buf.push_str(&serde_json::to_string(doc)?);
                buf.push('\n');
            }
            BulkOp::Delete { index, id } => {
                let action = json!({"delete": {"_index": index, "_type": DOC_TYPE, "_id": id}});
                buf.push_str(&serde_json::to_string(&action)?);
                buf.push('\n');
            }
        }
        Ok(())
    }
}

/// A bulk item the cluster rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub id: String,
    pub status: u16,
    pub reason: String,
}

/// Outcome of one or more bulk requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub succeeded: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn merge(&mut self, other: BulkReport) {
        self.succeeded += other.succeeded;
        self.failures.extend(other.failures);
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<std::collections::HashMap<String, BulkItem>>,
}

#[derive(Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

fn parse_bulk_response(body: &Value) -> Result<BulkReport> {
    let response: BulkResponse = serde_json::from_value(body.clone())?;
    let mut report = BulkReport::default();
    for item in response.items {
        for (action, result) in item {
            let missing_delete = action == "delete" && result.status == 404;
            match result.error {
                Some(error) if !missing_delete => report.failures.push(BulkFailure {
                    id: result.id,
                    status: result.status,
                    reason: error
                        .get("reason")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .unwrap_or_else(|| error.to_string()),
                }),
                _ => report.succeeded += 1,
            }
        }
    }
    Ok(report)
}

/// Elasticsearch HTTP client.
#[derive(Debug, Clone)]
pub struct EsClient {
    client: Client,
    base_url: String,
}

impl EsClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(defaults::ES_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Client for `ES_URL`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("ES_URL").unwrap_or_else(|_| defaults::ES_URL.to_string());
        let timeout = std::env::var("ES_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::ES_TIMEOUT_SECS);
        Self::with_timeout(url, Duration::from_secs(timeout))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| Error::Search(format!("{} {} failed: {}", method, path, e)))
    }

    async fn check(response: Response, op: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Search(format!(
            "{} returned {}: {}",
            op, status, body
        )))
    }

    async fn json(response: Response, op: &str) -> Result<Value> {
        response
            .json()
            .await
            .map_err(|e| Error::Search(format!("{}: failed to parse response: {}", op, e)))
    }

    pub async fn create_index(&self, index: &str, settings: &Value) -> Result<()> {
        let response = self.send(Method::PUT, index, Some(settings)).await?;
        Self::check(response, "create index").await?;
        debug!(
            subsystem = "search",
            component = "client",
            op = "create_index",
            index = index,
            "Index created"
        );
        Ok(())
    }

    /// Delete an index; a missing index is not an error.
    pub async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self.send(Method::DELETE, index, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response, "delete index").await?;
        Ok(())
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.send(Method::HEAD, index, None).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(Error::Search(format!("index exists returned {}", s))),
        }
    }

    /// Indices the alias currently points to, sorted.
    pub async fn alias_targets(&self, alias: &str) -> Result<Vec<String>> {
        let response = self
            .send(Method::GET, &format!("_alias/{}", alias), None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = Self::check(response, "get alias").await?;
        let body = Self::json(response, "get alias").await?;
        let mut targets: Vec<String> = body
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        targets.sort();
        Ok(targets)
    }

    /// Point `alias` at `index` and away from `previous` in one atomic request.
    pub async fn switch_alias(&self, alias: &str, index: &str, previous: &[String]) -> Result<()> {
        let mut actions: Vec<Value> = previous
            .iter()
            .filter(|old| old.as_str() != index)
            .map(|old| json!({"remove": {"index": old, "alias": alias}}))
            .collect();
        actions.push(json!({"add": {"index": index, "alias": alias}}));

        let response = self
            .send(Method::POST, "_aliases", Some(&json!({ "actions": actions })))
            .await?;
        Self::check(response, "switch alias").await?;
        debug!(
            subsystem = "search",
            component = "client",
            op = "switch_alias",
            index = index,
            alias = alias,
            "Alias switched"
        );
        Ok(())
    }

    /// Send a `_bulk` request and report per-item failures.
    pub async fn bulk(&self, ops: &[BulkOp]) -> Result<BulkReport> {
        if ops.is_empty() {
            return Ok(BulkReport::default());
        }
        let start = Instant::now();
        let mut body = String::new();
        for op in ops {
            op.write_ndjson(&mut body)?;
        }

        let response = self
            .client
            .post(self.url("_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Search(format!("POST _bulk failed: {}", e)))?;
        let response = Self::check(response, "bulk").await?;
        let report = parse_bulk_response(&Self::json(response, "bulk").await?)?;

        if !report.is_success() {
            warn!(
                subsystem = "search",
                component = "client",
                op = "bulk",
                batch_size = ops.len(),
                failed = report.failures.len(),
                "Bulk request had failures"
            );
        }
        debug!(
            subsystem = "search",
            component = "client",
            op = "bulk",
            batch_size = ops.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Bulk request complete"
        );
        Ok(report)
    }

    pub async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let response = self
            .send(Method::POST, &format!("{}/_search", index), Some(body))
            .await?;
        let response = Self::check(response, "search").await?;
        Self::json(response, "search").await
    }

    /// Delete one document; a missing document is not an error.
    pub async fn delete_document(&self, index: &str, id: &str) -> Result<()> {
        let response = self
            .send(Method::DELETE, &format!("{}/{}/{}", index, DOC_TYPE, id), None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response, "delete document").await?;
        Ok(())
    }

    pub async fn refresh(&self, index: &str) -> Result<()> {
        let response = self
            .send(Method::POST, &format!("{}/_refresh", index), None)
            .await?;
        Self::check(response, "refresh").await?;
        Ok(())
    }
}
