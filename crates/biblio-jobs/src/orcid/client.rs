//! ORCID member API v3 client.

use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use biblio_core::{defaults, Error, Result};

const ORCID_JSON: &str = "application/vnd.orcid+json";

/// Result of pushing one work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddWorkOutcome {
    /// Stored under this put-code.
    Added { put_code: i64 },
    /// ORCID already holds a work with the same external ids.
    Duplicate,
}

/// HTTP client for the ORCID member API.
#[derive(Debug, Clone)]
pub struct OrcidClient {
    client: Client,
    base_url: String,
}

impl OrcidClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(defaults::ORCID_TIMEOUT_SECS))
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

    /// Client for `ORCID_URL`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("ORCID_URL").unwrap_or_else(|_| defaults::ORCID_URL.to_string());
        Self::new(url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Add a work to the researcher's record.
    pub async fn add_work(&self, orcid: &str, token: &str, work: &Value) -> Result<AddWorkOutcome> {
        let start = Instant::now();
        let url = format!("{}/v3.0/{}/work", self.base_url, orcid);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, ORCID_JSON)
            .header(ACCEPT, ORCID_JSON)
            .body(serde_json::to_vec(work)?)
            .send()
            .await
            .map_err(|e| Error::Request(format!("ORCID add work failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            debug!(
                subsystem = "orcid",
                component = "client",
                op = "add_work",
                orcid = orcid,
                duration_ms = start.elapsed().as_millis() as u64,
                "Work already on ORCID record"
            );
            return Ok(AddWorkOutcome::Duplicate);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                subsystem = "orcid",
                component = "client",
                op = "add_work",
                orcid = orcid,
                status = status.as_u16(),
                "ORCID rejected work"
            );
            return Err(Error::Request(format!("ORCID returned {}: {}", status, body)));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let put_code = parse_put_code(location).ok_or_else(|| {
            Error::Request(format!("ORCID response without put-code: '{}'", location))
        })?;

        debug!(
            subsystem = "orcid",
            component = "client",
            op = "add_work",
            orcid = orcid,
            put_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "Work added"
        );
        Ok(AddWorkOutcome::Added { put_code })
    }
}

/// The put-code is the last path segment of the `Location` header.
fn parse_put_code(location: &str) -> Option<i64> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
}
