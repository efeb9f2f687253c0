//! [`RecordSearcher`] backed by Elasticsearch.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument};

use biblio_core::{RecordKind, RecordSearcher, Result, SearchArgs, SearchHits, SearchScope};

use crate::client::{EsClient, IndexNames};
use crate::query::{build_search, parse_search};

pub struct EsSearcher {
    client: EsClient,
    names: IndexNames,
}

impl EsSearcher {
    pub fn new(client: EsClient, names: IndexNames) -> Self {
        Self { client, names }
    }
}

#[async_trait]
impl RecordSearcher for EsSearcher {
    #[instrument(skip(self, args, scope), fields(subsystem = "search", component = "searcher", op = "search", record_kind = %kind))]
    async fn search(
        &self,
        kind: RecordKind,
        args: &SearchArgs,
        scope: &SearchScope,
    ) -> Result<SearchHits> {
        let start = Instant::now();
        let body = build_search(kind, args, scope)?;
        let response = self.client.search(self.names.alias(kind), &body).await?;
        let hits = parse_search(args, &response)?;

        debug!(
            result_count = hits.ids.len(),
            total = hits.total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(hits)
    }
}
