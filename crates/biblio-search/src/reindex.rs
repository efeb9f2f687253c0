//! Zero-downtime reindexing through versioned indices behind an alias.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use biblio_core::{defaults, ChangeCursor, RecordRepository, Result};

use crate::bulk::BulkIndexer;
use crate::client::{BulkFailure, BulkOp, EsClient};
use crate::docs::{DocumentBuilder, Indexable};
use crate::mapping::{index_settings, versioned_index_name};

/// Records indexed so far out of the repository total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexProgress {
    pub done: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexReport {
    /// The index the alias points to now.
    pub index: String,
    pub indexed: usize,
    pub failures: Vec<BulkFailure>,
    /// Previous indices that were deleted.
    pub removed: Vec<String>,
}

/// Create a first versioned index when `alias` does not point anywhere yet.
pub async fn ensure_alias(client: &EsClient, alias: &str) -> Result<()> {
    if !client.alias_targets(alias).await?.is_empty() {
        return Ok(());
    }
    let index = versioned_index_name(alias, Utc::now());
    client.create_index(&index, &index_settings()).await?;
    client.switch_alias(alias, &index, &[]).await?;
    info!(
        subsystem = "search",
        component = "reindex",
        op = "ensure_alias",
        index = %index,
        alias = alias,
        "Created initial index"
    );
    Ok(())
}

/// Rebuilds the index behind one alias from a record repository.
pub struct Reindexer<T: Indexable> {
    client: EsClient,
    alias: String,
    repository: Arc<dyn RecordRepository<T>>,
    documents: DocumentBuilder,
    batch_size: usize,
    page_size: i64,
}

impl<T: Indexable> Reindexer<T> {
    pub fn new(
        client: EsClient,
        alias: impl Into<String>,
        repository: Arc<dyn RecordRepository<T>>,
    ) -> Self {
        Self {
            client,
            alias: alias.into(),
            repository,
            documents: DocumentBuilder::new(),
            batch_size: defaults::INDEX_BATCH_SIZE,
            page_size: defaults::REPOSITORY_PAGE_SIZE,
        }
    }

    pub fn with_documents(mut self, documents: DocumentBuilder) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn index_op(&self, index: &str, record: &T) -> BulkOp {
        BulkOp::Index {
            index: index.to_string(),
            id: record.id().to_string(),
            doc: self.documents.build(record).await,
        }
    }

    async fn fill<F>(&self, index: &str, indexer: &mut BulkIndexer, progress: &F) -> Result<usize>
    where
        F: Fn(ReindexProgress) + Send + Sync,
    {
        let total = self.repository.count().await?.max(0) as u64;
        let mut done = 0u64;
        let mut after: Option<Uuid> = None;
        progress(ReindexProgress { done, total });

        loop {
            let page = self.repository.page(after, self.page_size).await?;
            let Some(last) = page.last() else { break };
            after = Some(last.id());
            for record in &page {
                let op = self.index_op(index, record).await;
                indexer.add(op).await?;
            }
            done += page.len() as u64;
            progress(ReindexProgress {
                done,
                total: total.max(done),
            });
        }
        Ok(done as usize)
    }

    /// Reindex records written while the new index was being filled.
    async fn catch_up(&self, since: DateTime<Utc>) -> Result<usize> {
        let mut indexer = BulkIndexer::new(self.client.clone(), self.batch_size);
        let mut cursor = ChangeCursor::since(since);
        let mut count = 0;
        loop {
            let batch = self.repository.updated_since(cursor, self.page_size).await?;
            for record in &batch {
                let op = self.index_op(&self.alias, record).await;
                indexer.add(op).await?;
            }
            count += batch.len();
            match batch.last().and_then(ChangeCursor::of) {
                Some(last) if batch.len() as i64 == self.page_size => cursor = last,
                _ => break,
            }
        }
        indexer.finish().await?;
        Ok(count)
    }

    /// Build a fresh index, switch the alias to it and drop the old ones.
    pub async fn run<F>(&self, progress: F) -> Result<ReindexReport>
    where
        F: Fn(ReindexProgress) + Send + Sync,
    {
        let start = Instant::now();
        let started_at = Utc::now();
        let index = versioned_index_name(&self.alias, started_at);

        info!(
            subsystem = "search",
            component = "reindex",
            op = "start",
            index = %index,
            alias = %self.alias,
            record_kind = T::KIND.as_str(),
            "Reindex started"
        );

        self.client.create_index(&index, &index_settings()).await?;
        let mut indexer = BulkIndexer::new(self.client.clone(), self.batch_size);

        let filled = match self.fill(&index, &mut indexer, &progress).await {
            Ok(n) => indexer.finish().await.map(|report| (n, report)),
            Err(e) => Err(e),
        };
        let (indexed, report) = match filled {
            Ok(v) => v,
            Err(e) => {
                if let Err(cleanup) = self.client.delete_index(&index).await {
                    warn!(
                        subsystem = "search",
                        component = "reindex",
                        index = %index,
                        error = %cleanup,
                        "Failed to remove incomplete index"
                    );
                }
                return Err(e);
            }
        };

        self.client.refresh(&index).await?;
        let previous = self.client.alias_targets(&self.alias).await?;
        self.client
            .switch_alias(&self.alias, &index, &previous)
            .await?;

        let mut removed = Vec::new();
        for old in previous.into_iter().filter(|old| *old != index) {
            self.client.delete_index(&old).await?;
            removed.push(old);
        }

        let caught_up = self.catch_up(started_at).await?;

        info!(
            subsystem = "search",
            component = "reindex",
            op = "complete",
            index = %index,
            record_kind = T::KIND.as_str(),
            result_count = indexed,
            failed = report.failures.len(),
            caught_up,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reindex complete"
        );

        Ok(ReindexReport {
            index,
            indexed,
            failures: report.failures,
            removed,
        })
    }
}
