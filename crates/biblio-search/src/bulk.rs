//! Buffered bulk indexing.

use crate::client::{BulkOp, BulkReport, EsClient};
use biblio_core::Result;

/// Collects index and delete operations and sends them in batches.
pub struct BulkIndexer {
    client: EsClient,
    batch_size: usize,
    buffer: Vec<BulkOp>,
    report: BulkReport,
}

impl BulkIndexer {
    pub fn new(client: EsClient, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            client,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            report: BulkReport::default(),
        }
    }

    /// Queue an operation, flushing when the batch is full.
    pub async fn add(&mut self, op: BulkOp) -> Result<()> {
        self.buffer.push(op);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Send everything buffered so far.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let ops = std::mem::take(&mut self.buffer);
        let report = self.client.bulk(&ops).await?;
        self.report.merge(report);
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Report so far, excluding operations still buffered.
    pub fn report(&self) -> &BulkReport {
        &self.report
    }

    /// Flush the remaining operations and return the combined report.
    pub async fn finish(mut self) -> Result<BulkReport> {
        self.flush().await?;
        Ok(self.report)
    }
}
