//! Asynchronous index queue fed by repository change notifications.
//!
//! Writers never wait on the search cluster: notifications go into a bounded
//! channel and a background task turns them into bulk requests, flushing when
//! a batch is full or the flush interval elapses.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use biblio_core::{defaults, ChangeListener, Dataset, Publication, RecordKind};

use crate::client::{BulkOp, EsClient, IndexNames};
use crate::docs::{DocumentBuilder, Indexable};

/// Queue sizing and flush behaviour.
#[derive(Debug, Clone)]
pub struct IndexQueueConfig {
    pub capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for IndexQueueConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::INDEX_QUEUE_CAPACITY,
            batch_size: defaults::INDEX_BATCH_SIZE,
            flush_interval: Duration::from_millis(defaults::INDEX_FLUSH_MS),
        }
    }
}

impl IndexQueueConfig {
    /// Load from `INDEX_BATCH_SIZE` and `INDEX_FLUSH_MS`.
    pub fn from_env() -> Self {
        let batch_size = std::env::var("INDEX_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::INDEX_BATCH_SIZE);
        let flush_ms = std::env::var("INDEX_FLUSH_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::INDEX_FLUSH_MS);
        Self {
            batch_size,
            flush_interval: Duration::from_millis(flush_ms),
            ..Self::default()
        }
    }
}

enum Message {
    Dataset(Box<Dataset>),
    Publication(Box<Publication>),
    Delete(RecordKind, Uuid),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the background indexing task. Cheap to clone.
#[derive(Clone)]
pub struct IndexQueue {
    tx: mpsc::Sender<Message>,
}

impl IndexQueue {
    /// Spawn the background task and return its handle.
    pub fn start(
        client: EsClient,
        names: IndexNames,
        documents: DocumentBuilder,
        config: IndexQueueConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let worker = QueueWorker {
            client,
            names,
            documents,
            batch_size: config.batch_size.max(1),
            pending: Vec::new(),
        };
        let handle = tokio::spawn(worker.run(rx, config.flush_interval));
        (Self { tx }, handle)
    }

    fn enqueue(&self, message: Message, id: Uuid) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => warn!(
                subsystem = "search",
                component = "index_queue",
                record_id = %id,
                "Index queue full, change dropped until next reindex"
            ),
            Err(mpsc::error::TrySendError::Closed(_)) => warn!(
                subsystem = "search",
                component = "index_queue",
                record_id = %id,
                "Index queue closed, change dropped"
            ),
        }
    }

    /// Flush outstanding changes and stop the background task.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Message::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl ChangeListener<Dataset> for IndexQueue {
    fn record_changed(&self, record: &Dataset) {
        self.enqueue(Message::Dataset(Box::new(record.clone())), record.common.id);
    }

    fn record_purged(&self, id: Uuid) {
        self.enqueue(Message::Delete(RecordKind::Dataset, id), id);
    }
}

impl ChangeListener<Publication> for IndexQueue {
    fn record_changed(&self, record: &Publication) {
        self.enqueue(
            Message::Publication(Box::new(record.clone())),
            record.common.id,
        );
    }

    fn record_purged(&self, id: Uuid) {
        self.enqueue(Message::Delete(RecordKind::Publication, id), id);
    }
}

struct QueueWorker {
    client: EsClient,
    names: IndexNames,
    documents: DocumentBuilder,
    batch_size: usize,
    pending: Vec<BulkOp>,
}

impl QueueWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<Message>, flush_interval: Duration) {
        info!(
            subsystem = "search",
            component = "index_queue",
            batch_size = self.batch_size,
            flush_ms = flush_interval.as_millis() as u64,
            "Index queue started"
        );
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(Message::Shutdown(ack)) => {
                        self.flush().await;
                        let _ = ack.send(());
                        break;
                    }
                    Some(message) => {
                        self.push(message).await;
                        if self.pending.len() >= self.batch_size {
                            self.flush().await;
                        }
                    }
                    None => {
                        self.flush().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.flush().await,
            }
        }
        info!(
            subsystem = "search",
            component = "index_queue",
            "Index queue stopped"
        );
    }

    async fn index_op<T: Indexable>(&self, record: &T) -> BulkOp {
        BulkOp::Index {
            index: self.names.alias(T::KIND).to_string(),
            id: record.id().to_string(),
            doc: self.documents.build(record).await,
        }
    }

    async fn push(&mut self, message: Message) {
        let op = match message {
            Message::Dataset(d) => self.index_op(d.as_ref()).await,
            Message::Publication(p) => self.index_op(p.as_ref()).await,
            Message::Delete(kind, id) => BulkOp::Delete {
                index: self.names.alias(kind).to_string(),
                id: id.to_string(),
            },
            Message::Shutdown(_) => return,
        };
        self.pending.push(op);
    }

    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let ops = std::mem::take(&mut self.pending);
        match self.client.bulk(&ops).await {
            Ok(report) => {
                for failure in &report.failures {
                    warn!(
                        subsystem = "search",
                        component = "index_queue",
                        record_id = %failure.id,
                        status = failure.status,
                        error = %failure.reason,
                        "Document rejected by index"
                    );
                }
                debug!(
                    subsystem = "search",
                    component = "index_queue",
                    batch_size = ops.len(),
                    succeeded = report.succeeded,
                    "Index queue flushed"
                );
            }
            Err(e) => error!(
                subsystem = "search",
                component = "index_queue",
                batch_size = ops.len(),
                error = %e,
                "Bulk request failed, batch dropped"
            ),
        }
    }
}
