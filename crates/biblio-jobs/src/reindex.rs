//! Search index rebuild as a background task.

use async_trait::async_trait;
use tracing::warn;

use biblio_core::Result;
use biblio_search::{Indexable, Reindexer};

use crate::task::{Task, TaskContext};

/// Runs a [`Reindexer`] under the task hub.
pub struct ReindexTask<T: Indexable> {
    reindexer: Reindexer<T>,
}

impl<T: Indexable> ReindexTask<T> {
    pub fn new(reindexer: Reindexer<T>) -> Self {
        Self { reindexer }
    }
}

#[async_trait]
impl<T: Indexable> Task for ReindexTask<T> {
    fn name(&self) -> &str {
        match T::KIND {
            biblio_core::RecordKind::Dataset => "reindex_datasets",
            biblio_core::RecordKind::Publication => "reindex_publications",
        }
    }

    async fn run(&self, ctx: TaskContext) -> Result<()> {
        let report = self
            .reindexer
            .run(|p| ctx.report_progress(p.done, p.total))
            .await?;
        if !report.failures.is_empty() {
            warn!(
                subsystem = "tasks",
                component = "reindex",
                task_id = %ctx.id,
                index = %report.index,
                failed = report.failures.len(),
                "Reindex finished with rejected documents"
            );
        }
        Ok(())
    }
}
