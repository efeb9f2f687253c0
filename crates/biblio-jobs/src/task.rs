//! The unit of background work and the state the hub tracks for it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use biblio_core::Result;

/// Progress callback type for tasks: `(done, total)`.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Context handed to a running task.
pub struct TaskContext {
    /// Id the hub assigned to the task.
    pub id: Uuid,
    progress_callback: Option<ProgressCallback>,
}

impl TaskContext {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Report how many of `total` items are done.
    pub fn report_progress(&self, done: u64, total: u64) {
        if let Some(ref callback) = self.progress_callback {
            callback(done, total);
        }
    }
}

/// Background work the hub can run.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Short name shown in task status, e.g. `orcid_sync`.
    fn name(&self) -> &str;

    async fn run(&self, ctx: TaskContext) -> Result<()>;
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    Waiting,
    Running { done: u64, total: u64 },
    Done,
    Failed { error: String },
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed { .. })
    }
}

/// What `status(id)` reports about a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub id: Uuid,
    pub name: String,
    /// User who started the task; `None` for scheduled work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_progress_callback_receives_counts() {
        let seen = Arc::new(AtomicU64::new(0));
        let sink = seen.clone();
        let ctx = TaskContext::new(Uuid::now_v7())
            .with_progress_callback(move |done, _| sink.store(done, Ordering::SeqCst));
        ctx.report_progress(7, 10);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_context_without_callback_ignores_progress() {
        TaskContext::new(Uuid::now_v7()).report_progress(1, 1);
    }

    #[test]
    fn test_status_serialization() {
        let running = serde_json::to_value(TaskStatus::Running { done: 1, total: 4 }).unwrap();
        assert_eq!(running["state"], "running");
        assert_eq!(running["total"], 4);
        let failed = serde_json::to_value(TaskStatus::Failed {
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(failed["error"], "boom");
        assert!(TaskStatus::Done.is_finished());
        assert!(!TaskStatus::Waiting.is_finished());
    }
}
