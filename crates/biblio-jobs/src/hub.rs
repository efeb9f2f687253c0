//! Task hub: one coordinator owning every task status, driven by a single
//! command channel, with work running on a bounded worker pool.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use biblio_core::{defaults, Error, Result};

use crate::task::{Task, TaskContext, TaskInfo, TaskStatus};

/// Configuration for the task hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of tasks running at once.
    pub workers: usize,
    /// How long finished statuses stay queryable.
    pub retention: Duration,
    /// How often finished statuses are swept.
    pub cleanup_interval: Duration,
    pub command_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            workers: defaults::TASK_WORKERS,
            retention: Duration::from_secs(defaults::TASK_RETENTION_SECS),
            cleanup_interval: Duration::from_secs(defaults::TASK_CLEANUP_INTERVAL_SECS),
            command_capacity: defaults::TASK_COMMAND_CAPACITY,
        }
    }
}

impl HubConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TASK_WORKERS` | `4` | Max concurrent tasks |
    /// | `TASK_RETENTION_SECS` | `3600` | Lifetime of finished statuses |
    pub fn from_env() -> Self {
        let workers = std::env::var("TASK_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::TASK_WORKERS)
            .max(1);

        let retention_secs = std::env::var("TASK_RETENTION_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::TASK_RETENTION_SECS);

        Self {
            workers,
            retention: Duration::from_secs(retention_secs),
            ..Self::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

enum Command {
    Add {
        task: Arc<dyn Task>,
        submitted_by: Option<String>,
        reply: oneshot::Sender<Uuid>,
    },
    Status {
        id: Uuid,
        reply: oneshot::Sender<Option<TaskInfo>>,
    },
    Started {
        id: Uuid,
    },
    Progress {
        id: Uuid,
        done: u64,
        total: u64,
    },
    Finished {
        id: Uuid,
        result: std::result::Result<(), String>,
        duration_ms: u64,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

fn hub_stopped() -> Error {
    Error::Task("task hub is not running".into())
}

/// Handle for submitting and querying tasks. Cheap to clone.
#[derive(Clone)]
pub struct TaskHubHandle {
    tx: mpsc::Sender<Command>,
}

impl TaskHubHandle {
    /// Queue a task and return its id.
    pub async fn add<T: Task>(&self, task: T) -> Result<Uuid> {
        self.add_arc(Arc::new(task)).await
    }

    pub async fn add_arc(&self, task: Arc<dyn Task>) -> Result<Uuid> {
        self.submit(task, None).await
    }

    /// Queue a task on behalf of a user, recorded as its `submitted_by`.
    pub async fn submit(&self, task: Arc<dyn Task>, submitted_by: Option<String>) -> Result<Uuid> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Add {
                task,
                submitted_by,
                reply,
            })
            .await
            .map_err(|_| hub_stopped())?;
        rx.await.map_err(|_| hub_stopped())
    }

    /// Status of a task, `None` once unknown or cleaned up.
    pub async fn status(&self, id: Uuid) -> Result<Option<TaskInfo>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Status { id, reply })
            .await
            .map_err(|_| hub_stopped())?;
        rx.await.map_err(|_| hub_stopped())
    }

    /// Poll until the task finishes or `timeout` elapses.
    pub async fn wait(&self, id: Uuid, timeout: Duration) -> Result<TaskInfo> {
        let poll = async {
            loop {
                match self.status(id).await? {
                    Some(info) if info.status.is_finished() => return Ok(info),
                    Some(_) => tokio::time::sleep(Duration::from_millis(10)).await,
                    None => return Err(Error::NotFound(format!("task {}", id))),
                }
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| Error::Task(format!("timed out waiting for task {}", id)))?
    }

    /// Stop the hub, aborting running tasks.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| hub_stopped())?;
        rx.await.map_err(|_| hub_stopped())
    }
}

/// The coordinator. Only reachable through a [`TaskHubHandle`].
pub struct TaskHub {
    config: HubConfig,
    tasks: HashMap<Uuid, TaskInfo>,
    semaphore: Arc<Semaphore>,
    commands: mpsc::WeakSender<Command>,
}

impl TaskHub {
    /// Spawn the coordinator and return a handle to it.
    pub fn start(config: HubConfig) -> (TaskHubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let hub = TaskHub {
            semaphore: Arc::new(Semaphore::new(config.workers.max(1))),
            tasks: HashMap::new(),
            commands: tx.downgrade(),
            config,
        };
        let handle = tokio::spawn(hub.run(rx));
        (TaskHubHandle { tx }, handle)
    }

    #[instrument(skip_all, fields(subsystem = "tasks", component = "hub"))]
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!(workers = self.config.workers, "Task hub started");

        let mut running = JoinSet::new();
        let mut cleanup = tokio::time::interval(self.config.cleanup_interval);
        cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.semaphore.close();
                        running.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command, &mut running),
                    None => break,
                },
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            error!(error = %e, "Task worker terminated abnormally");
                        }
                    }
                }
                _ = cleanup.tick() => self.cleanup(),
            }
        }

        info!(tracked = self.tasks.len(), "Task hub stopped");
    }

    fn handle(&mut self, command: Command, running: &mut JoinSet<()>) {
        match command {
            Command::Add {
                task,
                submitted_by,
                reply,
            } => {
                let id = Uuid::now_v7();
                let now = Utc::now();
                self.tasks.insert(
                    id,
                    TaskInfo {
                        id,
                        name: task.name().to_string(),
                        submitted_by,
                        status: TaskStatus::Waiting,
                        created_at: now,
                        updated_at: now,
                    },
                );
                match self.commands.upgrade() {
                    Some(tx) => {
                        running.spawn(execute(id, task, self.semaphore.clone(), tx));
                    }
                    None => self.set_status(
                        id,
                        TaskStatus::Failed {
                            error: "task hub is shutting down".into(),
                        },
                    ),
                }
                debug!(task_id = %id, "Task queued");
                let _ = reply.send(id);
            }
            Command::Status { id, reply } => {
                let _ = reply.send(self.tasks.get(&id).cloned());
            }
            Command::Started { id } => {
                self.set_status(id, TaskStatus::Running { done: 0, total: 0 });
            }
            Command::Progress { id, done, total } => {
                if matches!(
                    self.tasks.get(&id).map(|t| &t.status),
                    Some(TaskStatus::Running { .. })
                ) {
                    self.set_status(id, TaskStatus::Running { done, total });
                }
            }
            Command::Finished {
                id,
                result,
                duration_ms,
            } => {
                let name = self
                    .tasks
                    .get(&id)
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                match result {
                    Ok(()) => {
                        info!(task_id = %id, task = %name, duration_ms, "Task completed");
                        self.set_status(id, TaskStatus::Done);
                    }
                    Err(error) => {
                        warn!(task_id = %id, task = %name, duration_ms, error = %error, "Task failed");
                        self.set_status(id, TaskStatus::Failed { error });
                    }
                }
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn set_status(&mut self, id: Uuid, status: TaskStatus) {
        if let Some(info) = self.tasks.get_mut(&id) {
            info.status = status;
            info.updated_at = Utc::now();
        }
    }

    fn cleanup(&mut self) {
        let now = Utc::now();
        let retention = self.config.retention;
        let before = self.tasks.len();
        self.tasks.retain(|_, info| {
            let expired = (now - info.updated_at)
                .to_std()
                .map(|age| age >= retention)
                .unwrap_or(false);
            !(info.status.is_finished() && expired)
        });
        let removed = before - self.tasks.len();
        if removed > 0 {
            debug!(removed, remaining = self.tasks.len(), "Expired task statuses removed");
        }
    }
}

async fn execute(
    id: Uuid,
    task: Arc<dyn Task>,
    semaphore: Arc<Semaphore>,
    tx: mpsc::Sender<Command>,
) {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return;
    };
    let _ = tx.send(Command::Started { id }).await;

    let progress_tx = tx.clone();
    let ctx = TaskContext::new(id).with_progress_callback(move |done, total| {
        // Progress is lossy: a full channel drops the update.
        let _ = progress_tx.try_send(Command::Progress { id, done, total });
    });

    let start = Instant::now();
    let result = match AssertUnwindSafe(task.run(ctx)).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("task panicked".to_string()),
    };
    let _ = tx
        .send(Command::Finished {
            id,
            result,
            duration_ms: start.elapsed().as_millis() as u64,
        })
        .await;
}
