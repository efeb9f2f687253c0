//! Lifting of embargoes whose end date has passed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use biblio_core::{defaults, Record, RecordRepository, Result};

use crate::hub::TaskHubHandle;
use crate::task::{Task, TaskContext};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbargoSweepReport {
    pub scanned: usize,
    pub lifted: usize,
    /// Records that changed between load and save; picked up next sweep.
    pub conflicts: usize,
}

/// Pages through every current record of one kind and lifts due embargoes.
pub struct EmbargoSweepTask<T: Record> {
    repository: Arc<dyn RecordRepository<T>>,
    today: Option<NaiveDate>,
    page_size: i64,
}

impl<T: Record> EmbargoSweepTask<T> {
    pub fn new(repository: Arc<dyn RecordRepository<T>>) -> Self {
        Self {
            repository,
            today: None,
            page_size: defaults::REPOSITORY_PAGE_SIZE,
        }
    }

    /// Sweep as of a fixed date instead of today.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[instrument(skip(self, progress), fields(subsystem = "tasks", component = "embargo", record_kind = T::KIND.as_str()))]
    pub async fn sweep<F>(&self, progress: F) -> Result<EmbargoSweepReport>
    where
        F: Fn(u64, u64) + Send + Sync,
    {
        let start = Instant::now();
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let total = self.repository.count().await?.max(0) as u64;
        let mut report = EmbargoSweepReport::default();
        let mut after: Option<Uuid> = None;
        progress(0, total);

        loop {
            let page = self.repository.page(after, self.page_size).await?;
            let Some(last) = page.last() else { break };
            after = Some(last.id());

            for record in page {
                report.scanned += 1;
                let Some(snapshot_id) = record.snapshot_id() else {
                    continue;
                };
                let id = record.id();
                let mut lifted = record;
                if !lifted.lift_embargoes(today) {
                    continue;
                }
                match self.repository.update(snapshot_id, lifted, None).await {
                    Ok(_) => {
                        debug!(record_id = %id, "Embargo lifted");
                        report.lifted += 1;
                    }
                    Err(e) if e.is_conflict() => {
                        warn!(record_id = %id, "Record changed during embargo sweep, skipped");
                        report.conflicts += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            let done = report.scanned as u64;
            progress(done, total.max(done));
        }

        info!(
            scanned = report.scanned,
            lifted = report.lifted,
            conflicts = report.conflicts,
            %today,
            duration_ms = start.elapsed().as_millis() as u64,
            "Embargo sweep complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl<T: Record> Task for EmbargoSweepTask<T> {
    fn name(&self) -> &str {
        match T::KIND {
            biblio_core::RecordKind::Dataset => "embargo_sweep_datasets",
            biblio_core::RecordKind::Publication => "embargo_sweep_publications",
        }
    }

    async fn run(&self, ctx: TaskContext) -> Result<()> {
        self.sweep(|done, total| ctx.report_progress(done, total))
            .await
            .map(|_| ())
    }
}

/// Submit the tasks built by `make` to the hub every `interval`, the first
/// time after one full interval.
pub fn spawn_periodic<F>(hub: TaskHubHandle, interval: Duration, make: F) -> JoinHandle<()>
where
    F: Fn() -> Vec<Arc<dyn Task>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for task in make() {
                let name = task.name().to_string();
                match hub.add_arc(task).await {
                    Ok(id) => debug!(
                        subsystem = "tasks",
                        component = "scheduler",
                        task_id = %id,
                        task = %name,
                        "Scheduled task submitted"
                    ),
                    Err(e) => {
                        info!(
                            subsystem = "tasks",
                            component = "scheduler",
                            error = %e,
                            "Task hub gone, scheduler stopping"
                        );
                        return;
                    }
                }
            }
        }
    })
}
