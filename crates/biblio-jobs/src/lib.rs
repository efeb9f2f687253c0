//! # biblio-jobs
//!
//! Background work for Biblio.
//!
//! This crate provides:
//! - A task hub: one coordinator task owning every task status, fed by a
//!   command channel, running work on a bounded worker pool
//! - ORCID sync pushing a researcher's public publications to ORCID
//! - Embargo sweeps lifting embargoes that have run out, plus a periodic
//!   scheduler
//! - Search index rebuilds
//!
//! ## Example
//!
//! ```ignore
//! use biblio_jobs::{HubConfig, TaskHub, EmbargoSweepTask};
//!
//! let (hub, _join) = TaskHub::start(HubConfig::from_env());
//! let id = hub.add(EmbargoSweepTask::new(db.datasets.clone())).await?;
//! let status = hub.status(id).await?;
//! hub.shutdown().await?;
//! ```

pub mod embargo;
pub mod hub;
pub mod orcid;
pub mod reindex;
pub mod task;

pub use embargo::{spawn_periodic, EmbargoSweepReport, EmbargoSweepTask};
pub use hub::{HubConfig, TaskHub, TaskHubHandle};
pub use orcid::{
    publication_to_work, AddWorkOutcome, OrcidClient, OrcidSyncReport, OrcidSyncTask,
};
pub use reindex::ReindexTask;
pub use task::{ProgressCallback, Task, TaskContext, TaskInfo, TaskStatus};
