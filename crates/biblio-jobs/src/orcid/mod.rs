//! ORCID integration: member API client, work mapping and the sync task.

pub mod client;
pub mod sync;
pub mod work;

pub use client::{AddWorkOutcome, OrcidClient};
pub use sync::{OrcidSyncReport, OrcidSyncTask};
pub use work::{publication_to_work, work_type};
