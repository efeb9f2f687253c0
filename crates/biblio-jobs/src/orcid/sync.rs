//! Pushes a researcher's public publications to their ORCID record.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use biblio_core::{
    defaults, Error, OrcidWork, PersonService, Publication, RecordKind, RecordRepository,
    RecordSearcher, Result, SearchArgs, SearchScope, Status, User,
};

use super::client::{AddWorkOutcome, OrcidClient};
use super::work::publication_to_work;
use crate::task::{Task, TaskContext};

/// Attempts made to store a put-code on a publication that keeps changing.
pub const PUT_CODE_RETRIES: usize = 3;

/// Counts from one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrcidSyncReport {
    pub added: usize,
    /// Already on the ORCID record according to ORCID itself.
    pub duplicates: usize,
    /// Already carrying a put-code, gone, or no longer public.
    pub skipped: usize,
    /// Put-code could not be saved because the record kept changing.
    pub conflicts: usize,
    pub failed: usize,
}

/// Adds every public publication crediting a person to their ORCID record.
pub struct OrcidSyncTask {
    person_id: String,
    people: Arc<dyn PersonService>,
    publications: Arc<dyn RecordRepository<Publication>>,
    searcher: Arc<dyn RecordSearcher>,
    client: OrcidClient,
    frontoffice_url: Option<String>,
    user: Option<User>,
    page_size: usize,
}

impl OrcidSyncTask {
    pub fn new(
        person_id: impl Into<String>,
        people: Arc<dyn PersonService>,
        publications: Arc<dyn RecordRepository<Publication>>,
        searcher: Arc<dyn RecordSearcher>,
        client: OrcidClient,
    ) -> Self {
        Self {
            person_id: person_id.into(),
            people,
            publications,
            searcher,
            client,
            frontoffice_url: None,
            user: None,
            page_size: defaults::MAX_PAGE_SIZE,
        }
    }

    /// Public base URL the works link back to.
    pub fn with_frontoffice_url(mut self, url: impl Into<String>) -> Self {
        self.frontoffice_url = Some(url.into());
        self
    }

    /// User recorded as the author of the put-code updates.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Ids of every public publication crediting the person.
    async fn publication_ids(&self) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        let mut page = 1;
        loop {
            let args = SearchArgs::new()
                .with_filter("person_id", self.person_id.clone())
                .with_page(page, self.page_size);
            let hits = self
                .searcher
                .search(RecordKind::Publication, &args, &SearchScope::Public)
                .await?;
            let last_page = hits.ids.is_empty() || !hits.has_next_page();
            ids.extend(hits.ids);
            if last_page {
                break;
            }
            page += 1;
        }
        Ok(ids)
    }

    /// Run the sync, reporting `(done, total)` after each publication.
    #[instrument(skip(self, progress), fields(subsystem = "orcid", component = "sync", person_id = %self.person_id))]
    pub async fn sync<F>(&self, progress: F) -> Result<OrcidSyncReport>
    where
        F: Fn(u64, u64) + Send + Sync,
    {
        let start = Instant::now();
        let person = self
            .people
            .get_person(&self.person_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("person {}", self.person_id)))?;
        let (Some(orcid), Some(token)) = (person.orcid.as_deref(), person.orcid_token.as_deref())
        else {
            return Err(Error::InvalidInput(format!(
                "person {} has no ORCID token",
                person.id
            )));
        };

        let ids = self.publication_ids().await?;
        let total = ids.len() as u64;
        let mut report = OrcidSyncReport::default();
        progress(0, total);

        for (i, id) in ids.into_iter().enumerate() {
            self.sync_one(id, orcid, token, &mut report).await;
            progress(i as u64 + 1, total);
        }

        if report.failed > 0 && report.added + report.duplicates == 0 {
            return Err(Error::Request(format!(
                "ORCID rejected all {} works for {}",
                report.failed, orcid
            )));
        }

        info!(
            orcid = orcid,
            added = report.added,
            duplicates = report.duplicates,
            skipped = report.skipped,
            conflicts = report.conflicts,
            failed = report.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "ORCID sync complete"
        );
        Ok(report)
    }

    async fn sync_one(&self, id: Uuid, orcid: &str, token: &str, report: &mut OrcidSyncReport) {
        let publication = match self.publications.get(id).await {
            Ok(Some(p)) if p.common.status == Status::Public => p,
            Ok(_) => {
                report.skipped += 1;
                return;
            }
            Err(e) => {
                warn!(record_id = %id, error = %e, "Failed to load publication");
                report.failed += 1;
                return;
            }
        };
        if publication.orcid_put_code(orcid).is_some() {
            debug!(record_id = %id, "Publication already on ORCID record");
            report.skipped += 1;
            return;
        }

        let work = publication_to_work(&publication, self.frontoffice_url.as_deref());
        let put_code = match self.client.add_work(orcid, token, &work).await {
            Ok(AddWorkOutcome::Added { put_code }) => put_code,
            Ok(AddWorkOutcome::Duplicate) => {
                report.duplicates += 1;
                return;
            }
            Err(e) => {
                warn!(record_id = %id, error = %e, "Failed to add work to ORCID");
                report.failed += 1;
                return;
            }
        };
        report.added += 1;

        if let Err(e) = self.save_put_code(id, orcid, put_code).await {
            if e.is_conflict() {
                warn!(record_id = %id, put_code, "Publication kept changing, put-code not saved");
                report.conflicts += 1;
            } else {
                warn!(record_id = %id, put_code, error = %e, "Failed to save ORCID put-code");
                report.failed += 1;
            }
        }
    }

    /// Record the put-code on the current version, reloading when another
    /// writer got there first.
    async fn save_put_code(&self, id: Uuid, orcid: &str, put_code: i64) -> Result<()> {
        let mut attempt = 1;
        loop {
            let mut publication = self
                .publications
                .get(id)
                .await?
                .ok_or(Error::RecordNotFound(id))?;
            if publication.orcid_put_code(orcid).is_some() {
                return Ok(());
            }
            let snapshot_id = publication.common.snapshot_id.unwrap_or_default();
            publication.orcid_works.push(OrcidWork {
                orcid: orcid.to_string(),
                put_code,
            });
            match self
                .publications
                .update(snapshot_id, publication, self.user.as_ref())
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) if e.is_conflict() && attempt < PUT_CODE_RETRIES => {
                    debug!(record_id = %id, attempt, "Put-code save conflicted, reloading");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Task for OrcidSyncTask {
    fn name(&self) -> &str {
        "orcid_sync"
    }

    async fn run(&self, ctx: TaskContext) -> Result<()> {
        self.sync(|done, total| ctx.report_progress(done, total))
            .await
            .map(|_| ())
    }
}
