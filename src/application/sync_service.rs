//! Batched transfer of changed documents into a notebook.
//!
//! A run queries the source, resolves the live upload surface, filters the
//! candidates through the ledger and then delivers them batch by batch,
//! committing each delivered batch to the ledger before moving on.

use chrono::{DateTime, Utc};

use crate::domain::{
    DeliveryAdapter, DeliveryFile, Document, LedgerStore, Project, Result, RunRecord, RunStatus,
    SourceRepository, StatusReporter, SyncConfig, SyncLedger, TargetLocator, TargetSurface,
};

use super::change_detector::needs_sync;

/// Terminal state of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The source returned no candidates for the project filters.
    NothingFound { project: String },
    /// The source could not be queried.
    SourceUnavailable { reason: String },
    /// The upload surface is absent or not in the expected state.
    TargetNotReady { reason: String },
    /// Every candidate is already delivered to the destination.
    UpToDate {
        destination_id: String,
        candidates: usize,
    },
    /// Dry run: the documents a real run would transfer.
    Planned {
        destination_id: String,
        documents: Vec<Document>,
    },
    /// All batches went through.
    Completed {
        destination_id: String,
        delivered: usize,
        dropped: usize,
    },
    /// A batch was rejected; earlier batches stay committed.
    Failed {
        destination_id: String,
        delivered: usize,
        batch: usize,
        batches: usize,
        reason: String,
    },
}

impl SyncOutcome {
    /// Whether the run ended without an error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            Self::NothingFound { .. }
                | Self::UpToDate { .. }
                | Self::Planned { .. }
                | Self::Completed { .. }
        )
    }

    #[must_use]
    pub const fn status(&self) -> RunStatus {
        if self.is_success() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        }
    }

    /// Documents delivered and committed during the run.
    #[must_use]
    pub const fn delivered(&self) -> usize {
        match self {
            Self::Completed { delivered, .. } | Self::Failed { delivered, .. } => *delivered,
            _ => 0,
        }
    }

    /// Destination the run resolved, if it got that far.
    #[must_use]
    pub fn destination_id(&self) -> Option<&str> {
        match self {
            Self::UpToDate { destination_id, .. }
            | Self::Planned { destination_id, .. }
            | Self::Completed { destination_id, .. }
            | Self::Failed { destination_id, .. } => Some(destination_id),
            _ => None,
        }
    }

    /// The user-facing terminal message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NothingFound { project } => {
                format!("No items found for project \"{project}\".")
            }
            Self::SourceUnavailable { reason } => {
                format!("Error: could not list items, is the reference manager running? ({reason})")
            }
            Self::TargetNotReady { reason } => {
                format!("Error: target not ready, open the notebook first. ({reason})")
            }
            Self::UpToDate { candidates, .. } => {
                format!("Everything is up to date ({candidates} items checked).")
            }
            Self::Planned { documents, .. } => {
                format!("Dry run: {} items would be uploaded.", documents.len())
            }
            Self::Completed {
                delivered, dropped, ..
            } => {
                if *dropped == 0 {
                    format!("Sync complete! Uploaded {delivered} items.")
                } else {
                    format!(
                        "Sync complete! Uploaded {delivered} items, {dropped} could not be read and will be retried next run."
                    )
                }
            }
            Self::Failed {
                delivered,
                batch,
                batches,
                reason,
                ..
            } => format!(
                "Error: batch {batch}/{batches} failed: {reason}. {delivered} items were uploaded before stopping; run sync again to retry the rest."
            ),
        }
    }
}

/// Split documents into ordered batches of at most `batch_size`.
#[must_use]
pub fn partition(documents: &[Document], batch_size: usize) -> Vec<&[Document]> {
    documents.chunks(batch_size.max(1)).collect()
}

/// History row for a run that started at `started_at`.
///
/// A run that ended in an error has no outcome to read the count from, so the
/// batches it committed are counted from the persisted ledger instead.
#[must_use]
pub fn run_record(
    project: &str,
    started_at: DateTime<Utc>,
    result: &Result<SyncOutcome>,
    ledger: &dyn LedgerStore,
) -> RunRecord {
    match result {
        Ok(outcome) => RunRecord {
            project: project.to_string(),
            destination_id: outcome.destination_id().map(String::from),
            started_at,
            finished_at: Utc::now(),
            status: outcome.status(),
            delivered: outcome.delivered(),
            message: outcome.message(),
        },
        Err(err) => {
            let ledger = ledger.load_ledger().unwrap_or_default();
            let committed = ledger.committed_since(started_at);

            RunRecord {
                project: project.to_string(),
                destination_id: committed.map(|(dest, _)| dest.to_string()),
                started_at,
                finished_at: Utc::now(),
                status: RunStatus::Failed,
                delivered: committed.map_or(0, |(_, count)| count),
                message: err.to_string(),
            }
        }
    }
}

/// Everything a transfer needs once change detection is done.
struct Prepared {
    surface: TargetSurface,
    destination_id: String,
    ledger: SyncLedger,
    needed: Vec<Document>,
}

/// Service driving one sync run at a time.
///
/// Runs against the same destination must not overlap; the caller holds the
/// run lock.
pub struct SyncService<'a> {
    source: &'a dyn SourceRepository,
    locator: &'a dyn TargetLocator,
    delivery: &'a dyn DeliveryAdapter,
    ledger: &'a dyn LedgerStore,
    status: &'a dyn StatusReporter,
    config: SyncConfig,
}

impl<'a> SyncService<'a> {
    /// Create a new sync service over the given capabilities.
    #[must_use]
    pub fn new(
        source: &'a dyn SourceRepository,
        locator: &'a dyn TargetLocator,
        delivery: &'a dyn DeliveryAdapter,
        ledger: &'a dyn LedgerStore,
        status: &'a dyn StatusReporter,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            locator,
            delivery,
            ledger,
            status,
            config,
        }
    }

    /// Sync a project into the currently open notebook.
    ///
    /// Reports exactly one terminal status message.
    ///
    /// # Errors
    /// Returns error if the ledger cannot be loaded or saved.
    pub async fn run(&self, project: &Project) -> Result<SyncOutcome> {
        let result = self.execute(project, false).await;
        self.finish(result)
    }

    /// Like [`run`](Self::run) but stops after change detection.
    ///
    /// # Errors
    /// Returns error if the ledger cannot be loaded.
    pub async fn plan(&self, project: &Project) -> Result<SyncOutcome> {
        let result = self.execute(project, true).await;
        self.finish(result)
    }

    fn finish(&self, result: Result<SyncOutcome>) -> Result<SyncOutcome> {
        match &result {
            Ok(outcome) => {
                tracing::info!(
                    status = outcome.status().as_str(),
                    delivered = outcome.delivered(),
                    "Sync run finished"
                );
                self.status.report(&outcome.message());
            }
            Err(err) => {
                tracing::error!(error = %err, "Sync run aborted");
                self.status.report(&format!("Error: {err}"));
            }
        }
        result
    }

    async fn execute(&self, project: &Project, dry_run: bool) -> Result<SyncOutcome> {
        self.config.validate()?;

        let prepared = match self.prepare(project).await? {
            Ok(prepared) => prepared,
            Err(outcome) => return Ok(outcome),
        };

        if dry_run {
            return Ok(SyncOutcome::Planned {
                destination_id: prepared.destination_id,
                documents: prepared.needed,
            });
        }

        self.transfer(prepared).await
    }

    /// Steps up to change detection. The inner `Err` is an early terminal outcome.
    async fn prepare(
        &self,
        project: &Project,
    ) -> Result<std::result::Result<Prepared, SyncOutcome>> {
        self.status.report("Getting list from the reference manager...");

        let candidates = match self.source.query(&project.query()).await {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(error = %err, "Candidate query failed");
                return Ok(Err(SyncOutcome::SourceUnavailable {
                    reason: err.to_string(),
                }));
            }
        };

        if candidates.is_empty() {
            return Ok(Err(SyncOutcome::NothingFound {
                project: project.name.clone(),
            }));
        }

        let surface = match self.locator.locate().await {
            Ok(surface) => surface,
            Err(err) => {
                return Ok(Err(SyncOutcome::TargetNotReady {
                    reason: err.to_string(),
                }));
            }
        };

        let destination_id = surface.destination_id();
        tracing::info!(
            destination = %destination_id,
            candidates = candidates.len(),
            "Resolved destination"
        );

        let ledger = self.ledger.load_ledger()?;
        let needed = needs_sync(&destination_id, &candidates, &ledger);

        if needed.is_empty() {
            return Ok(Err(SyncOutcome::UpToDate {
                destination_id,
                candidates: candidates.len(),
            }));
        }

        self.status.report(&format!(
            "Found {} items, {} need uploading.",
            candidates.len(),
            needed.len()
        ));

        Ok(Ok(Prepared {
            surface,
            destination_id,
            ledger,
            needed,
        }))
    }

    async fn transfer(&self, prepared: Prepared) -> Result<SyncOutcome> {
        let Prepared {
            surface,
            destination_id,
            mut ledger,
            needed,
        } = prepared;

        let batches = partition(&needed, self.config.batch_size);
        let total = batches.len();
        let mut delivered = 0;
        let mut dropped = 0;

        for (index, batch) in batches.into_iter().enumerate() {
            let number = index + 1;
            let (files, ready) = self.fetch_batch(batch).await;
            dropped += batch.len() - ready.len();

            if files.is_empty() {
                tracing::warn!(batch = number, "No readable files in batch, skipping");
                continue;
            }

            self.status.report(&format!(
                "Uploading batch {number}/{total} ({} files)...",
                files.len()
            ));

            if let Err(err) = self.delivery.deliver(&surface, &files).await {
                tracing::error!(batch = number, error = %err, "Batch delivery failed");
                return Ok(SyncOutcome::Failed {
                    destination_id,
                    delivered,
                    batch: number,
                    batches: total,
                    reason: err.to_string(),
                });
            }

            ledger.commit_batch(&destination_id, ready.iter().copied(), Utc::now());
            self.ledger.save_ledger(&ledger)?;
            delivered += ready.len();

            tracing::info!(batch = number, files = ready.len(), "Batch committed");

            if number < total {
                let pause = self.config.pacing();
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
        }

        Ok(SyncOutcome::Completed {
            destination_id,
            delivered,
            dropped,
        })
    }

    /// Fetch content for a batch. Unreadable documents are dropped, not fatal.
    async fn fetch_batch<'b>(
        &self,
        batch: &'b [Document],
    ) -> (Vec<DeliveryFile>, Vec<&'b Document>) {
        let mut files = Vec::with_capacity(batch.len());
        let mut ready = Vec::with_capacity(batch.len());

        for doc in batch {
            self.status
                .report(&format!("Processing: {}...", doc.display_name()));

            match self.source.fetch(&doc.id).await {
                Ok(fetched) => {
                    if let Some(reported) = fetched.mime_type.as_deref() {
                        if reported != doc.mime_type.as_str() {
                            tracing::debug!(
                                id = %doc.id,
                                listed = %doc.mime_type,
                                reported,
                                "Source reported a different mime type, keeping listed one"
                            );
                        }
                    }

                    files.push(DeliveryFile {
                        filename: doc.filename.clone(),
                        mime_type: doc.mime_type,
                        bytes: fetched.bytes,
                    });
                    ready.push(doc);
                }
                Err(err) => {
                    tracing::warn!(id = %doc.id, error = %err, "Fetch failed, dropping from batch");
                    self.status
                        .report(&format!("Skipping {}: {err}", doc.display_name()));
                }
            }
        }

        (files, ready)
    }
}
