//! Periodic reaping of expired sync items and files.
//!
//! Each cycle asks the store to expire and delete sync items, unlinks the
//! files of expired file rows, then deletes those rows. A row whose file
//! could not be unlinked is left for the next cycle.

use std::sync::Arc;
use std::time::Duration;

use synchub_db::{Store, StoreError};
use tokio_util::sync::CancellationToken;

use crate::metrics::HubMetrics;
use crate::storage::FileStorage;

/// Outcome of one janitor cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JanitorReport {
    pub items_expired: u64,
    pub items_deleted: u64,
    pub files_removed: u64,
    pub file_rows_deleted: u64,
    /// Files whose unlink failed; their rows were kept.
    pub files_failed: u64,
}

/// Collaborators and settings of the janitor.
#[derive(Clone)]
pub struct Janitor {
    pub store: Arc<dyn Store>,
    pub storage: FileStorage,
    pub metrics: Arc<HubMetrics>,
    /// How long expired items are kept before deletion.
    pub retention_grace: chrono::Duration,
    pub interval: Duration,
}

impl Janitor {
    /// Run the sweep loop until `cancel` is triggered. The first sweep runs
    /// immediately.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            retention_grace_secs = self.retention_grace.num_seconds(),
            "Janitor started"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Janitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Janitor: sweep failed");
                    }
                }
            }
        }
    }

    /// Perform one sweep.
    pub async fn run_once(&self) -> Result<JanitorReport, StoreError> {
        let sweep = self.store.sweep_expired(self.retention_grace).await?;

        let mut report = JanitorReport {
            items_expired: sweep.items_expired,
            items_deleted: sweep.items_deleted,
            ..JanitorReport::default()
        };

        let mut unlinked = Vec::with_capacity(sweep.expired_files.len());
        for file in &sweep.expired_files {
            match self.storage.remove(&file.path).await {
                Ok(existed) => {
                    if existed {
                        report.files_removed += 1;
                    }
                    unlinked.push(file.id);
                }
                Err(e) => {
                    report.files_failed += 1;
                    tracing::warn!(file_id = %file.id, path = %file.path, error = %e, "Janitor: failed to remove file");
                }
            }
        }

        report.file_rows_deleted = self.store.delete_file_rows(&unlinked).await?;
        self.metrics
            .janitor_removed(report.items_deleted, report.files_removed);

        if report.items_deleted > 0 || report.file_rows_deleted > 0 || report.items_expired > 0 {
            tracing::info!(
                items_expired = report.items_expired,
                items_deleted = report.items_deleted,
                files_removed = report.files_removed,
                file_rows_deleted = report.file_rows_deleted,
                files_failed = report.files_failed,
                "Janitor: purged expired data"
            );
        } else {
            tracing::debug!("Janitor: nothing to purge");
        }

        Ok(report)
    }
}
