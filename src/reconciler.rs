//! Idempotent batch reconciliation.
//!
//! A job enumerates its source, snapshots its destination once, and applies one
//! corrective action per source item the destination does not already cover.
//! Enumeration failures abort the run; action failures are recorded and the
//! batch moves on. Re-running a job re-derives the outstanding work from the
//! destination, so completed items are skipped.

use crate::errors::{ActionError, SyncError};
use crate::pacing::Pacer;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use tracing;

const PROGRESS_EVERY: usize = 10;

#[async_trait]
pub trait Reconcile: Send + Sync {
    type Item: Send + Sync;
    type Destination: Send + Sync;

    /// Name of the job in log lines.
    fn label(&self) -> &'static str;

    /// Enumerates the source items, in processing order.
    async fn source(&self) -> Result<Vec<Self::Item>, SyncError>;

    /// Snapshots the destination. Taken once per run, never refreshed.
    async fn destination(&self) -> Result<Self::Destination, SyncError>;

    /// Stable key of an item. Later items repeating a key are dropped.
    fn key(&self, item: &Self::Item) -> String;

    /// Whether the destination already covers the item.
    fn is_reconciled(&self, item: &Self::Item, destination: &Self::Destination) -> bool;

    /// The single corrective action for an item missing from the destination.
    async fn apply(&self, item: &Self::Item) -> Result<(), ActionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Skipped,
    Committed,
    Orphaned,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Distinct source items considered.
    pub total: usize,
    /// Items reconciled, whether by an action or because nothing was needed.
    pub successful: usize,
    pub skipped: usize,
    /// Corrective actions issued.
    pub attempted: usize,
    pub failed: usize,
    pub orphaned: usize,
    pub duplicates: usize,
    /// Keys of failed or orphaned items, in processing order.
    pub failed_keys: Vec<String>,
}

impl BatchSummary {
    pub fn record(&mut self, key: &str, outcome: ItemOutcome) {
        self.total += 1;
        match outcome {
            ItemOutcome::Skipped => {
                self.skipped += 1;
                self.successful += 1;
            }
            ItemOutcome::Committed => {
                self.attempted += 1;
                self.successful += 1;
            }
            ItemOutcome::Orphaned => {
                self.attempted += 1;
                self.orphaned += 1;
                self.failed_keys.push(key.to_string());
            }
            ItemOutcome::Failed => {
                self.attempted += 1;
                self.failed += 1;
                self.failed_keys.push(key.to_string());
            }
        }
    }

    /// Folds another run's counts into this one.
    pub fn merge(&mut self, other: BatchSummary) {
        self.total += other.total;
        self.successful += other.successful;
        self.skipped += other.skipped;
        self.attempted += other.attempted;
        self.failed += other.failed;
        self.orphaned += other.orphaned;
        self.duplicates += other.duplicates;
        self.failed_keys.extend(other.failed_keys);
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.orphaned == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.successful, self.total)
    }
}

/// Runs one job to completion.
pub async fn run_batch<J: Reconcile>(job: &J, pacer: &mut Pacer) -> Result<BatchSummary, SyncError> {
    let label = job.label();
    let items = job.source().await.inspect_err(|e| {
        tracing::error!(job = label, error.kind = e.kind(), error = %e, "Cannot enumerate source, aborting");
    })?;
    let destination = job.destination().await.inspect_err(|e| {
        tracing::error!(job = label, error.kind = e.kind(), error = %e, "Cannot enumerate destination, aborting");
    })?;

    let mut summary = BatchSummary::default();
    let mut seen = HashSet::new();
    let work: Vec<(String, &J::Item)> = items
        .iter()
        .filter_map(|item| {
            let key = job.key(item);
            if seen.insert(key.clone()) {
                Some((key, item))
            } else {
                tracing::warn!(job = label, %key, "Duplicate key in source, ignoring later item");
                summary.duplicates += 1;
                None
            }
        })
        .collect();

    let count = work.len();
    tracing::info!(job = label, "Found {} items to process", count);

    for (index, (key, item)) in work.into_iter().enumerate() {
        let outcome = if job.is_reconciled(item, &destination) {
            tracing::info!(job = label, %key, "Skipping, already reconciled");
            ItemOutcome::Skipped
        } else {
            let outcome = match job.apply(item).await {
                Ok(()) => {
                    tracing::info!(job = label, %key, "Reconciled");
                    pacer.record_success();
                    ItemOutcome::Committed
                }
                Err(e) if e.is_orphaned() => {
                    tracing::error!(job = label, %key, error = %e, "Object left without a row, the index job will pick it up");
                    pacer.record_failure();
                    ItemOutcome::Orphaned
                }
                Err(e) => {
                    tracing::error!(job = label, %key, error = %e, "Error processing item");
                    pacer.record_failure();
                    ItemOutcome::Failed
                }
            };
            pacer.pause().await;
            outcome
        };
        summary.record(&key, outcome);

        if (index + 1) % PROGRESS_EVERY == 0 {
            tracing::info!(job = label, "Progress: {}/{} ({} successful)", index + 1, count, summary.successful);
        }
    }

    tracing::info!(
        job = label,
        skipped = summary.skipped,
        failed = summary.failed,
        orphaned = summary.orphaned,
        duplicates = summary.duplicates,
        "Successfully processed {} out of {} items",
        summary.successful,
        summary.total
    );
    Ok(summary)
}
