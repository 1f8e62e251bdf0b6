use crate::{
    describe::DescriptionGenerator,
    domain::MemeRepository,
    errors::{ActionError, SyncError},
    models::{MemePatch, MemeRecord, RecordFilter},
    reconciler::Reconcile,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing;

/// Generates a description for every row that lacks one. Rows that already
/// have a description are never touched.
pub struct DescriptionBackfill {
    repo: Arc<dyn MemeRepository>,
    describer: DescriptionGenerator,
}

impl DescriptionBackfill {
    pub fn new(repo: Arc<dyn MemeRepository>, describer: DescriptionGenerator) -> Self {
        Self { repo, describer }
    }
}

#[async_trait]
impl Reconcile for DescriptionBackfill {
    type Item = MemeRecord;
    // The rows are their own destination.
    type Destination = ();

    fn label(&self) -> &'static str {
        "backfill"
    }

    async fn source(&self) -> Result<Vec<MemeRecord>, SyncError> {
        self.repo
            .select(&RecordFilter::MissingDescription)
            .await
            .map_err(|e| SyncError::enumeration("meme table", e))
    }

    async fn destination(&self) -> Result<(), SyncError> {
        Ok(())
    }

    fn key(&self, record: &MemeRecord) -> String {
        record.id.to_string()
    }

    fn is_reconciled(&self, record: &MemeRecord, _: &()) -> bool {
        record.has_description()
    }

    async fn apply(&self, record: &MemeRecord) -> Result<(), ActionError> {
        let description = self.describer.describe(&record.name).await;
        self.repo
            .update(record.id, &MemePatch::description(description))
            .await
            .map_err(|e| ActionError::new(record.id.to_string(), e))?;

        tracing::info!(meme_id = %record.id, "Updated description for {}", record.name);
        Ok(())
    }
}
