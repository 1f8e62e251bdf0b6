use crate::{
    describe::DescriptionGenerator,
    domain::{FileStorage, MemeRepository},
    errors::{ActionError, SyncError},
    models::{derive_name, MemeRecord, RecordFilter},
    reconciler::Reconcile,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing;

/// Inserts a described row for every bucket object that has none.
pub struct StorageIndex {
    storage: Arc<dyn FileStorage>,
    repo: Arc<dyn MemeRepository>,
    describer: DescriptionGenerator,
}

/// Names and storage paths of the rows present when the run started.
#[derive(Debug, Default)]
pub struct IndexedRows {
    names: HashSet<String>,
    storage_paths: HashSet<String>,
}

impl StorageIndex {
    pub fn new(storage: Arc<dyn FileStorage>, repo: Arc<dyn MemeRepository>, describer: DescriptionGenerator) -> Self {
        Self { storage, repo, describer }
    }
}

#[async_trait]
impl Reconcile for StorageIndex {
    type Item = String;
    type Destination = IndexedRows;

    fn label(&self) -> &'static str {
        "index"
    }

    async fn source(&self) -> Result<Vec<String>, SyncError> {
        let keys = self
            .storage
            .list()
            .await
            .map_err(|e| SyncError::enumeration("storage bucket", e))?;
        tracing::info!("Found {} files in storage", keys.len());
        Ok(keys)
    }

    async fn destination(&self) -> Result<IndexedRows, SyncError> {
        let rows = self
            .repo
            .select(&RecordFilter::All)
            .await
            .map_err(|e| SyncError::enumeration("meme table", e))?;

        let mut indexed = IndexedRows::default();
        for row in rows {
            if !row.storage_path.is_empty() {
                indexed.storage_paths.insert(row.storage_path);
            }
            indexed.names.insert(row.name);
        }
        Ok(indexed)
    }

    fn key(&self, object_key: &String) -> String {
        derive_name(object_key)
    }

    fn is_reconciled(&self, object_key: &String, destination: &IndexedRows) -> bool {
        destination.storage_paths.contains(object_key)
            || destination.names.contains(&derive_name(object_key))
    }

    async fn apply(&self, object_key: &String) -> Result<(), ActionError> {
        let name = derive_name(object_key);
        let public_url = self.storage.public_url(object_key);
        tracing::debug!(%object_key, %public_url, "Generated public URL");

        let description = self.describer.describe(&name).await;
        let record = MemeRecord::new(object_key, public_url, Some(description));
        if tracing::enabled!(tracing::Level::DEBUG) {
            let row = serde_json::to_string(&record).unwrap_or_default();
            tracing::debug!(%row, "Inserting row");
        }
        self.repo
            .insert(&record)
            .await
            .map_err(|e| ActionError::new(&name, e))?;

        tracing::info!(meme_id = %record.id, "Successfully created entry for {}", object_key);
        Ok(())
    }
}
