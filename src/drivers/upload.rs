use crate::{
    describe::DescriptionGenerator,
    domain::{FileStorage, MemeRepository},
    errors::{ActionError, ActionFailure, SyncError},
    models::{derive_name, is_image_file, mime_type_for, MemeRecord},
    reconciler::Reconcile,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing;

/// Uploads image files from a local directory that the bucket lacks, and
/// inserts a row for each.
pub struct LocalUpload {
    input_dir: PathBuf,
    storage: Arc<dyn FileStorage>,
    repo: Arc<dyn MemeRepository>,
    describer: Option<DescriptionGenerator>,
}

#[derive(Debug, Clone)]
pub struct LocalFile {
    pub path: PathBuf,
    pub file_name: String,
}

impl LocalUpload {
    pub fn new(input_dir: PathBuf, storage: Arc<dyn FileStorage>, repo: Arc<dyn MemeRepository>) -> Self {
        Self { input_dir, storage, repo, describer: None }
    }

    /// Describe new rows right away instead of leaving them to the backfill job.
    pub fn with_describer(mut self, describer: DescriptionGenerator) -> Self {
        self.describer = Some(describer);
        self
    }
}

#[async_trait]
impl Reconcile for LocalUpload {
    type Item = LocalFile;
    type Destination = HashSet<String>;

    fn label(&self) -> &'static str {
        "upload"
    }

    async fn source(&self) -> Result<Vec<LocalFile>, SyncError> {
        let what = || format!("directory '{}'", self.input_dir.display());
        let mut entries = fs::read_dir(&self.input_dir)
            .await
            .map_err(|e| SyncError::enumeration(what(), e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::enumeration(what(), e))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            // Follows symlinks.
            let is_file = fs::metadata(entry.path()).await.map(|m| m.is_file()).unwrap_or(false);
            if is_file && is_image_file(&file_name) {
                files.push(LocalFile { path: entry.path(), file_name });
            }
        }
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(files)
    }

    /// Derived names of the objects already in the bucket.
    async fn destination(&self) -> Result<HashSet<String>, SyncError> {
        let keys = self
            .storage
            .list()
            .await
            .map_err(|e| SyncError::enumeration("storage bucket", e))?;
        Ok(keys.iter().map(|key| derive_name(key)).collect())
    }

    fn key(&self, item: &LocalFile) -> String {
        derive_name(&item.file_name)
    }

    fn is_reconciled(&self, item: &LocalFile, stored_names: &HashSet<String>) -> bool {
        stored_names.contains(&derive_name(&item.file_name))
    }

    async fn apply(&self, item: &LocalFile) -> Result<(), ActionError> {
        let key = self.key(item);
        let storage_path = item.file_name.as_str();
        tracing::info!(file = %item.path.display(), "Processing {}...", item.file_name);

        let data = fs::read(&item.path)
            .await
            .map_err(|e| ActionError::new(&key, e))?;
        let mime_type = mime_type_for(&item.file_name);
        self.storage
            .upload(storage_path, data, Some(mime_type))
            .await
            .map_err(|e| ActionError::new(&key, e))?;

        let description = match &self.describer {
            Some(describer) => Some(describer.describe(&key).await),
            None => None,
        };
        let record = MemeRecord::new(&item.file_name, self.storage.public_url(storage_path), description);

        if let Err(insert) = self.repo.insert(&record).await {
            tracing::warn!(%key, %storage_path, error = %insert, "Row insert failed after upload, removing object");
            let failure = match self.storage.delete(storage_path).await {
                Ok(()) => ActionFailure::RolledBack(insert),
                Err(cleanup) => ActionFailure::Orphaned {
                    storage_path: storage_path.to_string(),
                    insert,
                    cleanup,
                },
            };
            return Err(ActionError::new(key, failure));
        }

        tracing::info!(meme_id = %record.id, "Successfully uploaded and created entry for {}", item.file_name);
        Ok(())
    }
}
