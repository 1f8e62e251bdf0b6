use crate::{
    domain::Fetcher,
    errors::{ActionError, FetchError, SyncError},
    fetch::file_name_from_url,
    reconciler::Reconcile,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing;

/// Downloads every listed URL whose file is not yet in the output directory.
pub struct UrlDownload {
    url_list: PathBuf,
    output_dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
}

#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub url: String,
    /// `None` when the URL path has no usable last segment.
    pub file_name: Option<String>,
}

impl UrlDownload {
    pub fn new(url_list: PathBuf, output_dir: PathBuf, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { url_list, output_dir, fetcher }
    }
}

#[async_trait]
impl Reconcile for UrlDownload {
    type Item = RemoteFile;
    type Destination = HashSet<String>;

    fn label(&self) -> &'static str {
        "download"
    }

    async fn source(&self) -> Result<Vec<RemoteFile>, SyncError> {
        let contents = fs::read_to_string(&self.url_list)
            .await
            .map_err(|e| SyncError::enumeration(format!("URL list '{}'", self.url_list.display()), e))?;

        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|url| RemoteFile {
                url: url.to_string(),
                file_name: file_name_from_url(url).ok(),
            })
            .collect())
    }

    async fn destination(&self) -> Result<HashSet<String>, SyncError> {
        let what = || format!("directory '{}'", self.output_dir.display());
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| SyncError::enumeration(what(), e))?;

        let mut entries = fs::read_dir(&self.output_dir)
            .await
            .map_err(|e| SyncError::enumeration(what(), e))?;
        let mut present = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::enumeration(what(), e))?
        {
            present.insert(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(present)
    }

    fn key(&self, item: &RemoteFile) -> String {
        item.file_name.clone().unwrap_or_else(|| item.url.clone())
    }

    fn is_reconciled(&self, item: &RemoteFile, destination: &HashSet<String>) -> bool {
        item.file_name
            .as_ref()
            .is_some_and(|name| destination.contains(name))
    }

    async fn apply(&self, item: &RemoteFile) -> Result<(), ActionError> {
        let Some(file_name) = &item.file_name else {
            return Err(ActionError::new(&item.url, FetchError::NoFileName(item.url.clone())));
        };

        let bytes = self
            .fetcher
            .fetch(&item.url)
            .await
            .map_err(|e| ActionError::new(file_name, e))?;
        fs::write(self.output_dir.join(file_name), bytes)
            .await
            .map_err(|e| ActionError::new(file_name, e))?;

        tracing::info!(url = %item.url, "Downloaded {}", file_name);
        Ok(())
    }
}
