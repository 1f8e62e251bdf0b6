//! One-shot checks against the object store.

use crate::{
    domain::FileStorage,
    errors::{AppError, StorageError},
    models::mime_type_for,
};
use anyhow::Context;
use aws_sdk_s3::Client as S3Client;
use std::path::Path;
use tracing;

/// Names of every bucket the credentials can see.
pub async fn list_buckets(client: &S3Client) -> Result<Vec<String>, StorageError> {
    tracing::info!("Attempting to list buckets...");
    let resp = client
        .list_buckets()
        .send()
        .await
        .context("S3: Failed to list buckets")?;

    Ok(resp
        .buckets()
        .iter()
        .filter_map(|bucket| bucket.name())
        .map(str::to_string)
        .collect())
}

/// Uploads a single local file under `key` and returns its public URL.
/// Overwrites whatever is stored under `key`.
pub async fn probe_upload(storage: &dyn FileStorage, file: &Path, key: &str) -> Result<String, AppError> {
    if !file.is_file() {
        return Err(AppError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("test image {} not found", file.display()),
        )));
    }

    tracing::info!("Attempting to upload {}...", file.display());
    let data = tokio::fs::read(file).await?;
    let content_type = mime_type_for(&file.to_string_lossy());
    storage.upload(key, data, Some(content_type)).await?;

    let url = storage.public_url(key);
    tracing::info!(%key, %url, "Upload successful");
    Ok(url)
}
