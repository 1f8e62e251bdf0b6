use crate::{
    domain::FileStorage,
    errors::StorageError,
    models::FALLBACK_MIME_TYPE,
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::{
    primitives::ByteStream,
    Client as S3Client,
};
use reqwest::Url;
use tracing;

/// Marker objects some S3-compatible stores create for empty folders.
const PLACEHOLDER_KEYS: [&str; 1] = [".emptyFolderPlaceholder"];

#[derive(Debug, Clone)]
pub struct S3FileStorage {
    client: S3Client,
    bucket_name: String,
    url_base: String,
}

impl S3FileStorage {
    pub fn new(client: S3Client, bucket_name: String, url_base: String) -> Self {
        tracing::info!(bucket = %bucket_name, %url_base, "Initializing S3FileStorage");
        Self { client, bucket_name, url_base }
    }
}

/// Picks the prefix public object URLs are built from.
///
/// An explicit base wins; otherwise an endpoint override is addressed path-style,
/// and plain AWS falls back to the virtual-hosted bucket URL.
pub fn public_url_base(
    explicit_base: Option<&str>,
    endpoint: Option<&str>,
    region: &str,
    bucket: &str,
) -> String {
    match (explicit_base, endpoint) {
        (Some(base), _) => base.trim_end_matches('/').to_string(),
        (None, Some(endpoint)) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        (None, None) => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
    }
}

/// Joins an object key onto the URL base, percent-encoding each path segment.
pub fn object_url(base: &str, key: &str) -> String {
    match Url::parse(base) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().extend(key.split('/'));
            }
            url.to_string()
        }
        _ => format!("{}/{}", base, key),
    }
}

fn is_listable_key(key: &str) -> bool {
    !key.ends_with('/') && !PLACEHOLDER_KEYS.iter().any(|p| key.ends_with(p))
}

#[async_trait]
impl FileStorage for S3FileStorage {
    /// Lists object keys with ListObjectsV2. Handles pagination.
    async fn list(&self) -> Result<Vec<String>, StorageError> {
        tracing::debug!(bucket = %self.bucket_name, "S3: Listing objects");
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .context(format!("S3: Failed to list bucket '{}'", self.bucket_name))?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter(|key| is_listable_key(key))
                    .map(str::to_string),
            );

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    tracing::debug!(bucket = %self.bucket_name, "S3: Continuing listing with next token...");
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::info!(bucket = %self.bucket_name, "S3: Listed {} objects", keys.len());
        Ok(keys)
    }

    /// Uploads data to S3 using PutObject. Sets Content-Type.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError> {
        let content_type = content_type.unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, %content_type, "S3: Uploading file");

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .context(format!("S3: Failed to upload object with key '{}'", key))
            .map_err(|e| StorageError::UploadFailed(format!("{:#}", e)))?;

        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Upload successful");
        Ok(())
    }

    /// Deletes an object from S3 using DeleteObject.
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Deleting object");

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|sdk_err| {
                tracing::error!(s3_key = %key, bucket = %self.bucket_name, error = %sdk_err, "S3: Error deleting object");
                StorageError::BackendError(anyhow::Error::new(sdk_err).context(format!("S3: Failed to delete object with key '{}'", key)))
            })?;

        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Delete request successful");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        object_url(&self.url_base, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_base_wins_and_loses_trailing_slash() {
        let base = public_url_base(
            Some("https://xyz.supabase.co/storage/v1/object/public/memes/"),
            Some("http://localhost:4566"),
            "us-east-1",
            "memes",
        );
        assert_eq!(base, "https://xyz.supabase.co/storage/v1/object/public/memes");
    }

    #[test]
    fn endpoint_override_is_path_style() {
        let base = public_url_base(None, Some("http://localhost:4566/"), "us-east-1", "memes");
        assert_eq!(base, "http://localhost:4566/memes");
    }

    #[test]
    fn aws_default_is_virtual_hosted() {
        let base = public_url_base(None, None, "ca-central-1", "memes");
        assert_eq!(base, "https://memes.s3.ca-central-1.amazonaws.com");
    }

    #[test]
    fn object_urls_encode_the_key() {
        assert_eq!(
            object_url("https://cdn.test/memes", "my meme.jpg"),
            "https://cdn.test/memes/my%20meme.jpg"
        );
        assert_eq!(
            object_url("http://localhost:4566/memes", "nested/doge#1.png"),
            "http://localhost:4566/memes/nested/doge%231.png"
        );
        assert_eq!(
            object_url("https://memes.s3.ca-central-1.amazonaws.com", "doge.jpg"),
            "https://memes.s3.ca-central-1.amazonaws.com/doge.jpg"
        );
    }

    #[test]
    fn folder_markers_are_not_listed() {
        assert!(is_listable_key("doge.jpg"));
        assert!(!is_listable_key("nested/"));
        assert!(!is_listable_key(".emptyFolderPlaceholder"));
        assert!(!is_listable_key("nested/.emptyFolderPlaceholder"));
    }
}
