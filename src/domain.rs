use crate::errors::{FetchError, GenerationError, RepoError, StorageError};
use crate::models::{MemePatch, MemeRecord, RecordFilter};
use async_trait::async_trait;
use uuid::Uuid;

/// Trait defining operations for storing and retrieving meme rows.
#[async_trait]
pub trait MemeRepository: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    /// Inserts a new row. Fails with `RepoError::Duplicate` if the id is taken.
    async fn insert(&self, record: &MemeRecord) -> Result<(), RepoError>;

    /// Returns every row matching the filter.
    async fn select(&self, filter: &RecordFilter) -> Result<Vec<MemeRecord>, RepoError>;

    /// Applies a partial update to the row with the given id.
    async fn update(&self, id: Uuid, patch: &MemePatch) -> Result<(), RepoError>;
}

/// Trait defining operations on the object bucket holding meme images.
#[async_trait]
pub trait FileStorage: Send + Sync + 'static {
    /// Lists every object key in the bucket.
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    /// Uploads file data to the storage backend.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError>;

    /// Removes an object. Used to compensate a failed row insert.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Resolves the public URL of a key. Stable for a given key.
    fn public_url(&self, key: &str) -> String;
}

/// A role-tagged chat prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Prompt in, short text out.
#[async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, GenerationError>;
}

/// Retrieves the bytes behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
