#![allow(dead_code)]

use async_trait::async_trait;
use meme_sync::describe::DescriptionGenerator;
use meme_sync::domain::{ChatPrompt, FileStorage, Fetcher, MemeRepository, TextGenerator};
use meme_sync::errors::{FetchError, GenerationError, RepoError, StorageError};
use meme_sync::models::{MemePatch, MemeRecord, RecordFilter};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Should create temp dir")
}

pub fn write_files(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), format!("bytes of {}", name)).expect("Should write file");
    }
}

// ============ Object storage ============

#[derive(Default)]
pub struct InMemoryStorage {
    pub objects: Mutex<BTreeMap<String, (Vec<u8>, Option<String>)>>,
    pub uploads: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<String>>,
    pub fail_uploads: HashSet<String>,
    pub fail_deletes: bool,
    pub fail_list: bool,
}

impl InMemoryStorage {
    pub fn with_objects(keys: &[&str]) -> Self {
        let storage = Self::default();
        {
            let mut objects = storage.objects.lock().unwrap();
            for key in keys {
                objects.insert(key.to_string(), (Vec::new(), None));
            }
        }
        storage
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl FileStorage for InMemoryStorage {
    async fn list(&self) -> Result<Vec<String>, StorageError> {
        if self.fail_list {
            return Err(StorageError::BackendError(anyhow::anyhow!("bucket unreachable")));
        }
        Ok(self.keys())
    }

    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError> {
        self.uploads.lock().unwrap().push(key.to_string());
        if self.fail_uploads.contains(key) {
            return Err(StorageError::UploadFailed(format!("simulated failure for {}", key)));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deletes.lock().unwrap().push(key.to_string());
        if self.fail_deletes {
            return Err(StorageError::BackendError(anyhow::anyhow!("delete refused")));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/memes/{}", key)
    }
}

// ============ Table ============

#[derive(Default)]
pub struct InMemoryRepository {
    pub rows: Mutex<Vec<MemeRecord>>,
    pub inserts: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<Uuid>>,
    /// Names whose insert or update fails.
    pub fail_names: HashSet<String>,
    pub fail_select: bool,
    /// Only selects with this filter fail.
    pub fail_filter: Option<RecordFilter>,
    pub selects: Mutex<Vec<RecordFilter>>,
}

impl InMemoryRepository {
    pub fn with_rows(rows: Vec<MemeRecord>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<MemeRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.lock().unwrap().len()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl MemeRepository for InMemoryRepository {
    async fn insert(&self, record: &MemeRecord) -> Result<(), RepoError> {
        self.inserts.lock().unwrap().push(record.name.clone());
        if self.fail_names.contains(&record.name) {
            return Err(RepoError::BackendError(anyhow::anyhow!("simulated insert failure")));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.id == record.id) {
            return Err(RepoError::Duplicate(record.id));
        }
        rows.push(record.clone());
        Ok(())
    }

    async fn select(&self, filter: &RecordFilter) -> Result<Vec<MemeRecord>, RepoError> {
        self.selects.lock().unwrap().push(filter.clone());
        if self.fail_select || self.fail_filter.as_ref() == Some(filter) {
            return Err(RepoError::BackendError(anyhow::anyhow!("table unreachable")));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, patch: &MemePatch) -> Result<(), RepoError> {
        self.updates.lock().unwrap().push(id);
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|r| r.id == id).ok_or(RepoError::NotFound(id))?;
        if self.fail_names.contains(&row.name) {
            return Err(RepoError::BackendError(anyhow::anyhow!("simulated update failure")));
        }
        if let Some(description) = &patch.description {
            row.description = Some(description.clone());
        }
        Ok(())
    }
}

// ============ Text generation ============

/// Replies "About <subject>." by echoing the quoted subject from the prompt.
#[derive(Default)]
pub struct EchoGenerator {
    pub prompts: Mutex<Vec<ChatPrompt>>,
}

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let subject = prompt.user.split('\'').nth(1).unwrap_or_default();
        Ok(format!(" About {}. ", subject))
    }
}

pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn complete(&self, _prompt: &ChatPrompt) -> Result<String, GenerationError> {
        Err(GenerationError::Status {
            status: 503,
            body: "unavailable".into(),
        })
    }
}

pub fn echo_describer() -> (Arc<EchoGenerator>, DescriptionGenerator) {
    let generator = Arc::new(EchoGenerator::default());
    (generator.clone(), DescriptionGenerator::new(generator))
}

pub fn failing_describer() -> DescriptionGenerator {
    DescriptionGenerator::new(Arc::new(FailingGenerator))
}

// ============ Downloads ============

#[derive(Default)]
pub struct RecordingFetcher {
    pub calls: Mutex<Vec<String>>,
    pub fail_urls: HashSet<String>,
}

impl RecordingFetcher {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for RecordingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.fail_urls.contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        Ok(url.as_bytes().to_vec())
    }
}
