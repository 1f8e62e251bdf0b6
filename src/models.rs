use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Content type used when the extension gives no hint.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Extensions the local upload driver picks up.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// One meme image and its metadata row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemeRecord {
    pub id: Uuid,
    pub name: String,
    pub file_name: String,
    pub extension: String,
    pub storage_path: String,
    pub mime_type: String,
    pub public_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MemeRecord {
    /// Builds a fresh record for an object stored under its own file name.
    pub fn new(file_name: &str, public_url: String, description: Option<String>) -> Self {
        MemeRecord {
            id: Uuid::new_v4(),
            name: derive_name(file_name),
            file_name: file_name.to_string(),
            extension: extension_of(file_name),
            storage_path: file_name.to_string(),
            mime_type: mime_type_for(file_name),
            public_url,
            description,
            created_at: Utc::now(),
        }
    }

    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

/// Partial update applied to an existing row. `None` fields are left untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MemePatch {
    pub description: Option<String>,
}

impl MemePatch {
    pub fn description(description: impl Into<String>) -> Self {
        MemePatch {
            description: Some(description.into()),
        }
    }
}

/// Row selection understood by every `MemeRepository`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RecordFilter {
    #[default]
    All,
    MissingDescription,
}

impl RecordFilter {
    pub fn matches(&self, record: &MemeRecord) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::MissingDescription => !record.has_description(),
        }
    }
}

/// The logical name of a file: its file name without the extension.
pub fn derive_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

/// Lower-cased extension including the dot, or empty.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Human-readable subject for a meme name: separators become single spaces.
pub fn normalize_subject(raw: &str) -> String {
    raw.replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn mime_type_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(FALLBACK_MIME_TYPE)
        .to_string()
}

pub fn is_image_file(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
