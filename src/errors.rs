use thiserror::Error; // Use thiserror for cleaner error definitions
use uuid::Uuid;

// --- Collaborator Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Meme not found with ID: {0}")]
    NotFound(Uuid),

    #[error("Meme already exists with ID: {0}")]
    Duplicate(Uuid),

    #[error("Stored item could not be parsed: {0}")]
    DataCorruption(String),

    #[error("Database backend error: {0}")]
    BackendError(#[from] anyhow::Error), // Wrap Anyhow errors from DB layer
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error), // Wrap Anyhow errors from Storage layer
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Text generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Text generation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Text generation returned no content")]
    EmptyCompletion,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Download request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Download of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Cannot derive a file name from URL: {0}")]
    NoFileName(String),
}

// --- Batch Errors ---

/// A failure to obtain the source or destination enumeration. Always fatal to the run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cannot enumerate {what}: {cause}")]
    SourceEnumeration {
        what: String,
        #[source]
        cause: anyhow::Error,
    },
}

impl SyncError {
    pub fn enumeration(what: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        SyncError::SourceEnumeration {
            what: what.into(),
            cause: cause.into(),
        }
    }

    /// Short name of the underlying failure, reported alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::SourceEnumeration { cause, .. } => {
                if cause.downcast_ref::<StorageError>().is_some() {
                    "StorageError"
                } else if cause.downcast_ref::<RepoError>().is_some() {
                    "RepoError"
                } else if cause.downcast_ref::<std::io::Error>().is_some() {
                    "IoError"
                } else {
                    "Other"
                }
            }
        }
    }
}

/// A failure of the corrective action for one item. Recorded and skipped over.
#[derive(Error, Debug)]
#[error("{key}: {cause}")]
pub struct ActionError {
    pub key: String,
    #[source]
    pub cause: ActionFailure,
}

impl ActionError {
    pub fn new(key: impl Into<String>, cause: impl Into<ActionFailure>) -> Self {
        ActionError {
            key: key.into(),
            cause: cause.into(),
        }
    }

    /// True when the failure left an object in storage without a matching row.
    pub fn is_orphaned(&self) -> bool {
        matches!(self.cause, ActionFailure::Orphaned { .. })
    }
}

#[derive(Error, Debug)]
pub enum ActionFailure {
    #[error("object storage: {0}")]
    Storage(#[from] StorageError),

    #[error("table: {0}")]
    Repository(#[from] RepoError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("local file: {0}")]
    Io(#[from] std::io::Error),

    #[error("row insert failed after upload, object removed again: {0}")]
    RolledBack(#[source] RepoError),

    #[error("row insert failed after upload ({insert}) and object '{storage_path}' could not be removed ({cleanup})")]
    Orphaned {
        storage_path: String,
        #[source]
        insert: RepoError,
        cleanup: StorageError,
    },
}

// --- Application Error ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Could not perform file storage operation: {0}")]
    StorageError(#[from] StorageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<aws_smithy_types::error::operation::BuildError> for AppError {
    fn from(err: aws_smithy_types::error::operation::BuildError) -> Self {
        AppError::InitError(format!("Failed to build AWS request: {}", err))
    }
}
