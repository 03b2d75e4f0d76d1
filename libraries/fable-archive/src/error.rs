use thiserror::Error;

/// Errors that abort an archive operation.
///
/// These are the fatal severity class: an unreadable container, a missing or
/// invalid manifest, an unsupported format version, or an unwritable
/// destination. Per-record problems never surface here; they accumulate into
/// [`crate::RestoreIssue`] lists and the operation still succeeds.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Core(#[from] fable_core::FableError),

    #[error("Archive has no manifest")]
    ManifestMissing,

    #[error("Unsupported archive format version {found} (supported: {supported})")]
    UnsupportedVersion { found: String, supported: &'static str },

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Operation was cancelled")]
    Cancelled,
}
