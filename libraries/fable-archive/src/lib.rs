//! Fable Archive
//!
//! The durability engine: serializes the entire library into a portable,
//! versioned, checksummed archive and restores it with configurable conflict
//! resolution.
//!
//! # Architecture
//!
//! - `codec`: the zip container writer/reader pair and JSONL record streams
//! - `manifest`: the versioned manifest with per-stream counts
//! - `exporter`: dependency-ordered export with atomic rename
//! - `importer`: validated restore with full/merge/events-only modes
//! - `backup`: the administrative surface (create/list/validate/restore)

#![forbid(unsafe_code)]

mod error;

pub mod backup;
pub mod codec;
pub mod exporter;
pub mod importer;
pub mod manifest;

pub use backup::{BackupInfo, BackupManager, StreamCheck, ValidationReport};
pub use codec::{ArchiveReader, ArchiveWriter, RecordError, FORMAT_VERSION};
pub use error::ArchiveError;
pub use exporter::{ArchiveExporter, ExportOptions, ExportResult};
pub use importer::{ArchiveImporter, MergeStrategy, RestoreIssue, RestoreMode, RestoreOptions, RestoreResult};
pub use manifest::Manifest;

/// Re-export commonly used types
pub type Result<T> = std::result::Result<T, ArchiveError>;
