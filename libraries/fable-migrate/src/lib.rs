//! Fable Migrate
//!
//! Brings a foreign system's users, catalog, and listening history into
//! Fable. A two-phase workflow: read-only analysis produces a match report
//! for human review; a committing import consumes finalized ID mappings and
//! feeds converted history through the same event-ingestion and
//! progress-rebuild path that archive restore uses.
//!
//! # Architecture
//!
//! - `foreign`: the foreign backup model (users, books, sessions, progress)
//! - `matcher`: tiered, confidence-scored entity matching with a preload cache
//! - `orchestrator`: analyze / build-mappings / import phases

#![forbid(unsafe_code)]

mod error;

pub mod foreign;
pub mod matcher;
pub mod orchestrator;

pub use error::MigrateError;
pub use foreign::{ForeignBackup, ForeignBook, ForeignProgress, ForeignSession, ForeignUser};
pub use matcher::{
    EntityMatch, MatchConfidence, MatchIndex, MatchSuggestion, MatcherConfig,
};
pub use orchestrator::{
    AnalysisReport, IdMappings, ImportOptions, MigrationImportResult, MigrationOrchestrator,
};

pub type Result<T> = std::result::Result<T, MigrateError>;
