//! Administrative backup surface
//!
//! Owns the backups directory: creating archives, listing and deleting them
//! by derived ID (the archive filename stem), structural validation without
//! importing, restore, and full progress rebuild.

use crate::codec::{entity_stream_path, ArchiveReader, EVENTS_PATH, GENRES_PATH, IMAGES_PREFIX, SESSIONS_PATH};
use crate::exporter::{ArchiveExporter, ExportOptions, ExportResult};
use crate::importer::{ArchiveImporter, RestoreOptions, RestoreResult};
use crate::{Manifest, Result};
use fable_core::{EventStore, Genre, LibraryStore};
use fable_progress::{ProgressRebuilder, RebuildSummary};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Archive file extension used for managed backups
pub const BACKUP_EXTENSION: &str = "fab";

/// Entity collections with a JSONL stream in the archive, in export order
pub const ENTITY_COLLECTIONS: [&str; 11] = [
    "users",
    "libraries",
    "contributors",
    "series",
    "tags",
    "books",
    "collections",
    "collection_shares",
    "shelves",
    "activities",
    "profiles",
];

/// One managed backup on disk
#[derive(Debug, Clone)]
pub struct BackupInfo {
    /// Derived ID: the archive filename stem
    pub id: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: String,
    pub server_name: String,
}

/// Declared-vs-actual check for one stream
#[derive(Debug, Clone)]
pub struct StreamCheck {
    pub stream: String,
    pub declared: u64,
    pub actual: u64,
    pub parse_errors: u64,
}

impl StreamCheck {
    pub fn is_ok(&self) -> bool {
        self.declared == self.actual && self.parse_errors == 0
    }
}

/// Structural validity report for one archive
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub manifest: Manifest,
    pub checksum: String,
    pub streams: Vec<StreamCheck>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.streams.iter().all(StreamCheck::is_ok)
    }
}

/// Manages the backups directory and the export/restore entry points
pub struct BackupManager {
    backups_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backups_dir: impl Into<PathBuf>) -> Self {
        Self {
            backups_dir: backups_dir.into(),
        }
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Create a backup of the whole library in the backups directory
    pub async fn create_backup(
        &self,
        store: &dyn LibraryStore,
        events: &dyn EventStore,
        assets_root: Option<&Path>,
        options: &ExportOptions,
    ) -> Result<ExportResult> {
        fs::create_dir_all(&self.backups_dir)?;
        let stamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
        let dest = self
            .backups_dir
            .join(format!("backup-{stamp}.{BACKUP_EXTENSION}"));
        let exporter = ArchiveExporter::new(store, events, assets_root);
        exporter.export(&dest, options, &CancellationToken::new()).await
    }

    /// List managed backups, newest first. Archives whose manifest cannot be
    /// read are skipped with a warning rather than failing the listing.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let mut backups = Vec::new();
        if !self.backups_dir.is_dir() {
            return Ok(backups);
        }
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            match self.read_info(&path) {
                Ok(info) => backups.push(info),
                Err(e) => warn!("Skipping unreadable backup {}: {e}", path.display()),
            }
        }
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Get one backup by derived ID
    pub fn get_backup(&self, id: &str) -> Result<Option<BackupInfo>> {
        let path = self.backups_dir.join(format!("{id}.{BACKUP_EXTENSION}"));
        if !path.is_file() {
            return Ok(None);
        }
        self.read_info(&path).map(Some)
    }

    /// Delete one backup by derived ID. Returns whether a file was removed.
    pub fn delete_backup(&self, id: &str) -> Result<bool> {
        let path = self.backups_dir.join(format!("{id}.{BACKUP_EXTENSION}"));
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        info!("Deleted backup {id}");
        Ok(true)
    }

    fn read_info(&self, path: &Path) -> Result<BackupInfo> {
        let mut reader = ArchiveReader::open(path)?;
        let manifest = reader.read_manifest()?;
        Ok(BackupInfo {
            id: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            size_bytes: fs::metadata(path)?.len(),
            created_at: manifest.created_at,
            server_name: manifest.server_name,
        })
    }

    /// Structural validity report: manifest counts vs actual stream contents,
    /// without importing anything
    pub fn validate(&self, path: &Path) -> Result<ValidationReport> {
        let checksum = crate::codec::file_checksum(path)?;
        let mut reader = ArchiveReader::open(path)?;
        let manifest = reader.read_manifest()?;
        let mut streams = Vec::new();

        for collection in ENTITY_COLLECTIONS {
            let (actual, parse_errors) = count_records(&mut reader, &entity_stream_path(collection))?;
            streams.push(StreamCheck {
                stream: collection.to_string(),
                declared: manifest.count(collection),
                actual,
                parse_errors,
            });
        }

        let genre_nodes: u64 = reader
            .read_json::<Vec<Genre>>(GENRES_PATH)?
            .map(|tree| tree.iter().map(Genre::node_count).sum())
            .unwrap_or(0);
        streams.push(StreamCheck {
            stream: "genres".to_string(),
            declared: manifest.count("genres"),
            actual: genre_nodes,
            parse_errors: 0,
        });

        if manifest.includes_events {
            for (key, path) in [("events", EVENTS_PATH), ("sessions", SESSIONS_PATH)] {
                let (actual, parse_errors) = count_records(&mut reader, path)?;
                streams.push(StreamCheck {
                    stream: key.to_string(),
                    declared: manifest.count(key),
                    actual,
                    parse_errors,
                });
            }
        }

        if manifest.includes_images {
            streams.push(StreamCheck {
                stream: "images".to_string(),
                declared: manifest.count("images"),
                actual: reader.list_paths(IMAGES_PREFIX).len() as u64,
                parse_errors: 0,
            });
        }

        Ok(ValidationReport {
            manifest,
            checksum,
            streams,
        })
    }

    /// Restore an archive into the given stores
    pub async fn restore(
        &self,
        path: &Path,
        store: &dyn LibraryStore,
        events: &dyn EventStore,
        assets_root: Option<&Path>,
        options: &RestoreOptions,
    ) -> Result<RestoreResult> {
        let importer = ArchiveImporter::new(store, events, assets_root);
        importer.restore(path, options, &CancellationToken::new()).await
    }

    /// Recompute all playback progress from the full event log
    pub async fn rebuild_progress(
        &self,
        store: &dyn LibraryStore,
        events: &dyn EventStore,
    ) -> Result<RebuildSummary> {
        let rebuilder = ProgressRebuilder::new(events, store.books(), store.progress());
        Ok(rebuilder.rebuild_all().await?)
    }
}

/// Count the records and undecodable lines of one JSONL stream
fn count_records(reader: &mut ArchiveReader, path: &str) -> Result<(u64, u64)> {
    let Some(records) = reader.read_records::<serde_json::Value>(path)? else {
        return Ok((0, 0));
    };
    let mut actual = 0;
    let mut parse_errors = 0;
    for record in records {
        match record {
            Ok(_) => actual += 1,
            Err(_) => parse_errors += 1,
        }
    }
    Ok((actual, parse_errors))
}
