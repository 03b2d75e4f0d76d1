//! Archive exporter
//!
//! Exports every entity collection in dependency order (principals before the
//! things that reference them), building the manifest as it goes. The archive
//! is written to a temporary path and atomically renamed over the destination
//! only after every step succeeds, so callers only ever observe a complete,
//! checksummed archive or none at all.

use crate::codec::{
    entity_stream_path, file_checksum, ArchiveWriter, EVENTS_PATH, GENRES_PATH, MANIFEST_PATH,
    SERVER_PATH, SESSIONS_PATH,
};
use crate::{ArchiveError, Manifest, Result, FORMAT_VERSION};
use fable_core::{EntityCollection, EventStore, Genre, LibraryEntity, LibraryStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to include in the archive beyond the entity collections
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub include_images: bool,
    pub include_history: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_images: true,
            include_history: true,
        }
    }
}

/// Outcome of a successful export
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub counts: BTreeMap<String, u64>,
    pub duration: Duration,
    /// SHA-256 over the full archive byte stream, hex-encoded
    pub checksum: String,
}

/// Serializes the entire library into one archive
pub struct ArchiveExporter<'a> {
    store: &'a dyn LibraryStore,
    events: &'a dyn EventStore,
    /// Root directory holding `covers/` and `avatars/` image assets
    assets_root: Option<&'a Path>,
}

impl<'a> ArchiveExporter<'a> {
    pub fn new(
        store: &'a dyn LibraryStore,
        events: &'a dyn EventStore,
        assets_root: Option<&'a Path>,
    ) -> Self {
        Self {
            store,
            events,
            assets_root,
        }
    }

    /// Export the library to `dest`.
    ///
    /// Fails atomically: errors and cancellation leave only a temporary file,
    /// which is removed, never a partial archive at `dest`. Cancellation is
    /// checked between entity-collection steps; a collection already being
    /// written completes first.
    pub async fn export(
        &self,
        dest: &Path,
        options: &ExportOptions,
        cancel: &CancellationToken,
    ) -> Result<ExportResult> {
        let partial = partial_path(dest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let outcome = self.write_archive(&partial, options, cancel).await;
        match outcome {
            Ok((counts, started)) => {
                let checksum = file_checksum(&partial)?;
                let size_bytes = fs::metadata(&partial)?.len();
                // Same-directory rename keeps the swap atomic.
                fs::rename(&partial, dest)?;
                let duration = started.elapsed();
                info!(
                    "Export complete: {} ({} bytes) in {:.1}s",
                    dest.display(),
                    size_bytes,
                    duration.as_secs_f64()
                );
                Ok(ExportResult {
                    path: dest.to_path_buf(),
                    size_bytes,
                    counts,
                    duration,
                    checksum,
                })
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }

    async fn write_archive(
        &self,
        partial: &Path,
        options: &ExportOptions,
        cancel: &CancellationToken,
    ) -> Result<(BTreeMap<String, u64>, Instant)> {
        let started = Instant::now();
        let mut writer = ArchiveWriter::create(partial)?;

        // Server identity first: it seeds the manifest identity fields.
        let server = self.store.server_settings().await?;
        let includes_settings = server.is_some();
        if let Some(server) = &server {
            writer.write_json(SERVER_PATH, server)?;
        }

        // Entity collections in dependency order: principals before the
        // things that reference them.
        self.write_collection(self.store.users(), &mut writer, cancel).await?;
        self.write_collection(self.store.libraries(), &mut writer, cancel).await?;
        self.write_collection(self.store.contributors(), &mut writer, cancel).await?;
        self.write_collection(self.store.series(), &mut writer, cancel).await?;
        self.write_collection(self.store.tags(), &mut writer, cancel).await?;

        ensure_not_cancelled(cancel)?;
        let genres = self.store.genre_tree().await?;
        writer.write_json(GENRES_PATH, &genres)?;
        writer.set_count("genres", genres.iter().map(Genre::node_count).sum());

        self.write_collection(self.store.books(), &mut writer, cancel).await?;
        self.write_collection(self.store.collections(), &mut writer, cancel).await?;
        self.write_collection(self.store.collection_shares(), &mut writer, cancel).await?;
        self.write_collection(self.store.shelves(), &mut writer, cancel).await?;
        self.write_collection(self.store.activities(), &mut writer, cancel).await?;
        self.write_collection(self.store.profiles(), &mut writer, cancel).await?;

        if options.include_history {
            ensure_not_cancelled(cancel)?;
            let events = self.events.list_events().await?;
            writer.write_jsonl(EVENTS_PATH, "events", &events)?;
            debug!("Exported {} listening events", events.len());

            ensure_not_cancelled(cancel)?;
            let sessions = self.events.list_sessions().await?;
            writer.write_jsonl(SESSIONS_PATH, "sessions", &sessions)?;
        }

        if options.include_images {
            ensure_not_cancelled(cancel)?;
            let image_count = self.write_images(&mut writer)?;
            writer.set_count("images", image_count);
        }

        // Manifest last, so counts reflect what was actually written.
        let counts = writer.counts().clone();
        let manifest = Manifest {
            version: FORMAT_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            server_id: server.as_ref().map(|s| s.server_id.clone()).unwrap_or_default(),
            server_name: server.as_ref().map(|s| s.server_name.clone()).unwrap_or_default(),
            counts: counts.clone(),
            includes_images: options.include_images,
            includes_events: options.include_history,
            includes_settings,
        };
        writer.write_json(MANIFEST_PATH, &manifest)?;
        writer.finish()?;

        Ok((counts, started))
    }

    async fn write_collection<T: LibraryEntity + Serialize>(
        &self,
        collection: &dyn EntityCollection<T>,
        writer: &mut ArchiveWriter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_not_cancelled(cancel)?;
        let records = collection.list_all().await?;
        let count = writer.write_jsonl(&entity_stream_path(T::COLLECTION), T::COLLECTION, &records)?;
        debug!("Exported {} {}", count, T::COLLECTION);
        Ok(())
    }

    fn write_images(&self, writer: &mut ArchiveWriter) -> Result<u64> {
        let Some(root) = self.assets_root else {
            return Ok(0);
        };
        let mut count = 0;
        for subdir in ["covers", "avatars"] {
            let dir = root.join(subdir);
            if !dir.is_dir() {
                continue;
            }
            let mut names: Vec<_> = fs::read_dir(&dir)?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            for name in names {
                match fs::read(dir.join(&name)) {
                    Ok(bytes) => {
                        writer.write_binary(&format!("images/{subdir}/{name}"), &bytes)?;
                        count += 1;
                    }
                    Err(e) => {
                        warn!("Skipping unreadable asset {subdir}/{name}: {e}");
                    }
                }
            }
        }
        Ok(count)
    }
}

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ArchiveError::Cancelled)
    } else {
        Ok(())
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_stays_in_destination_directory() {
        let p = partial_path(Path::new("/backups/backup-1.fab"));
        assert_eq!(p, Path::new("/backups/backup-1.fab.partial"));
    }
}
