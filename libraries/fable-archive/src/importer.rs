//! Archive importer
//!
//! Validates an archive and replays it into live storage under one of three
//! restore modes, with per-entity merge-conflict resolution. Listening
//! history is replayed through the append-only event log and progress is
//! recomputed from the freshly-imported log afterward; a progress snapshot is
//! never imported directly, because only the log is trusted.

use crate::codec::{
    entity_stream_path, ArchiveReader, EVENTS_PATH, GENRES_PATH, IMAGES_PREFIX, SERVER_PATH,
    SESSIONS_PATH,
};
use crate::exporter::ensure_not_cancelled;
use crate::Result;
use fable_core::{
    AppendOutcome, EntityCollection, EventStore, Genre, LibraryEntity, LibraryStore,
    ListeningEvent, ListeningSession, ServerSettings,
};
use fable_progress::ProgressRebuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Restore mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreMode {
    /// Wipe all existing data, then replay the archive. Irreversible.
    Full,
    /// Add records, resolving per-record collisions with the merge strategy
    Merge,
    /// Replay only the listening history streams
    EventsOnly,
}

/// Conflict-resolution policy for records whose ID already exists locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// The local record always wins
    KeepLocal,
    /// The backup record always wins
    KeepBackup,
    /// The record with the later `updated_at` wins; ties favor local
    NewestWins,
}

/// Options for one restore invocation
#[derive(Debug, Clone, Copy)]
pub struct RestoreOptions {
    pub mode: RestoreMode,
    pub strategy: MergeStrategy,
    /// Execute all decision logic but perform no writes
    pub dry_run: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            mode: RestoreMode::Merge,
            strategy: MergeStrategy::KeepLocal,
            dry_run: false,
        }
    }
}

/// One non-fatal problem encountered during restore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreIssue {
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub message: String,
}

/// Counts and accumulated issues from one restore
#[derive(Debug, Clone, Default)]
pub struct RestoreResult {
    /// Records imported (or would-import under dry-run), per entity type
    pub imported: BTreeMap<String, u64>,
    /// Records skipped (merge policy, tombstones, duplicates), per entity type
    pub skipped: BTreeMap<String, u64>,
    /// Non-fatal per-record problems
    pub issues: Vec<RestoreIssue>,
}

impl RestoreResult {
    fn add_imported(&mut self, entity_type: &str) {
        *self.imported.entry(entity_type.to_string()).or_default() += 1;
    }

    fn add_skipped(&mut self, entity_type: &str) {
        *self.skipped.entry(entity_type.to_string()).or_default() += 1;
    }

    fn add_issue(&mut self, entity_type: &str, entity_id: Option<String>, message: impl Into<String>) {
        self.issues.push(RestoreIssue {
            entity_type: entity_type.to_string(),
            entity_id,
            message: message.into(),
        });
    }

    /// Imported count for one entity type
    pub fn imported_count(&self, entity_type: &str) -> u64 {
        self.imported.get(entity_type).copied().unwrap_or(0)
    }

    /// Skipped count for one entity type
    pub fn skipped_count(&self, entity_type: &str) -> u64 {
        self.skipped.get(entity_type).copied().unwrap_or(0)
    }
}

/// What the merge policy decided for one colliding record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeDecision {
    KeepLocal,
    Overwrite,
}

/// Resolve one ID collision. `newest-wins` overwrites only when the local
/// record is strictly older; ties keep local.
fn resolve_conflict(strategy: MergeStrategy, local_updated_at: i64, incoming_updated_at: i64) -> MergeDecision {
    match strategy {
        MergeStrategy::KeepLocal => MergeDecision::KeepLocal,
        MergeStrategy::KeepBackup => MergeDecision::Overwrite,
        MergeStrategy::NewestWins => {
            if local_updated_at < incoming_updated_at {
                MergeDecision::Overwrite
            } else {
                MergeDecision::KeepLocal
            }
        }
    }
}

/// Replays a validated archive into live storage
pub struct ArchiveImporter<'a> {
    store: &'a dyn LibraryStore,
    events: &'a dyn EventStore,
    /// Root directory to extract `covers/` and `avatars/` assets into
    assets_root: Option<&'a Path>,
}

impl<'a> ArchiveImporter<'a> {
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

    /// Restore an archive.
    ///
    /// Fatal conditions (unreadable archive, missing manifest, unsupported
    /// version) return `Err`. Per-record problems accumulate into
    /// [`RestoreResult::issues`] and the operation still succeeds.
    /// Cancellation is checked between entity-type steps; a step in progress
    /// completes, so an entity-type import either fully ran or did not start.
    pub async fn restore(
        &self,
        path: &Path,
        options: &RestoreOptions,
        cancel: &CancellationToken,
    ) -> Result<RestoreResult> {
        let mut reader = ArchiveReader::open(path)?;
        let manifest = reader.read_manifest()?;
        info!(
            "Restoring archive from {} (server '{}', mode {:?}, dry_run={})",
            manifest.created_at, manifest.server_name, options.mode, options.dry_run
        );

        let mut result = RestoreResult::default();

        if options.mode == RestoreMode::Full && !options.dry_run {
            // The one intentionally destructive step.
            warn!("Full restore: wiping all existing data");
            self.store.wipe_all().await?;
            self.events.wipe_all().await?;
        }

        if options.mode == RestoreMode::Full && manifest.includes_settings {
            self.restore_settings(&mut reader, options, &mut result).await?;
        }

        if options.mode != RestoreMode::EventsOnly {
            self.restore_collection(&mut reader, self.store.users(), options, &mut result, cancel).await?;
            self.restore_collection(&mut reader, self.store.libraries(), options, &mut result, cancel).await?;
            self.restore_collection(&mut reader, self.store.contributors(), options, &mut result, cancel).await?;
            self.restore_collection(&mut reader, self.store.series(), options, &mut result, cancel).await?;
            self.restore_collection(&mut reader, self.store.tags(), options, &mut result, cancel).await?;
            self.restore_genres(&mut reader, options, &mut result).await?;
            self.restore_collection(&mut reader, self.store.books(), options, &mut result, cancel).await?;
            self.restore_collection(&mut reader, self.store.collections(), options, &mut result, cancel).await?;
            self.restore_collection(&mut reader, self.store.collection_shares(), options, &mut result, cancel).await?;
            self.restore_collection(&mut reader, self.store.shelves(), options, &mut result, cancel).await?;
            self.restore_collection(&mut reader, self.store.activities(), options, &mut result, cancel).await?;
            self.restore_collection(&mut reader, self.store.profiles(), options, &mut result, cancel).await?;
        }

        if manifest.includes_events {
            self.restore_history(&mut reader, options, &mut result, cancel).await?;
        }

        if manifest.includes_images {
            ensure_not_cancelled(cancel)?;
            self.extract_images(&mut reader, options, &mut result)?;
        }

        info!(
            "Restore complete: {} imported, {} skipped, {} issues",
            result.imported.values().sum::<u64>(),
            result.skipped.values().sum::<u64>(),
            result.issues.len()
        );
        Ok(result)
    }

    /// Restore server identity/settings. A missing pre-existing identity is
    /// tolerated by creating a fresh one before applying backup values.
    async fn restore_settings(
        &self,
        reader: &mut ArchiveReader,
        options: &RestoreOptions,
        result: &mut RestoreResult,
    ) -> Result<()> {
        let Some(backup) = reader.read_json::<ServerSettings>(SERVER_PATH)? else {
            result.add_issue("server", None, "archive declares settings but server.json is missing");
            return Ok(());
        };
        if options.dry_run {
            result.add_imported("server");
            return Ok(());
        }
        if self.store.server_settings().await?.is_none() {
            debug!("No local server identity; creating a fresh one before restore");
            self.store
                .put_server_settings(&ServerSettings::new(&backup.server_name))
                .await?;
        }
        self.store.put_server_settings(&backup).await?;
        result.add_imported("server");
        Ok(())
    }

    async fn restore_genres(
        &self,
        reader: &mut ArchiveReader,
        options: &RestoreOptions,
        result: &mut RestoreResult,
    ) -> Result<()> {
        let Some(tree) = reader.read_json::<Vec<Genre>>(GENRES_PATH)? else {
            return Ok(());
        };
        let node_count: u64 = tree.iter().map(Genre::node_count).sum();
        // The taxonomy is one document: full mode replaces it, merge mode
        // only fills an empty local tree.
        let local_empty = self.store.genre_tree().await?.is_empty();
        if options.mode == RestoreMode::Full || local_empty {
            if !options.dry_run {
                self.store.put_genre_tree(&tree).await?;
            }
            *result.imported.entry("genres".to_string()).or_default() += node_count;
        } else {
            *result.skipped.entry("genres".to_string()).or_default() += node_count;
        }
        Ok(())
    }

    async fn restore_collection<T>(
        &self,
        reader: &mut ArchiveReader,
        collection: &dyn EntityCollection<T>,
        options: &RestoreOptions,
        result: &mut RestoreResult,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        T: LibraryEntity + Serialize + DeserializeOwned,
    {
        ensure_not_cancelled(cancel)?;
        let Some(records) = reader.read_records::<T>(&entity_stream_path(T::COLLECTION))? else {
            debug!("Stream {} not present in archive", T::COLLECTION);
            return Ok(());
        };

        for record in records {
            let entity = match record {
                Ok(entity) => entity,
                Err(e) => {
                    result.add_issue(T::COLLECTION, None, format!("line {}: {}", e.line, e.message));
                    continue;
                }
            };

            // A tombstone from the backup must not resurrect under merge
            // semantics; only a full-mode wipe-then-replace reintroduces it.
            if options.mode == RestoreMode::Merge && entity.is_deleted() {
                result.add_skipped(T::COLLECTION);
                continue;
            }

            if options.dry_run {
                result.add_imported(T::COLLECTION);
                continue;
            }

            let existing = match collection.get(entity.entity_id()).await {
                Ok(existing) => existing,
                Err(e) => {
                    result.add_issue(T::COLLECTION, Some(entity.entity_id().to_string()), e.to_string());
                    continue;
                }
            };

            let decision = match &existing {
                None => MergeDecision::Overwrite,
                Some(local) => resolve_conflict(options.strategy, local.updated_at(), entity.updated_at()),
            };

            match decision {
                MergeDecision::KeepLocal => result.add_skipped(T::COLLECTION),
                MergeDecision::Overwrite => match collection.put(&entity).await {
                    Ok(()) => result.add_imported(T::COLLECTION),
                    Err(e) => {
                        result.add_issue(T::COLLECTION, Some(entity.entity_id().to_string()), e.to_string());
                    }
                },
            }
        }
        Ok(())
    }

    /// Replay events and sessions, then recompute progress from the
    /// freshly-imported log.
    async fn restore_history(
        &self,
        reader: &mut ArchiveReader,
        options: &RestoreOptions,
        result: &mut RestoreResult,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_not_cancelled(cancel)?;
        if let Some(records) = reader.read_records::<ListeningEvent>(EVENTS_PATH)? {
            for record in records {
                match record {
                    Err(e) => result.add_issue("events", None, format!("line {}: {}", e.line, e.message)),
                    Ok(event) => {
                        if options.dry_run {
                            result.add_imported("events");
                            continue;
                        }
                        match self.events.append_event(&event).await {
                            // Duplicates of immutable records are informational.
                            Ok(AppendOutcome::Written) => result.add_imported("events"),
                            Ok(AppendOutcome::Duplicate) => result.add_skipped("events"),
                            Err(e) => result.add_issue("events", Some(event.id.to_string()), e.to_string()),
                        }
                    }
                }
            }
        }

        ensure_not_cancelled(cancel)?;
        if let Some(records) = reader.read_records::<ListeningSession>(SESSIONS_PATH)? {
            for record in records {
                match record {
                    Err(e) => result.add_issue("sessions", None, format!("line {}: {}", e.line, e.message)),
                    Ok(session) => {
                        if options.dry_run {
                            result.add_imported("sessions");
                            continue;
                        }
                        match self.events.append_session(&session).await {
                            Ok(AppendOutcome::Written) => result.add_imported("sessions"),
                            Ok(AppendOutcome::Duplicate) => result.add_skipped("sessions"),
                            Err(e) => result.add_issue("sessions", Some(session.id.clone()), e.to_string()),
                        }
                    }
                }
            }
        }

        if !options.dry_run {
            ensure_not_cancelled(cancel)?;
            let rebuilder =
                ProgressRebuilder::new(self.events, self.store.books(), self.store.progress());
            let summary = rebuilder.rebuild_all().await?;
            debug!(
                "Rebuilt progress for {} pairs after history import",
                summary.pairs_rebuilt
            );
        }
        Ok(())
    }

    /// Extract binary assets to their conventional subdirectories,
    /// best-effort: a single failed extraction is recorded and skipped.
    fn extract_images(
        &self,
        reader: &mut ArchiveReader,
        options: &RestoreOptions,
        result: &mut RestoreResult,
    ) -> Result<()> {
        let Some(root) = self.assets_root else {
            return Ok(());
        };
        for entry in reader.list_paths(IMAGES_PREFIX) {
            let relative = &entry[IMAGES_PREFIX.len()..];
            // Entry names come from the archive and are untrusted: anything
            // that could resolve outside the assets root is rejected.
            if !is_safe_relative_path(relative) {
                result.add_issue("images", Some(relative.to_string()), "entry path escapes the assets root");
                continue;
            }
            if options.dry_run {
                result.add_imported("images");
                continue;
            }
            let outcome = (|| -> Result<()> {
                let bytes = reader
                    .read_binary(&entry)?
                    .ok_or_else(|| crate::ArchiveError::InvalidArchive(entry.clone()))?;
                let dest = root.join(relative);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&dest, bytes)?;
                Ok(())
            })();
            match outcome {
                Ok(()) => result.add_imported("images"),
                Err(e) => result.add_issue("images", Some(relative.to_string()), e.to_string()),
            }
        }
        Ok(())
    }
}

/// Whether an archive-supplied path stays inside the directory it is joined
/// onto: relative, and composed only of normal components
fn is_safe_relative_path(relative: &str) -> bool {
    let path = Path::new(relative);
    !relative.is_empty()
        && path
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_traversal_components_are_rejected() {
        assert!(is_safe_relative_path("covers/book-1.jpg"));
        assert!(!is_safe_relative_path("../escape.txt"));
        assert!(!is_safe_relative_path("covers/../../escape.txt"));
        assert!(!is_safe_relative_path("/etc/passwd"));
        assert!(!is_safe_relative_path(""));
    }

    #[test]
    fn keep_local_never_overwrites() {
        assert_eq!(
            resolve_conflict(MergeStrategy::KeepLocal, 1, 100),
            MergeDecision::KeepLocal
        );
    }

    #[test]
    fn keep_backup_always_overwrites() {
        assert_eq!(
            resolve_conflict(MergeStrategy::KeepBackup, 100, 1),
            MergeDecision::Overwrite
        );
    }

    #[test]
    fn newest_wins_ties_favor_local() {
        assert_eq!(
            resolve_conflict(MergeStrategy::NewestWins, 50, 50),
            MergeDecision::KeepLocal
        );
        assert_eq!(
            resolve_conflict(MergeStrategy::NewestWins, 50, 51),
            MergeDecision::Overwrite
        );
        assert_eq!(
            resolve_conflict(MergeStrategy::NewestWins, 51, 50),
            MergeDecision::KeepLocal
        );
    }
}
