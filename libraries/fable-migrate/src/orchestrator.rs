//! Migration phases: analyze, map, import
//!
//! `analyze` is read-only and produces a match report for human review.
//! `import` commits: mapped foreign sessions become listening events with
//! deterministic IDs, progress snapshots without session history become
//! synthetic events, and progress is rebuilt for the affected users only.
//! Re-running an import is safe because every converted event keeps the same
//! ID and the log reports duplicates instead of double-writing.

use crate::foreign::ForeignBackup;
use crate::matcher::{self, EntityMatch, MatchIndex, MatcherConfig};
use crate::Result;
use fable_core::types::now_ms;
use fable_core::{
    AppendOutcome, BookId, DeviceInfo, EventId, EventSource, EventStore, LibraryStore,
    ListeningEvent, PlaybackProgress, UserId,
};
use fable_progress::{AuthoritativeFinishes, ProgressRebuilder, RebuildSummary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// ID prefix of events converted from foreign sessions
const SESSION_EVENT_PREFIX: &str = "mig-";
/// ID prefix of synthetic events converted from bare progress snapshots
const SYNTHETIC_EVENT_PREFIX: &str = "mig-progress-";

/// Read-only result of matching a foreign backup against the local library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub user_matches: Vec<EntityMatch>,
    pub book_matches: Vec<EntityMatch>,

    pub users_auto: u64,
    pub users_needing_review: u64,
    pub books_auto: u64,
    pub books_needing_review: u64,

    /// History rows whose user and book are both auto-mapped
    pub sessions_importable: u64,
    pub sessions_blocked: u64,
    pub progress_importable: u64,
    pub progress_blocked: u64,
}

impl AnalysisReport {
    /// The mappings the matcher is confident enough to commit unattended.
    /// Admin overrides surface here too, as definitive matches.
    pub fn auto_mappings(&self) -> IdMappings {
        let take = |matches: &[EntityMatch]| {
            matches
                .iter()
                .filter(|m| m.confidence.should_auto_import())
                .filter_map(|m| Some((m.foreign_id.clone(), m.local_id.clone()?)))
                .collect()
        };
        IdMappings {
            users: take(&self.user_matches),
            books: take(&self.book_matches),
        }
    }
}

/// Finalized foreign-ID to local-ID mappings, the input to an import.
///
/// Typically produced by [`AnalysisReport::auto_mappings`], then edited by
/// hand to resolve the entries the matcher left for review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdMappings {
    #[serde(default)]
    pub users: HashMap<String, String>,
    #[serde(default)]
    pub books: HashMap<String, String>,
}

/// Import-phase knobs
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Convert progress snapshots without session history into synthetic
    /// listening events so the rebuilt progress reflects them
    pub synthesize_progress_events: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            synthesize_progress_events: true,
        }
    }
}

/// Counters from one committed import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationImportResult {
    /// Foreign sessions converted and written as events
    pub events_imported: u64,
    /// Synthetic events written for bare progress snapshots
    pub synthetic_events: u64,
    /// Events whose ID already existed in the log (prior import run)
    pub duplicates_skipped: u64,
    /// Sessions left out because user or book is unmapped
    pub sessions_unmapped: u64,
    /// Progress snapshots left out because user or book is unmapped
    pub progress_unmapped: u64,
    pub rebuild: RebuildSummary,
}

/// Drives a foreign-system migration against the local stores
pub struct MigrationOrchestrator<'a> {
    store: &'a dyn LibraryStore,
    events: &'a dyn EventStore,
}

impl<'a> MigrationOrchestrator<'a> {
    pub fn new(store: &'a dyn LibraryStore, events: &'a dyn EventStore) -> Self {
        Self { store, events }
    }

    /// Match every foreign entity against the local library. Writes nothing.
    pub async fn analyze(
        &self,
        backup: &ForeignBackup,
        config: &MatcherConfig,
    ) -> Result<AnalysisReport> {
        info!(
            "Analyzing foreign backup: {} users, {} books, {} sessions, {} progress rows",
            backup.users.len(),
            backup.books.len(),
            backup.sessions.len(),
            backup.progress.len()
        );

        let index = MatchIndex::build(self.store).await?;
        let local_users = self.store.users().list_all().await?;

        let user_matches: Vec<EntityMatch> = backup
            .users
            .iter()
            .map(|u| matcher::match_user(u, &local_users, config))
            .collect();
        let book_matches: Vec<EntityMatch> = backup
            .books
            .iter()
            .map(|b| matcher::match_book(b, &index, config))
            .collect();

        let users_auto = user_matches
            .iter()
            .filter(|m| m.confidence.should_auto_import())
            .count() as u64;
        let books_auto = book_matches
            .iter()
            .filter(|m| m.confidence.should_auto_import())
            .count() as u64;

        let mut report = AnalysisReport {
            users_needing_review: user_matches.len() as u64 - users_auto,
            books_needing_review: book_matches.len() as u64 - books_auto,
            user_matches,
            book_matches,
            users_auto,
            books_auto,
            sessions_importable: 0,
            sessions_blocked: 0,
            progress_importable: 0,
            progress_blocked: 0,
        };

        let mappings = report.auto_mappings();
        for session in &backup.sessions {
            if mappings.users.contains_key(&session.user_id)
                && mappings.books.contains_key(&session.book_id)
            {
                report.sessions_importable += 1;
            } else {
                report.sessions_blocked += 1;
            }
        }
        for progress in &backup.progress {
            if mappings.users.contains_key(&progress.user_id)
                && mappings.books.contains_key(&progress.book_id)
            {
                report.progress_importable += 1;
            } else {
                report.progress_blocked += 1;
            }
        }

        info!(
            "Analysis complete: {}/{} users and {}/{} books auto-matched",
            report.users_auto,
            report.user_matches.len(),
            report.books_auto,
            report.book_matches.len()
        );
        Ok(report)
    }

    /// Commit a migration: convert mapped history into events, then rebuild
    /// progress for the affected users
    pub async fn import(
        &self,
        backup: &ForeignBackup,
        mappings: &IdMappings,
        options: &ImportOptions,
    ) -> Result<MigrationImportResult> {
        let mut result = MigrationImportResult::default();
        let mut affected_users: BTreeSet<String> = BTreeSet::new();
        let mut authoritative = AuthoritativeFinishes::new();

        for session in &backup.sessions {
            let (Some(user_id), Some(book_id)) = (
                mappings.users.get(&session.user_id),
                mappings.books.get(&session.book_id),
            ) else {
                result.sessions_unmapped += 1;
                continue;
            };

            let event = ListeningEvent {
                id: EventId::new(format!("{SESSION_EVENT_PREFIX}{}", session.id)),
                user_id: UserId::new(user_id.clone()),
                book_id: BookId::new(book_id.clone()),
                start_position_ms: sec_to_ms(session.start_sec),
                end_position_ms: sec_to_ms(session.end_sec),
                duration_ms: sec_to_ms(session.duration_sec),
                started_at: session.started_at,
                ended_at: session.updated_at,
                playback_rate: session.playback_rate.unwrap_or(1.0),
                device: DeviceInfo::imported(),
                source: EventSource::Imported,
                created_at: now_ms(),
            };

            match self.events.append_event(&event).await? {
                AppendOutcome::Written => result.events_imported += 1,
                AppendOutcome::Duplicate => result.duplicates_skipped += 1,
            }
            affected_users.insert(user_id.clone());
        }

        // Mapped progress rows affect their user too: their logs must be
        // scanned for real history before synthesizing, and an authoritative
        // finished flag must reach the rebuild even when synthesis is
        // suppressed.
        for progress in &backup.progress {
            if mappings.books.contains_key(&progress.book_id) {
                if let Some(user_id) = mappings.users.get(&progress.user_id) {
                    affected_users.insert(user_id.clone());
                }
            }
        }

        // Pairs that already have real session history, whether written this
        // run, imported by an earlier run, or recorded by native playback.
        // Synthetic snapshot events never override real sessions.
        let mut pairs_with_sessions: HashSet<String> = HashSet::new();
        for user_id in &affected_users {
            let user_id = UserId::new(user_id.clone());
            for event in self.events.list_events_for_user(&user_id).await? {
                if !event.id.as_str().starts_with(SYNTHETIC_EVENT_PREFIX) {
                    pairs_with_sessions.insert(PlaybackProgress::key(&event.user_id, &event.book_id));
                }
            }
        }

        for progress in &backup.progress {
            let (Some(user_id), Some(book_id)) = (
                mappings.users.get(&progress.user_id),
                mappings.books.get(&progress.book_id),
            ) else {
                result.progress_unmapped += 1;
                continue;
            };
            let user_id = UserId::new(user_id.clone());
            let book_id = BookId::new(book_id.clone());
            let key = PlaybackProgress::key(&user_id, &book_id);

            if progress.is_finished {
                authoritative.insert(key.clone(), progress.finished_at.unwrap_or(progress.updated_at));
            }

            if !options.synthesize_progress_events {
                continue;
            }
            if pairs_with_sessions.contains(&key) {
                debug!("Skipping synthetic event for {key}: real session history exists");
                continue;
            }

            let position_ms = sec_to_ms(progress.position_sec);
            let event = ListeningEvent {
                id: EventId::new(format!(
                    "{SYNTHETIC_EVENT_PREFIX}{}-{}",
                    progress.user_id, progress.book_id
                )),
                user_id: user_id.clone(),
                book_id,
                start_position_ms: 0,
                end_position_ms: position_ms,
                duration_ms: position_ms,
                started_at: progress.updated_at,
                ended_at: progress.updated_at,
                playback_rate: 1.0,
                device: DeviceInfo::imported(),
                source: EventSource::Imported,
                created_at: now_ms(),
            };

            match self.events.append_event(&event).await? {
                AppendOutcome::Written => result.synthetic_events += 1,
                AppendOutcome::Duplicate => result.duplicates_skipped += 1,
            }
        }

        if result.sessions_unmapped + result.progress_unmapped > 0 {
            warn!(
                "{} sessions and {} progress rows skipped: user or book unmapped",
                result.sessions_unmapped, result.progress_unmapped
            );
        }

        let user_ids: Vec<UserId> = affected_users.into_iter().map(UserId::new).collect();
        let rebuilder =
            ProgressRebuilder::new(self.events, self.store.books(), self.store.progress());
        result.rebuild = rebuilder.rebuild_for_users(&user_ids, &authoritative).await?;

        info!(
            "Import complete: {} events + {} synthetic written, {} duplicates, {} pairs rebuilt",
            result.events_imported,
            result.synthetic_events,
            result.duplicates_skipped,
            result.rebuild.pairs_rebuilt
        );
        Ok(result)
    }
}

fn sec_to_ms(sec: f64) -> i64 {
    (sec * 1000.0).round() as i64
}
