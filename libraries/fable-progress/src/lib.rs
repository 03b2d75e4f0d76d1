//! Fable Progress Rebuilder
//!
//! Folds the immutable listening-event log into materialized
//! [`PlaybackProgress`] records. This is the only code path that turns events
//! into "current state": both archive restore and foreign-system migration
//! end by invoking it, so progress is always re-derivable from the log.

#![forbid(unsafe_code)]

use fable_core::{
    types::now_ms, Book, EntityCollection, EventStore, ListeningEvent, PlaybackProgress, Result,
    UserId,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Finished flags known to be authoritative (e.g. "user marked this complete"
/// in a source system), keyed by the progress composite key. A recomputation
/// never downgrades these, because imported duration data can be less
/// reliable than an explicit completion signal.
pub type AuthoritativeFinishes = HashMap<String, i64>;

/// Counters from one rebuild pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    /// (user, book) pairs recomputed and persisted
    pub pairs_rebuilt: u64,
    /// Events folded into progress records
    pub events_folded: u64,
    /// Events referencing a book that no longer exists, skipped
    pub orphaned_events: u64,
}

/// Recomputes playback progress from the event log
pub struct ProgressRebuilder<'a> {
    events: &'a dyn EventStore,
    books: &'a dyn EntityCollection<Book>,
    progress: &'a dyn EntityCollection<PlaybackProgress>,
}

impl<'a> ProgressRebuilder<'a> {
    pub fn new(
        events: &'a dyn EventStore,
        books: &'a dyn EntityCollection<Book>,
        progress: &'a dyn EntityCollection<PlaybackProgress>,
    ) -> Self {
        Self {
            events,
            books,
            progress,
        }
    }

    /// Rebuild progress for every (user, book) pair in the full log
    pub async fn rebuild_all(&self) -> Result<RebuildSummary> {
        let events = self.events.list_events().await?;
        self.fold(events, &AuthoritativeFinishes::new()).await
    }

    /// Rebuild progress for one user only
    pub async fn rebuild_for_user(&self, user_id: &UserId) -> Result<RebuildSummary> {
        let events = self.events.list_events_for_user(user_id).await?;
        self.fold(events, &AuthoritativeFinishes::new()).await
    }

    /// Rebuild progress for a set of users, preserving authoritative
    /// finished flags supplied by the caller (migration path)
    pub async fn rebuild_for_users(
        &self,
        user_ids: &[UserId],
        authoritative: &AuthoritativeFinishes,
    ) -> Result<RebuildSummary> {
        let mut events = Vec::new();
        for user_id in user_ids {
            events.extend(self.events.list_events_for_user(user_id).await?);
        }
        self.fold(events, authoritative).await
    }

    /// Group, sort, and fold events into progress records.
    ///
    /// Per (user, book) pair: events are folded in `started_at` order. The
    /// first event seeds the record; each subsequent event always adds its
    /// duration to accumulated listening time, while position only ever moves
    /// forward (a rewind never regresses recorded progress).
    async fn fold(
        &self,
        events: Vec<ListeningEvent>,
        authoritative: &AuthoritativeFinishes,
    ) -> Result<RebuildSummary> {
        let mut groups: BTreeMap<String, Vec<ListeningEvent>> = BTreeMap::new();
        for event in events {
            let key = PlaybackProgress::key(&event.user_id, &event.book_id);
            groups.entry(key).or_default().push(event);
        }

        let mut summary = RebuildSummary::default();

        for (key, mut group) in groups {
            group.sort_by(|a, b| {
                a.started_at
                    .cmp(&b.started_at)
                    .then(a.ended_at.cmp(&b.ended_at))
            });

            let first = &group[0];
            let book = self.books.get(first.book_id.as_str()).await?;
            let Some(book) = book else {
                // Orphaned pair: the book was deleted after these events were
                // recorded. Expected over a long-lived library.
                debug!("Skipping {} orphaned events for {}", group.len(), key);
                summary.orphaned_events += group.len() as u64;
                continue;
            };

            let mut position_ms = first.end_position_ms;
            let mut time_listened_ms = first.duration_ms;
            let started_at = first.started_at;
            let mut last_played_at = first.ended_at;

            for event in &group[1..] {
                time_listened_ms += event.duration_ms;
                position_ms = position_ms.max(event.end_position_ms);
                last_played_at = last_played_at.max(event.ended_at);
            }

            // Finished at >= 99% of the duration known at rebuild time.
            // Integer comparison keeps the threshold exact at the boundary.
            let mut is_finished = book.duration_ms > 0 && position_ms * 100 >= book.duration_ms * 99;
            let mut finished_at = is_finished.then_some(last_played_at);

            if !is_finished {
                if let Some(&authoritative_at) = authoritative.get(&key) {
                    is_finished = true;
                    finished_at = Some(authoritative_at);
                }
            }

            let record = PlaybackProgress {
                id: key,
                user_id: first.user_id.clone(),
                book_id: first.book_id.clone(),
                current_position_ms: position_ms,
                time_listened_ms,
                is_finished,
                finished_at,
                started_at,
                last_played_at,
                updated_at: now_ms(),
            };
            self.progress.put(&record).await?;

            summary.pairs_rebuilt += 1;
            summary.events_folded += group.len() as u64;
        }

        info!(
            "Progress rebuild complete: {} pairs from {} events ({} orphaned)",
            summary.pairs_rebuilt, summary.events_folded, summary.orphaned_events
        );

        Ok(summary)
    }
}
