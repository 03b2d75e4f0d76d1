/// Materialized playback progress, derived from the event log
use super::{BookId, LibraryEntity, UserId};
use serde::{Deserialize, Serialize};

/// Mutable materialized view over the event log for one (user, book) pair.
///
/// Fully destroyable: it can be rebuilt from the log at any time. Position is
/// monotonically non-decreasing across folded events; a rewind still adds to
/// `time_listened_ms` but never lowers `current_position_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackProgress {
    /// Composite key, `<user_id>/<book_id>`
    pub id: String,

    pub user_id: UserId,
    pub book_id: BookId,

    /// Furthest position reached (ms)
    pub current_position_ms: i64,

    /// Total accumulated listening time across all events (ms)
    pub time_listened_ms: i64,

    /// Whether the book has been finished (position reached 99% of duration)
    pub is_finished: bool,

    /// When the book was finished (unix ms)
    pub finished_at: Option<i64>,

    /// Wall-clock start of the first event (unix ms)
    pub started_at: i64,

    /// Wall-clock end of the most recent event (unix ms)
    pub last_played_at: i64,

    /// When this record was last recomputed (unix ms); bookkeeping only,
    /// not part of the rebuild-idempotence contract
    pub updated_at: i64,
}

impl PlaybackProgress {
    /// Composite key for a (user, book) pair
    pub fn key(user_id: &UserId, book_id: &BookId) -> String {
        format!("{}/{}", user_id, book_id)
    }
}

impl LibraryEntity for PlaybackProgress {
    const COLLECTION: &'static str = "progress";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}
