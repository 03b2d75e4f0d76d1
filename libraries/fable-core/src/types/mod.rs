//! Domain types for the Fable library engine
//!
//! All positions and durations are milliseconds. All timestamps are unix
//! epoch milliseconds (UTC).

mod book;
mod catalog;
mod collections;
mod events;
mod ids;
mod progress;
mod server;
mod user;

pub use book::Book;
pub use catalog::{Contributor, ContributorRole, Genre, Library, Series, Tag};
pub use collections::{Activity, Collection, CollectionShare, Payload, Profile, Shelf};
pub use events::{DeviceInfo, EventSource, ListeningEvent, ListeningSession};
pub use ids::{BookId, EventId, UserId};
pub use progress::PlaybackProgress;
pub use server::ServerSettings;
pub use user::User;

/// Current time as unix epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A record that lives in one named archive collection.
///
/// Every exportable entity implements this: it names the collection stream it
/// belongs to and exposes the fields the restore merge logic needs. Types
/// without a tombstone keep the default `is_deleted` of `false`, which makes
/// the merge-mode soft-delete skip a no-op for them.
pub trait LibraryEntity: Clone + Send + Sync {
    /// Archive stream name, e.g. `"users"` maps to `entities/users.jsonl`
    const COLLECTION: &'static str;

    /// Unique entity identifier
    fn entity_id(&self) -> &str;

    /// Last-modified timestamp (unix ms), used by newest-wins merges
    fn updated_at(&self) -> i64;

    /// Whether this record is soft-deleted
    fn is_deleted(&self) -> bool {
        false
    }
}
