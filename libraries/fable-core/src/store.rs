//! Store traits for the Fable engine
//!
//! The underlying storage engine is an external collaborator. The engine only
//! assumes per-entity-type CRUD with ID-ordered listing, a bulk wipe for
//! full-mode restores, and an append-only event log.

use crate::error::Result;
use crate::types::{
    Activity, Book, Collection, CollectionShare, Contributor, Genre, Library, LibraryEntity,
    ListeningEvent, ListeningSession, PlaybackProgress, Profile, Series, ServerSettings, Shelf,
    Tag, User, UserId,
};
use async_trait::async_trait;

/// Outcome of appending to an append-only stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was written
    Written,
    /// A record with the same ID already exists; nothing was written
    Duplicate,
}

/// One typed entity collection: get by ID, create-or-overwrite, list all
#[async_trait]
pub trait EntityCollection<T: LibraryEntity>: Send + Sync {
    /// Get an entity by ID
    async fn get(&self, id: &str) -> Result<Option<T>>;

    /// Create or overwrite an entity
    async fn put(&self, entity: &T) -> Result<()>;

    /// List all entities in ID order
    async fn list_all(&self) -> Result<Vec<T>>;
}

/// The mutable library catalog: users, books, taxonomy, groupings, progress
#[async_trait]
pub trait LibraryStore: Send + Sync {
    fn users(&self) -> &dyn EntityCollection<User>;
    fn libraries(&self) -> &dyn EntityCollection<Library>;
    fn contributors(&self) -> &dyn EntityCollection<Contributor>;
    fn series(&self) -> &dyn EntityCollection<Series>;
    fn tags(&self) -> &dyn EntityCollection<Tag>;
    fn books(&self) -> &dyn EntityCollection<Book>;
    fn collections(&self) -> &dyn EntityCollection<Collection>;
    fn collection_shares(&self) -> &dyn EntityCollection<CollectionShare>;
    fn shelves(&self) -> &dyn EntityCollection<Shelf>;
    fn activities(&self) -> &dyn EntityCollection<Activity>;
    fn profiles(&self) -> &dyn EntityCollection<Profile>;
    fn progress(&self) -> &dyn EntityCollection<PlaybackProgress>;

    /// Get the genre taxonomy tree (empty when never seeded)
    async fn genre_tree(&self) -> Result<Vec<Genre>>;

    /// Replace the genre taxonomy tree
    async fn put_genre_tree(&self, tree: &[Genre]) -> Result<()>;

    /// Get the server identity and settings, if initialized
    async fn server_settings(&self) -> Result<Option<ServerSettings>>;

    /// Create or overwrite the server identity and settings
    async fn put_server_settings(&self, settings: &ServerSettings) -> Result<()>;

    /// Remove every record in the store. Used only by full-mode restore.
    async fn wipe_all(&self) -> Result<()>;
}

/// The immutable, append-only listening log
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event. Appending an event whose ID already exists is a
    /// detectable conflict, reported as [`AppendOutcome::Duplicate`].
    async fn append_event(&self, event: &ListeningEvent) -> Result<AppendOutcome>;

    /// All events, ordered by event ID
    async fn list_events(&self) -> Result<Vec<ListeningEvent>>;

    /// All events for one user, ordered by event ID
    async fn list_events_for_user(&self, user_id: &UserId) -> Result<Vec<ListeningEvent>>;

    /// Append one session record (same duplicate semantics as events)
    async fn append_session(&self, session: &ListeningSession) -> Result<AppendOutcome>;

    /// All sessions, ordered by session ID
    async fn list_sessions(&self) -> Result<Vec<ListeningSession>>;

    /// Remove every event and session. Used only by full-mode restore.
    async fn wipe_all(&self) -> Result<()>;
}
