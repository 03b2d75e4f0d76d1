//! In-memory reference implementation of the Fable store traits
//!
//! Backs the integration tests and the admin CLI. Collections are ordered
//! `BTreeMap`s behind async locks, so `list_all` is deterministic (ID order),
//! which the archive round-trip tests rely on.

#![forbid(unsafe_code)]

mod snapshot;

pub use snapshot::LibrarySnapshot;

use async_trait::async_trait;
use fable_core::{
    Activity, AppendOutcome, Book, Collection, CollectionShare, Contributor, EntityCollection,
    EventStore, Genre, Library, LibraryEntity, LibraryStore, ListeningEvent, ListeningSession,
    PlaybackProgress, Profile, Result, Series, ServerSettings, Shelf, Tag, User, UserId,
};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// One in-memory entity collection
pub struct MemoryCollection<T> {
    records: RwLock<BTreeMap<String, T>>,
}

impl<T> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: LibraryEntity> MemoryCollection<T> {
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl<T: LibraryEntity + 'static> EntityCollection<T> for MemoryCollection<T> {
    async fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn put(&self, entity: &T) -> Result<()> {
        self.records
            .write()
            .await
            .insert(entity.entity_id().to_string(), entity.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<T>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

/// In-memory library catalog store
#[derive(Default)]
pub struct MemoryStore {
    users: MemoryCollection<User>,
    libraries: MemoryCollection<Library>,
    contributors: MemoryCollection<Contributor>,
    series: MemoryCollection<Series>,
    tags: MemoryCollection<Tag>,
    books: MemoryCollection<Book>,
    collections: MemoryCollection<Collection>,
    collection_shares: MemoryCollection<CollectionShare>,
    shelves: MemoryCollection<Shelf>,
    activities: MemoryCollection<Activity>,
    profiles: MemoryCollection<Profile>,
    progress: MemoryCollection<PlaybackProgress>,
    genres: RwLock<Vec<Genre>>,
    settings: RwLock<Option<ServerSettings>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    fn users(&self) -> &dyn EntityCollection<User> {
        &self.users
    }

    fn libraries(&self) -> &dyn EntityCollection<Library> {
        &self.libraries
    }

    fn contributors(&self) -> &dyn EntityCollection<Contributor> {
        &self.contributors
    }

    fn series(&self) -> &dyn EntityCollection<Series> {
        &self.series
    }

    fn tags(&self) -> &dyn EntityCollection<Tag> {
        &self.tags
    }

    fn books(&self) -> &dyn EntityCollection<Book> {
        &self.books
    }

    fn collections(&self) -> &dyn EntityCollection<Collection> {
        &self.collections
    }

    fn collection_shares(&self) -> &dyn EntityCollection<CollectionShare> {
        &self.collection_shares
    }

    fn shelves(&self) -> &dyn EntityCollection<Shelf> {
        &self.shelves
    }

    fn activities(&self) -> &dyn EntityCollection<Activity> {
        &self.activities
    }

    fn profiles(&self) -> &dyn EntityCollection<Profile> {
        &self.profiles
    }

    fn progress(&self) -> &dyn EntityCollection<PlaybackProgress> {
        &self.progress
    }

    async fn genre_tree(&self) -> Result<Vec<Genre>> {
        Ok(self.genres.read().await.clone())
    }

    async fn put_genre_tree(&self, tree: &[Genre]) -> Result<()> {
        *self.genres.write().await = tree.to_vec();
        Ok(())
    }

    async fn server_settings(&self) -> Result<Option<ServerSettings>> {
        Ok(self.settings.read().await.clone())
    }

    async fn put_server_settings(&self, settings: &ServerSettings) -> Result<()> {
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }

    async fn wipe_all(&self) -> Result<()> {
        self.users.clear().await;
        self.libraries.clear().await;
        self.contributors.clear().await;
        self.series.clear().await;
        self.tags.clear().await;
        self.books.clear().await;
        self.collections.clear().await;
        self.collection_shares.clear().await;
        self.shelves.clear().await;
        self.activities.clear().await;
        self.profiles.clear().await;
        self.progress.clear().await;
        self.genres.write().await.clear();
        *self.settings.write().await = None;
        Ok(())
    }
}

/// In-memory append-only event log
#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<BTreeMap<String, ListeningEvent>>,
    sessions: RwLock<BTreeMap<String, ListeningSession>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append_event(&self, event: &ListeningEvent) -> Result<AppendOutcome> {
        let mut events = self.events.write().await;
        if events.contains_key(event.id.as_str()) {
            return Ok(AppendOutcome::Duplicate);
        }
        events.insert(event.id.as_str().to_string(), event.clone());
        Ok(AppendOutcome::Written)
    }

    async fn list_events(&self) -> Result<Vec<ListeningEvent>> {
        Ok(self.events.read().await.values().cloned().collect())
    }

    async fn list_events_for_user(&self, user_id: &UserId) -> Result<Vec<ListeningEvent>> {
        Ok(self
            .events
            .read()
            .await
            .values()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn append_session(&self, session: &ListeningSession) -> Result<AppendOutcome> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Ok(AppendOutcome::Duplicate);
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(AppendOutcome::Written)
    }

    async fn list_sessions(&self) -> Result<Vec<ListeningSession>> {
        Ok(self.sessions.read().await.values().cloned().collect())
    }

    async fn wipe_all(&self) -> Result<()> {
        self.events.write().await.clear();
        self.sessions.write().await.clear();
        Ok(())
    }
}
