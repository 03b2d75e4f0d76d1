//! JSON-loadable library snapshot, used to seed a store from a file

use crate::{MemoryEventStore, MemoryStore};
use fable_core::{
    Activity, Book, Collection, CollectionShare, Contributor, EventStore, Genre, Library,
    LibraryStore, ListeningEvent, ListeningSession, PlaybackProgress, Profile, Result, Series,
    ServerSettings, Shelf, Tag, User,
};
use serde::{Deserialize, Serialize};

/// Everything a library contains, as one JSON document.
///
/// The admin CLI loads one of these into a [`MemoryStore`] before running an
/// operation; tests use it as a fixture format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub server: Option<ServerSettings>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default)]
    pub contributors: Vec<Contributor>,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub collection_shares: Vec<CollectionShare>,
    #[serde(default)]
    pub shelves: Vec<Shelf>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// Materialized progress; rebuildable from `events`, carried so a
    /// snapshot round-trips without forcing a rebuild
    #[serde(default)]
    pub progress: Vec<PlaybackProgress>,
    #[serde(default)]
    pub events: Vec<ListeningEvent>,
    #[serde(default)]
    pub sessions: Vec<ListeningSession>,
}

impl LibrarySnapshot {
    /// Load a snapshot into fresh stores
    pub async fn into_stores(self) -> Result<(MemoryStore, MemoryEventStore)> {
        let store = MemoryStore::new();
        let events = MemoryEventStore::new();
        self.apply(&store, &events).await?;
        Ok((store, events))
    }

    /// Capture the current store contents, the inverse of [`Self::apply`]
    pub async fn capture(store: &MemoryStore, events: &MemoryEventStore) -> Result<Self> {
        Ok(Self {
            server: store.server_settings().await?,
            users: store.users().list_all().await?,
            libraries: store.libraries().list_all().await?,
            contributors: store.contributors().list_all().await?,
            series: store.series().list_all().await?,
            tags: store.tags().list_all().await?,
            genres: store.genre_tree().await?,
            books: store.books().list_all().await?,
            collections: store.collections().list_all().await?,
            collection_shares: store.collection_shares().list_all().await?,
            shelves: store.shelves().list_all().await?,
            activities: store.activities().list_all().await?,
            profiles: store.profiles().list_all().await?,
            progress: store.progress().list_all().await?,
            events: events.list_events().await?,
            sessions: events.list_sessions().await?,
        })
    }

    /// Load a snapshot into existing stores
    pub async fn apply(&self, store: &MemoryStore, events: &MemoryEventStore) -> Result<()> {
        if let Some(server) = &self.server {
            store.put_server_settings(server).await?;
        }
        for u in &self.users {
            store.users().put(u).await?;
        }
        for l in &self.libraries {
            store.libraries().put(l).await?;
        }
        for c in &self.contributors {
            store.contributors().put(c).await?;
        }
        for s in &self.series {
            store.series().put(s).await?;
        }
        for t in &self.tags {
            store.tags().put(t).await?;
        }
        if !self.genres.is_empty() {
            store.put_genre_tree(&self.genres).await?;
        }
        for b in &self.books {
            store.books().put(b).await?;
        }
        for c in &self.collections {
            store.collections().put(c).await?;
        }
        for s in &self.collection_shares {
            store.collection_shares().put(s).await?;
        }
        for s in &self.shelves {
            store.shelves().put(s).await?;
        }
        for a in &self.activities {
            store.activities().put(a).await?;
        }
        for p in &self.profiles {
            store.profiles().put(p).await?;
        }
        for p in &self.progress {
            store.progress().put(p).await?;
        }
        for e in &self.events {
            events.append_event(e).await?;
        }
        for s in &self.sessions {
            events.append_session(s).await?;
        }
        Ok(())
    }
}
