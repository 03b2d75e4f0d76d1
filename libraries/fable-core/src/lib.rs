//! Fable Core
//!
//! Domain types, traits, and error handling for the Fable audiobook library
//! engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `User`, `Book`, `ListeningEvent`, `PlaybackProgress`, etc.
//! - **Store Traits**: `LibraryStore`, `EventStore`, `EntityCollection`
//! - **Error Handling**: Unified `FableError` and `Result` types
//!
//! The storage engine itself is an external collaborator: Fable consumes the
//! traits in [`store`] and never assumes a particular backend.

#![forbid(unsafe_code)]

pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{FableError, Result};
pub use store::{AppendOutcome, EntityCollection, EventStore, LibraryStore};

// Export all types
pub use types::{
    Activity, Book, BookId, Collection, CollectionShare, Contributor, ContributorRole, DeviceInfo,
    EventId, EventSource, Genre, Library, LibraryEntity, ListeningEvent, ListeningSession, Payload,
    PlaybackProgress, Profile, Series, ServerSettings, Shelf, Tag, User, UserId,
};
