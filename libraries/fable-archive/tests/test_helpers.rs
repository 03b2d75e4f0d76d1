//! Test helpers and fixtures for archive integration tests

use fable_core::{
    Book, BookId, Collection, Contributor, ContributorRole, EntityCollection, EventStore, Genre,
    Library, LibraryStore, ListeningEvent, ServerSettings, User, UserId,
};
use fable_store_memory::{MemoryEventStore, MemoryStore};

/// A store pre-seeded with a small but complete library:
/// two users (one admin), one library, two contributors, two books,
/// a genre tree, a collection, and some listening history.
pub async fn seeded_library() -> (MemoryStore, MemoryEventStore) {
    let store = MemoryStore::new();
    let events = MemoryEventStore::new();

    store
        .put_server_settings(&ServerSettings::new("test-server"))
        .await
        .unwrap();

    let mut admin = User::new("admin@example.com", "Admin");
    admin.id = UserId::new("user-admin");
    admin.is_root = true;
    store.users().put(&admin).await.unwrap();

    let mut reader = User::new("reader@example.com", "Reader");
    reader.id = UserId::new("user-reader");
    store.users().put(&reader).await.unwrap();

    store
        .libraries()
        .put(&Library {
            id: "lib-1".into(),
            name: "Main".into(),
            root_path: "/audiobooks".into(),
            created_at: 1_000,
            updated_at: 1_000,
        })
        .await
        .unwrap();

    let mut author = Contributor::new("Ursula K. Le Guin", ContributorRole::Author);
    author.id = "contrib-author".into();
    store.contributors().put(&author).await.unwrap();

    let mut narrator = Contributor::new("A Narrator", ContributorRole::Narrator);
    narrator.id = "contrib-narrator".into();
    store.contributors().put(&narrator).await.unwrap();

    store
        .put_genre_tree(&[{
            let mut fiction = Genre::new("g-fiction", "Fiction");
            fiction.children.push(Genre::new("g-sf", "Science Fiction"));
            fiction
        }])
        .await
        .unwrap();

    for (id, title, duration) in [
        ("book-1", "The Dispossessed", 10_000_000),
        ("book-2", "The Left Hand of Darkness", 8_000_000),
    ] {
        let mut book = Book::new("lib-1", title, format!("/audiobooks/{id}"));
        book.id = BookId::new(id);
        book.author_ids = vec!["contrib-author".into()];
        book.narrator_ids = vec!["contrib-narrator".into()];
        book.duration_ms = duration;
        store.books().put(&book).await.unwrap();
    }

    store
        .collections()
        .put(&Collection {
            id: "coll-1".into(),
            library_id: "lib-1".into(),
            owner_id: "user-admin".into(),
            name: "Favorites".into(),
            description: None,
            book_ids: vec!["book-1".into()],
            updated_at: 1_000,
            deleted_at: None,
        })
        .await
        .unwrap();

    events
        .append_event(&listening_event("evt-1", "user-reader", "book-1", 0, 600_000, 5_000))
        .await
        .unwrap();
    events
        .append_event(&listening_event(
            "evt-2",
            "user-reader",
            "book-1",
            600_000,
            1_500_000,
            700_000,
        ))
        .await
        .unwrap();

    (store, events)
}

/// Build an event with fixed timestamps so archives are deterministic
pub fn listening_event(
    id: &str,
    user: &str,
    book: &str,
    start_pos: i64,
    end_pos: i64,
    started_at: i64,
) -> ListeningEvent {
    let mut ev = ListeningEvent::new(UserId::new(user), BookId::new(book), start_pos, end_pos);
    ev.id = fable_core::EventId::new(id);
    ev.started_at = started_at;
    ev.ended_at = started_at + ev.duration_ms;
    ev.created_at = started_at;
    ev
}
