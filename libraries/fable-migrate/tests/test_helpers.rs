//! Test helpers and fixtures for migration integration tests

use fable_core::{
    Book, BookId, Contributor, ContributorRole, EntityCollection, Library, LibraryStore, User,
    UserId,
};
use fable_migrate::{ForeignBook, ForeignProgress, ForeignSession, ForeignUser};
use fable_store_memory::{MemoryEventStore, MemoryStore};

/// 2024-01-01T00:00:00Z
pub const T0: i64 = 1_704_067_200_000;
/// Five minutes later
pub const T0_PLUS_5M: i64 = T0 + 300_000;

/// A local library to migrate into: two users, one author, and two books.
/// "The Dispossessed" carries an external catalog ID; "The Left Hand of
/// Darkness" can only be matched by path or fuzzy title.
pub async fn seeded_local() -> (MemoryStore, MemoryEventStore) {
    let store = MemoryStore::new();
    let events = MemoryEventStore::new();

    let mut anna = User::new("anna@example.com", "Anna");
    anna.id = UserId::new("user-anna");
    store.users().put(&anna).await.unwrap();

    let mut ben = User::new("ben@example.com", "Ben");
    ben.id = UserId::new("user-ben");
    store.users().put(&ben).await.unwrap();

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
    author.id = "contrib-leguin".into();
    store.contributors().put(&author).await.unwrap();

    for (id, title, external_id, duration) in [
        ("book-dispossessed", "The Dispossessed", Some("B000ASIN1"), 10_000_000_i64),
        ("book-lefthand", "The Left Hand of Darkness", None, 8_000_000),
    ] {
        let mut book = Book::new("lib-1", title, format!("/audiobooks/{id}"));
        book.id = BookId::new(id);
        book.author_ids = vec!["contrib-leguin".into()];
        book.external_id = external_id.map(String::from);
        book.duration_ms = duration;
        store.books().put(&book).await.unwrap();
    }

    (store, events)
}

pub fn foreign_user(id: &str, username: &str, email: Option<&str>) -> ForeignUser {
    ForeignUser {
        id: id.to_string(),
        username: username.to_string(),
        email: email.map(String::from),
    }
}

pub fn foreign_book(id: &str, title: &str, duration_sec: f64) -> ForeignBook {
    ForeignBook {
        id: id.to_string(),
        title: title.to_string(),
        authors: vec!["Ursula K. Le Guin".to_string()],
        narrators: Vec::new(),
        path: None,
        external_id: None,
        duration_sec,
    }
}

pub fn foreign_session(
    id: &str,
    user_id: &str,
    book_id: &str,
    start_sec: f64,
    end_sec: f64,
) -> ForeignSession {
    ForeignSession {
        id: id.to_string(),
        user_id: user_id.to_string(),
        book_id: book_id.to_string(),
        start_sec,
        end_sec,
        duration_sec: end_sec - start_sec,
        playback_rate: None,
        started_at: T0,
        updated_at: T0_PLUS_5M,
    }
}

pub fn foreign_progress(user_id: &str, book_id: &str, position_sec: f64) -> ForeignProgress {
    ForeignProgress {
        user_id: user_id.to_string(),
        book_id: book_id.to_string(),
        position_sec,
        is_finished: false,
        finished_at: None,
        updated_at: T0_PLUS_5M,
    }
}
