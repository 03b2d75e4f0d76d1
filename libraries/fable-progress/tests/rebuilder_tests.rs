//! Integration tests for the progress rebuilder

use fable_core::{
    Book, BookId, EntityCollection, EventStore, EventSource, LibraryStore, ListeningEvent,
    PlaybackProgress, UserId,
};
use fable_progress::{AuthoritativeFinishes, ProgressRebuilder};
use fable_store_memory::{MemoryEventStore, MemoryStore};

fn test_book(id: &str, duration_ms: i64) -> Book {
    let mut book = Book::new("lib-1", format!("Book {id}"), format!("/books/{id}"));
    book.id = BookId::new(id);
    book.duration_ms = duration_ms;
    book
}

fn event(
    user: &str,
    book: &str,
    start_pos: i64,
    end_pos: i64,
    duration: i64,
    started_at: i64,
) -> ListeningEvent {
    let mut ev = ListeningEvent::new(UserId::new(user), BookId::new(book), start_pos, end_pos);
    ev.duration_ms = duration;
    ev.started_at = started_at;
    ev.ended_at = started_at + duration;
    ev.source = EventSource::Playback;
    ev
}

async fn get_progress(store: &MemoryStore, user: &str, book: &str) -> PlaybackProgress {
    let key = PlaybackProgress::key(&UserId::new(user), &BookId::new(book));
    store
        .progress()
        .get(&key)
        .await
        .unwrap()
        .expect("progress record should exist")
}

#[tokio::test]
async fn first_event_seeds_progress() {
    let store = MemoryStore::new();
    let events = MemoryEventStore::new();
    store.books().put(&test_book("b1", 3_600_000)).await.unwrap();
    events
        .append_event(&event("u1", "b1", 0, 60_000, 60_000, 1_000))
        .await
        .unwrap();

    let rebuilder = ProgressRebuilder::new(&events, store.books(), store.progress());
    let summary = rebuilder.rebuild_all().await.unwrap();

    assert_eq!(summary.pairs_rebuilt, 1);
    assert_eq!(summary.events_folded, 1);
    let progress = get_progress(&store, "u1", "b1").await;
    assert_eq!(progress.current_position_ms, 60_000);
    assert_eq!(progress.time_listened_ms, 60_000);
    assert_eq!(progress.started_at, 1_000);
    assert!(!progress.is_finished);
}

#[tokio::test]
async fn rewind_never_regresses_position_but_still_accumulates_time() {
    let store = MemoryStore::new();
    let events = MemoryEventStore::new();
    store.books().put(&test_book("b1", 3_600_000)).await.unwrap();

    // Listen to 500s, then rewind and re-listen an earlier section.
    events
        .append_event(&event("u1", "b1", 0, 500_000, 500_000, 1_000))
        .await
        .unwrap();
    events
        .append_event(&event("u1", "b1", 100_000, 200_000, 100_000, 600_000))
        .await
        .unwrap();

    let rebuilder = ProgressRebuilder::new(&events, store.books(), store.progress());
    rebuilder.rebuild_all().await.unwrap();

    let progress = get_progress(&store, "u1", "b1").await;
    assert_eq!(progress.current_position_ms, 500_000, "position must not regress");
    assert_eq!(progress.time_listened_ms, 600_000, "rewound span still counts as listening");
}

#[tokio::test]
async fn finished_at_exactly_99_percent_but_not_below() {
    let store = MemoryStore::new();
    let events = MemoryEventStore::new();
    store.books().put(&test_book("b1", 1_000_000)).await.unwrap();
    store.books().put(&test_book("b2", 1_000_000)).await.unwrap();

    // 99.0% of b1, 98.9% of b2.
    events
        .append_event(&event("u1", "b1", 0, 990_000, 990_000, 1_000))
        .await
        .unwrap();
    events
        .append_event(&event("u1", "b2", 0, 989_000, 989_000, 1_000))
        .await
        .unwrap();

    let rebuilder = ProgressRebuilder::new(&events, store.books(), store.progress());
    rebuilder.rebuild_all().await.unwrap();

    let at_threshold = get_progress(&store, "u1", "b1").await;
    assert!(at_threshold.is_finished);
    assert!(at_threshold.finished_at.is_some());

    let below_threshold = get_progress(&store, "u1", "b2").await;
    assert!(!below_threshold.is_finished);
    assert!(below_threshold.finished_at.is_none());
}

#[tokio::test]
async fn rebuild_is_idempotent() {
    let store = MemoryStore::new();
    let events = MemoryEventStore::new();
    store.books().put(&test_book("b1", 3_600_000)).await.unwrap();
    events
        .append_event(&event("u1", "b1", 0, 250_000, 250_000, 1_000))
        .await
        .unwrap();
    events
        .append_event(&event("u1", "b1", 250_000, 700_000, 450_000, 300_000))
        .await
        .unwrap();

    let rebuilder = ProgressRebuilder::new(&events, store.books(), store.progress());
    rebuilder.rebuild_all().await.unwrap();
    let mut first = get_progress(&store, "u1", "b1").await;

    rebuilder.rebuild_all().await.unwrap();
    let mut second = get_progress(&store, "u1", "b1").await;

    // updated_at is wall-clock bookkeeping, excluded from the contract.
    first.updated_at = 0;
    second.updated_at = 0;
    assert_eq!(first, second);
}

#[tokio::test]
async fn orphaned_events_are_skipped_and_counted() {
    let store = MemoryStore::new();
    let events = MemoryEventStore::new();
    store.books().put(&test_book("b1", 3_600_000)).await.unwrap();
    events
        .append_event(&event("u1", "b1", 0, 60_000, 60_000, 1_000))
        .await
        .unwrap();
    // Two events for a book that no longer exists.
    events
        .append_event(&event("u1", "gone", 0, 60_000, 60_000, 1_000))
        .await
        .unwrap();
    events
        .append_event(&event("u1", "gone", 60_000, 120_000, 60_000, 62_000))
        .await
        .unwrap();

    let rebuilder = ProgressRebuilder::new(&events, store.books(), store.progress());
    let summary = rebuilder.rebuild_all().await.unwrap();

    assert_eq!(summary.pairs_rebuilt, 1);
    assert_eq!(summary.orphaned_events, 2);
    let key = PlaybackProgress::key(&UserId::new("u1"), &BookId::new("gone"));
    assert!(store.progress().get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn authoritative_finish_survives_recomputation() {
    let store = MemoryStore::new();
    let events = MemoryEventStore::new();
    // Duration unknown at rebuild time: the computed finished flag is false.
    store.books().put(&test_book("b1", 0)).await.unwrap();
    events
        .append_event(&event("u1", "b1", 0, 300_000, 300_000, 1_000))
        .await
        .unwrap();

    let mut authoritative = AuthoritativeFinishes::new();
    let key = PlaybackProgress::key(&UserId::new("u1"), &BookId::new("b1"));
    authoritative.insert(key, 42_000);

    let rebuilder = ProgressRebuilder::new(&events, store.books(), store.progress());
    rebuilder
        .rebuild_for_users(&[UserId::new("u1")], &authoritative)
        .await
        .unwrap();

    let progress = get_progress(&store, "u1", "b1").await;
    assert!(progress.is_finished, "authoritative finish must not be downgraded");
    assert_eq!(progress.finished_at, Some(42_000));
}

#[tokio::test]
async fn rebuild_for_user_ignores_other_users() {
    let store = MemoryStore::new();
    let events = MemoryEventStore::new();
    store.books().put(&test_book("b1", 3_600_000)).await.unwrap();
    events
        .append_event(&event("u1", "b1", 0, 60_000, 60_000, 1_000))
        .await
        .unwrap();
    events
        .append_event(&event("u2", "b1", 0, 90_000, 90_000, 1_000))
        .await
        .unwrap();

    let rebuilder = ProgressRebuilder::new(&events, store.books(), store.progress());
    let summary = rebuilder.rebuild_for_user(&UserId::new("u1")).await.unwrap();

    assert_eq!(summary.pairs_rebuilt, 1);
    let key = PlaybackProgress::key(&UserId::new("u2"), &BookId::new("b1"));
    assert!(store.progress().get(&key).await.unwrap().is_none());
}
