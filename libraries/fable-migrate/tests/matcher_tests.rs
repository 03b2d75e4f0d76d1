//! Entity matcher tests: tier ordering, confidence levels, ambiguity handling

mod test_helpers;

use fable_core::{EntityCollection, LibraryStore};
use fable_migrate::matcher::{match_book, match_user};
use fable_migrate::{MatchConfidence, MatchIndex, MatcherConfig};
use test_helpers::{foreign_book, foreign_user, seeded_local};

async fn seeded_index() -> MatchIndex {
    let (store, _events) = seeded_local().await;
    MatchIndex::build(&store).await.unwrap()
}

#[tokio::test]
async fn admin_override_wins_over_every_other_tier() {
    let index = seeded_index().await;
    let mut config = MatcherConfig::default();
    config
        .book_overrides
        .insert("fb-1".to_string(), "book-lefthand".to_string());

    // The external ID points at the other book; the override still wins.
    let mut foreign = foreign_book("fb-1", "The Dispossessed", 10_000.0);
    foreign.external_id = Some("B000ASIN1".to_string());

    let m = match_book(&foreign, &index, &config);
    assert_eq!(m.local_id.as_deref(), Some("book-lefthand"));
    assert_eq!(m.confidence, MatchConfidence::Definitive);
}

#[tokio::test]
async fn external_id_match_is_definitive() {
    let index = seeded_index().await;
    let mut foreign = foreign_book("fb-1", "Completely Different Title", 500.0);
    foreign.external_id = Some("B000ASIN1".to_string());

    let m = match_book(&foreign, &index, &MatcherConfig::default());
    assert_eq!(m.local_id.as_deref(), Some("book-dispossessed"));
    assert_eq!(m.confidence, MatchConfidence::Definitive);
}

#[tokio::test]
async fn identical_path_match_is_strong() {
    let index = seeded_index().await;
    let mut foreign = foreign_book("fb-1", "Renamed On The Other Side", 500.0);
    foreign.path = Some("/audiobooks/book-lefthand".to_string());

    let m = match_book(&foreign, &index, &MatcherConfig::default());
    assert_eq!(m.local_id.as_deref(), Some("book-lefthand"));
    assert_eq!(m.confidence, MatchConfidence::Strong);
}

#[tokio::test]
async fn disabled_strategies_are_skipped() {
    let index = seeded_index().await;
    let config = MatcherConfig {
        match_by_external_id: false,
        match_by_path: false,
        match_by_fuzzy_title: false,
        ..MatcherConfig::default()
    };

    let mut foreign = foreign_book("fb-1", "The Dispossessed", 10_000.0);
    foreign.external_id = Some("B000ASIN1".to_string());
    foreign.path = Some("/audiobooks/book-dispossessed".to_string());

    let m = match_book(&foreign, &index, &config);
    assert_eq!(m.confidence, MatchConfidence::None);
    assert!(m.local_id.is_none());
}

#[tokio::test]
async fn exact_title_author_and_duration_is_strong() {
    let index = seeded_index().await;
    // Article difference disappears under normalization; duration matches.
    let foreign = foreign_book("fb-1", "Left Hand of Darkness", 8_000.0);

    let m = match_book(&foreign, &index, &MatcherConfig::default());
    assert_eq!(m.local_id.as_deref(), Some("book-lefthand"));
    assert_eq!(m.confidence, MatchConfidence::Strong);
    assert!(m.confidence.should_auto_import());
}

#[tokio::test]
async fn loose_duration_match_is_only_weak() {
    let index = seeded_index().await;
    // 100s off: inside the 2% tolerance but past the strong-match window.
    let foreign = foreign_book("fb-1", "The Left Hand of Darkness", 8_100.0);

    let m = match_book(&foreign, &index, &MatcherConfig::default());
    assert_eq!(m.local_id.as_deref(), Some("book-lefthand"));
    assert_eq!(m.confidence, MatchConfidence::Weak);
    assert!(!m.confidence.should_auto_import());
}

#[tokio::test]
async fn wrong_author_blocks_fuzzy_match_but_yields_suggestions() {
    let index = seeded_index().await;
    let mut foreign = foreign_book("fb-1", "The Left Hand of Darkness", 8_000.0);
    foreign.authors = vec!["Somebody Else".to_string()];

    let m = match_book(&foreign, &index, &MatcherConfig::default());
    assert_eq!(m.confidence, MatchConfidence::None);
    assert!(m.local_id.is_none());
    assert!(!m.suggestions.is_empty());
    assert_eq!(m.suggestions[0].local_id, "book-lefthand");
}

#[tokio::test]
async fn duration_far_outside_tolerance_blocks_fuzzy_match() {
    let index = seeded_index().await;
    // 20% off, far past max(2%, 60s).
    let foreign = foreign_book("fb-1", "The Left Hand of Darkness", 6_400.0);

    let m = match_book(&foreign, &index, &MatcherConfig::default());
    assert_eq!(m.confidence, MatchConfidence::None);
}

#[tokio::test]
async fn unique_email_match_is_definitive_and_case_insensitive() {
    let (store, _events) = seeded_local().await;
    let locals = store.users().list_all().await.unwrap();

    let foreign = foreign_user("fu-1", "whatever", Some("ANNA@example.com"));
    let m = match_user(&foreign, &locals, &MatcherConfig::default());
    assert_eq!(m.local_id.as_deref(), Some("user-anna"));
    assert_eq!(m.confidence, MatchConfidence::Definitive);
}

#[tokio::test]
async fn unique_name_match_is_strong() {
    let (store, _events) = seeded_local().await;
    let locals = store.users().list_all().await.unwrap();

    let foreign = foreign_user("fu-1", "ben", None);
    let m = match_user(&foreign, &locals, &MatcherConfig::default());
    assert_eq!(m.local_id.as_deref(), Some("user-ben"));
    assert_eq!(m.confidence, MatchConfidence::Strong);
}

#[tokio::test]
async fn ambiguous_name_match_is_demoted_to_review() {
    let (store, _events) = seeded_local().await;

    let mut smith = fable_core::User::new("smith@example.com", "Anna Smith");
    smith.id = fable_core::UserId::new("user-smith");
    store.users().put(&smith).await.unwrap();
    let mut smyth = fable_core::User::new("smyth@example.com", "Anna Smyth");
    smyth.id = fable_core::UserId::new("user-smyth");
    store.users().put(&smyth).await.unwrap();

    let locals = store.users().list_all().await.unwrap();
    let foreign = foreign_user("fu-1", "Anna Smith", None);

    // Two locals clear the similarity bar; picking one silently would be
    // wrong, so both become suggestions instead.
    let m = match_user(&foreign, &locals, &MatcherConfig::default());
    assert_eq!(m.confidence, MatchConfidence::None);
    assert!(m.local_id.is_none());
    assert_eq!(m.suggestions.len(), 2);
}

#[tokio::test]
async fn user_override_wins_over_email() {
    let (store, _events) = seeded_local().await;
    let locals = store.users().list_all().await.unwrap();

    let mut config = MatcherConfig::default();
    config
        .user_overrides
        .insert("fu-1".to_string(), "user-ben".to_string());

    let foreign = foreign_user("fu-1", "anna", Some("anna@example.com"));
    let m = match_user(&foreign, &locals, &config);
    assert_eq!(m.local_id.as_deref(), Some("user-ben"));
    assert_eq!(m.confidence, MatchConfidence::Definitive);
}

#[test]
fn confidence_levels_are_ordered() {
    assert!(MatchConfidence::None < MatchConfidence::Weak);
    assert!(MatchConfidence::Weak < MatchConfidence::Strong);
    assert!(MatchConfidence::Strong < MatchConfidence::Definitive);

    assert!(!MatchConfidence::None.should_auto_import());
    assert!(!MatchConfidence::Weak.should_auto_import());
    assert!(MatchConfidence::Strong.should_auto_import());
    assert!(MatchConfidence::Definitive.should_auto_import());
}
