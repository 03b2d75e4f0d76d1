//! Export/restore round-trip tests

mod test_helpers;

use fable_archive::{
    ArchiveExporter, ArchiveImporter, ArchiveReader, ExportOptions, MergeStrategy, RestoreMode,
    RestoreOptions,
};
use fable_core::{EntityCollection, EventStore, LibraryStore, PlaybackProgress};
use fable_store_memory::{MemoryEventStore, MemoryStore};
use test_helpers::seeded_library;
use tokio_util::sync::CancellationToken;

async fn export_seeded(dir: &std::path::Path) -> (MemoryStore, MemoryEventStore, std::path::PathBuf) {
    let (store, events) = seeded_library().await;
    let dest = dir.join("library.fab");
    let exporter = ArchiveExporter::new(&store, &events, None);
    let result = exporter
        .export(&dest, &ExportOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.path, dest);
    (store, events, dest)
}

#[tokio::test]
async fn manifest_counts_match_exported_collections() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, _events, path) = export_seeded(dir.path()).await;

    let mut reader = ArchiveReader::open(&path).unwrap();
    let manifest = reader.read_manifest().unwrap();

    assert_eq!(manifest.count("users"), 2);
    assert_eq!(manifest.count("books"), 2);
    assert_eq!(manifest.count("contributors"), 2);
    assert_eq!(manifest.count("libraries"), 1);
    assert_eq!(manifest.count("collections"), 1);
    assert_eq!(manifest.count("genres"), 2);
    assert_eq!(manifest.count("events"), 2);
    assert!(manifest.includes_events);
    assert!(manifest.includes_settings);
    assert_eq!(manifest.server_name, "test-server");
}

#[tokio::test]
async fn full_restore_into_empty_store_reproduces_the_library() {
    let dir = tempfile::tempdir().unwrap();
    let (original_store, original_events, path) = export_seeded(dir.path()).await;

    let store = MemoryStore::new();
    let events = MemoryEventStore::new();
    let importer = ArchiveImporter::new(&store, &events, None);
    let options = RestoreOptions {
        mode: RestoreMode::Full,
        strategy: MergeStrategy::KeepBackup,
        dry_run: false,
    };
    let result = importer
        .restore(&path, &options, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.issues.is_empty(), "issues: {:?}", result.issues);
    assert_eq!(result.imported_count("users"), 2);
    assert_eq!(result.imported_count("books"), 2);
    assert_eq!(result.imported_count("events"), 2);

    // Field-level equality for every restored record.
    assert_eq!(
        store.users().list_all().await.unwrap(),
        original_store.users().list_all().await.unwrap()
    );
    assert_eq!(
        store.books().list_all().await.unwrap(),
        original_store.books().list_all().await.unwrap()
    );
    assert_eq!(
        store.contributors().list_all().await.unwrap(),
        original_store.contributors().list_all().await.unwrap()
    );
    assert_eq!(
        store.genre_tree().await.unwrap(),
        original_store.genre_tree().await.unwrap()
    );
    assert_eq!(
        events.list_events().await.unwrap(),
        original_events.list_events().await.unwrap()
    );

    // Progress was recomputed from the replayed log, never copied.
    let progress = store.progress().list_all().await.unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].current_position_ms, 1_500_000);
    assert_eq!(progress[0].time_listened_ms, 1_500_000);
}

#[tokio::test]
async fn deleted_admin_is_recreated_by_full_restore() {
    let dir = tempfile::tempdir().unwrap();
    let (store, events, path) = export_seeded(dir.path()).await;

    // Simulate losing the admin account after the backup was taken.
    let admin = store.users().get("user-admin").await.unwrap().unwrap();
    store.wipe_all().await.unwrap();

    let importer = ArchiveImporter::new(&store, &events, None);
    let options = RestoreOptions {
        mode: RestoreMode::Full,
        strategy: MergeStrategy::KeepBackup,
        dry_run: false,
    };
    importer
        .restore(&path, &options, &CancellationToken::new())
        .await
        .unwrap();

    let restored = store.users().get("user-admin").await.unwrap().unwrap();
    assert_eq!(restored.email, admin.email);
    assert_eq!(restored.display_name, admin.display_name);
    assert!(restored.is_root);
}

#[tokio::test]
async fn export_is_atomic_no_partial_file_left_on_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let (store, events) = seeded_library().await;
    let dest = dir.path().join("library.fab");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let exporter = ArchiveExporter::new(&store, &events, None);
    let err = exporter
        .export(&dest, &ExportOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, fable_archive::ArchiveError::Cancelled));

    assert!(!dest.exists());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "temp files must be cleaned up");
}

#[tokio::test]
async fn checksum_matches_final_file_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let (store, events) = seeded_library().await;
    let dest = dir.path().join("library.fab");
    let exporter = ArchiveExporter::new(&store, &events, None);
    let result = exporter
        .export(&dest, &ExportOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let recomputed = fable_archive::codec::file_checksum(&dest).unwrap();
    assert_eq!(result.checksum, recomputed);
    assert_eq!(result.size_bytes, std::fs::metadata(&dest).unwrap().len());
}

#[tokio::test]
async fn history_can_be_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let (store, events) = seeded_library().await;
    let dest = dir.path().join("no-history.fab");
    let options = ExportOptions {
        include_history: false,
        include_images: false,
    };
    let exporter = ArchiveExporter::new(&store, &events, None);
    exporter
        .export(&dest, &options, &CancellationToken::new())
        .await
        .unwrap();

    let mut reader = ArchiveReader::open(&dest).unwrap();
    let manifest = reader.read_manifest().unwrap();
    assert!(!manifest.includes_events);
    assert!(reader
        .read_records::<PlaybackProgress>("listening/events.jsonl")
        .unwrap()
        .is_none());
}
