//! Integration tests for mirrorsync
//!
//! These tests run whole sync cycles against real temporary trees and check
//! the replica with an independent `walkdir` snapshot.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use mirrorsync_io::{digest_bytes, LocalFileSystem};
use mirrorsync_sync::{
    sync, CancellationToken, CollectingEventSink, SyncEngine, SyncOptions,
};
use mirrorsync_tests::test_utils::{
    create_dir, create_tree, file_digests, generate_test_data, snapshot_tree, write_file,
    CorruptingFileSystem, SnapshotEntry,
};
use mirrorsync_types::{CompareMode, ErrorKind, FileSystem, SyncEvent, SyncPhase, WorkerCount};
use proptest::prelude::*;
use rstest::rstest;
use tempfile::TempDir;

struct Roots {
    _temp_dir: TempDir,
    source: std::path::PathBuf,
    replica: std::path::PathBuf,
}

fn roots() -> Roots {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source");
    let replica = temp_dir.path().join("replica");
    fs::create_dir_all(&source).unwrap();
    Roots {
        _temp_dir: temp_dir,
        source,
        replica,
    }
}

fn engine_with(fs: Arc<dyn FileSystem>, sink: Arc<CollectingEventSink>, workers: usize) -> SyncEngine {
    SyncEngine::with_components(
        fs,
        sink,
        SyncOptions::default().with_worker_count(WorkerCount::new(workers).unwrap()),
    )
}

/// A tree with nesting, an empty directory and files of several sizes
fn populate_mixed_tree(root: &Path) {
    create_tree(
        root,
        &[
            ("readme.txt", "hello"),
            ("empty.bin", ""),
            ("docs/guide.md", "# guide"),
            ("docs/api/index.html", "<html></html>"),
        ],
    );
    write_file(root, "data/a/b/c/deep.dat", generate_test_data(4096, 1));
    write_file(root, "data/large.dat", generate_test_data(300 * 1024, 2));
    create_dir(root, "logs/archive");
}

#[tokio::test]
async fn test_scenario_a_copies_into_empty_replica() {
    let roots = roots();
    for i in 0..5u64 {
        write_file(&roots.source, &format!("file{}.bin", i), generate_test_data(1024, i));
    }

    let outcome = sync(&roots.source, &roots.replica, 4).await.unwrap();

    assert_eq!(outcome.files_copied, 5);
    assert!(outcome.is_clean());
    let replica_files = file_digests(&snapshot_tree(&roots.replica));
    assert_eq!(replica_files.len(), 5);
    assert_eq!(replica_files, file_digests(&snapshot_tree(&roots.source)));
}

#[tokio::test]
async fn test_scenario_b_overwrites_changed_and_removes_stale() {
    let roots = roots();
    write_file(&roots.source, "a.txt", "content");
    write_file(&roots.replica, "a.txt", "old");
    write_file(&roots.replica, "b.txt", "stale");

    let outcome = sync(&roots.source, &roots.replica, 2).await.unwrap();

    assert_eq!(fs::read_to_string(roots.replica.join("a.txt")).unwrap(), "content");
    assert!(!roots.replica.join("b.txt").exists());
    assert_eq!(outcome.files_copied, 1);
    assert_eq!(outcome.files_removed, 1);
}

#[tokio::test]
async fn test_scenario_c_creates_intermediate_directories() {
    let roots = roots();
    write_file(&roots.source, "dir1/dir2/file.txt", "nested");

    let outcome = sync(&roots.source, &roots.replica, 1).await.unwrap();

    assert!(roots.replica.join("dir1").is_dir());
    assert!(roots.replica.join("dir1/dir2").is_dir());
    let copied = fs::read(roots.replica.join("dir1/dir2/file.txt")).unwrap();
    assert_eq!(digest_bytes(&copied), digest_bytes(b"nested"));
    assert_eq!(outcome.directories_created, 2);
}

#[tokio::test]
async fn test_scenario_d_removes_deleted_file_and_emptied_parent() {
    let roots = roots();
    write_file(&roots.source, "keep.txt", "keep");
    write_file(&roots.source, "old/only.txt", "soon gone");
    sync(&roots.source, &roots.replica, 2).await.unwrap();
    assert!(roots.replica.join("old/only.txt").exists());

    fs::remove_dir_all(roots.source.join("old")).unwrap();
    let outcome = sync(&roots.source, &roots.replica, 2).await.unwrap();

    assert!(!roots.replica.join("old/only.txt").exists());
    assert!(!roots.replica.join("old").exists());
    assert!(roots.replica.join("keep.txt").exists());
    assert_eq!(outcome.files_removed, 1);
    assert_eq!(outcome.directories_removed, 1);
}

#[tokio::test]
async fn test_deleted_file_keeps_parent_still_in_source() {
    let roots = roots();
    write_file(&roots.source, "dir/gone.txt", "x");
    write_file(&roots.source, "dir/stays.txt", "y");
    sync(&roots.source, &roots.replica, 2).await.unwrap();

    fs::remove_file(roots.source.join("dir/gone.txt")).unwrap();
    let outcome = sync(&roots.source, &roots.replica, 2).await.unwrap();

    assert!(!roots.replica.join("dir/gone.txt").exists());
    assert!(roots.replica.join("dir/stays.txt").exists());
    assert_eq!(outcome.directories_removed, 0);
}

#[tokio::test]
async fn test_replica_matches_source_exactly() {
    let roots = roots();
    populate_mixed_tree(&roots.source);
    write_file(&roots.replica, "docs/guide.md", "outdated");
    write_file(&roots.replica, "orphan/nested/file.txt", "orphan");
    create_dir(&roots.replica, "orphan/empty");
    write_file(&roots.replica, "readme.txt.bak", "backup");

    let outcome = sync(&roots.source, &roots.replica, 4).await.unwrap();

    assert!(outcome.is_clean(), "unexpected errors: {:?}", outcome.errors);
    assert_eq!(snapshot_tree(&roots.replica), snapshot_tree(&roots.source));
    assert_eq!(outcome.files_removed, 2);
    assert_eq!(outcome.directories_removed, 3);
}

#[tokio::test]
async fn test_second_cycle_is_idempotent() {
    let roots = roots();
    populate_mixed_tree(&roots.source);

    let first = sync(&roots.source, &roots.replica, 4).await.unwrap();
    assert_eq!(first.files_copied, 6);

    let second = sync(&roots.source, &roots.replica, 4).await.unwrap();
    assert_eq!(second.total_actions(), 0);
    assert_eq!(second.files_copied, 0);
    assert_eq!(second.directories_created, 0);
    assert_eq!(second.files_unchanged, 6);
    assert!(second.is_clean());
}

#[tokio::test]
async fn test_quick_check_cycle_is_idempotent() {
    let roots = roots();
    populate_mixed_tree(&roots.source);
    let engine = SyncEngine::new(SyncOptions::default().with_compare_mode(CompareMode::QuickCheck));

    let first = engine.sync(&roots.source, &roots.replica).await.unwrap();
    assert_eq!(first.files_copied, 6);

    let second = engine.sync(&roots.source, &roots.replica).await.unwrap();
    assert_eq!(second.total_actions(), 0);
    assert_eq!(second.files_unchanged, 6);
    assert_eq!(snapshot_tree(&roots.replica), snapshot_tree(&roots.source));
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(8)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replica_independent_of_worker_count(#[case] workers: usize) {
    let roots = roots();
    populate_mixed_tree(&roots.source);
    for i in 0..20u64 {
        write_file(&roots.source, &format!("bulk/{}.dat", i), generate_test_data(2048, 100 + i));
    }

    let outcome = sync(&roots.source, &roots.replica, workers).await.unwrap();

    assert_eq!(outcome.files_copied, 26);
    assert_eq!(snapshot_tree(&roots.replica), snapshot_tree(&roots.source));
}

#[tokio::test]
async fn test_corrupted_copy_reported_as_integrity_error() {
    let roots = roots();
    write_file(&roots.source, "good.txt", "fine");
    write_file(&roots.source, "nested/bad.txt", "will be corrupted");
    let sink = Arc::new(CollectingEventSink::new());
    let engine = engine_with(Arc::new(CorruptingFileSystem::new("bad.txt")), sink.clone(), 2);

    let outcome = engine.sync(&roots.source, &roots.replica).await.unwrap();

    assert_eq!(outcome.files_copied, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].kind, ErrorKind::Integrity);
    assert_eq!(outcome.errors[0].path.as_path(), Path::new("nested/bad.txt"));
    assert_eq!(
        sink.count(|e| matches!(e, SyncEvent::Copied { path, .. } if path.as_path() == Path::new("nested/bad.txt"))),
        0
    );
    assert_eq!(sink.count(|e| matches!(e, SyncEvent::Error(_))), 1);

    let good = fs::read(roots.replica.join("good.txt")).unwrap();
    assert_eq!(digest_bytes(&good), digest_bytes(b"fine"));

    // Without the fault the next cycle repairs the file
    let repaired = engine_with(Arc::new(LocalFileSystem::new()), sink, 2)
        .sync(&roots.source, &roots.replica)
        .await
        .unwrap();
    assert_eq!(repaired.files_copied, 1);
    assert!(repaired.is_clean());
    assert_eq!(snapshot_tree(&roots.replica), snapshot_tree(&roots.source));
}

#[tokio::test]
async fn test_cancelled_cycle_leaves_replica_orphans() {
    let roots = roots();
    populate_mixed_tree(&roots.source);
    write_file(&roots.replica, "orphan.txt", "still here");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let engine = SyncEngine::new(SyncOptions::default());
    let outcome = engine
        .sync_with_cancel(&roots.source, &roots.replica, &cancel)
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert!(!outcome.is_clean());
    assert_eq!(outcome.files_removed, 0);
    assert!(roots.replica.join("orphan.txt").exists());
    assert_eq!(engine.phase(), SyncPhase::Idle);

    // A later, uncancelled cycle finishes the job
    let outcome = engine.sync(&roots.source, &roots.replica).await.unwrap();
    assert!(outcome.is_clean());
    assert!(!roots.replica.join("orphan.txt").exists());
}

#[tokio::test]
async fn test_phases_reported_in_order() {
    let roots = roots();
    write_file(&roots.source, "a.txt", "a");
    let sink = Arc::new(CollectingEventSink::new());
    let engine = engine_with(Arc::new(LocalFileSystem::new()), sink.clone(), 2);

    engine.sync(&roots.source, &roots.replica).await.unwrap();

    let phases: Vec<SyncPhase> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            SyncEvent::PhaseChanged(phase) => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            SyncPhase::Scanning,
            SyncPhase::Copying,
            SyncPhase::Deleting,
            SyncPhase::Idle
        ]
    );
}

#[tokio::test]
async fn test_missing_source_is_fatal() {
    let roots = roots();
    let missing = roots.source.join("does-not-exist");

    let error = sync(&missing, &roots.replica, 2).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Path);
    assert!(error.is_fatal());
}

#[cfg(unix)]
#[tokio::test]
async fn test_source_symlinks_are_not_mirrored() {
    let roots = roots();
    write_file(&roots.source, "target.txt", "real");
    std::os::unix::fs::symlink(roots.source.join("target.txt"), roots.source.join("link.txt")).unwrap();
    write_file(&roots.replica, "link.txt", "orphaned copy");

    let outcome = sync(&roots.source, &roots.replica, 2).await.unwrap();

    assert!(outcome.is_clean());
    assert!(roots.replica.join("target.txt").is_file());
    assert!(!roots.replica.join("link.txt").exists());
    let replica = snapshot_tree(&roots.replica);
    assert!(replica.values().all(|entry| *entry != SnapshotEntry::Other));
}

#[tokio::test]
async fn test_file_named_like_temp_file_is_mirrored() {
    let roots = roots();
    write_file(&roots.source, "a.txt", "real");
    write_file(&roots.source, ".a.txt.mirrorsync-tmp", "lookalike");

    let first = sync(&roots.source, &roots.replica, 1).await.unwrap();
    assert_eq!(first.files_copied, 2);
    assert!(first.is_clean());
    assert_eq!(snapshot_tree(&roots.replica), snapshot_tree(&roots.source));

    let second = sync(&roots.source, &roots.replica, 1).await.unwrap();
    assert_eq!(second.total_actions(), 0);
    assert_eq!(second.files_unchanged, 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_source_dir_protects_replica_subtree() {
    use std::os::unix::fs::PermissionsExt;

    let roots = roots();
    write_file(&roots.source, "open.txt", "open");
    write_file(&roots.source, "locked/inner.txt", "inner");
    sync(&roots.source, &roots.replica, 2).await.unwrap();
    write_file(&roots.replica, "locked/replica-only.txt", "kept");

    let locked = roots.source.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores directory permissions
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let outcome = sync(&roots.source, &roots.replica, 2).await;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    let outcome = outcome.unwrap();

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].kind, ErrorKind::Io);
    assert_eq!(outcome.errors[0].path.as_path(), Path::new("locked"));
    assert_eq!(outcome.files_removed, 0);
    assert_eq!(outcome.directories_removed, 0);
    assert!(roots.replica.join("locked/inner.txt").is_file());
    assert!(roots.replica.join("locked/replica-only.txt").is_file());
    assert!(roots.replica.join("open.txt").is_file());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_any_tree_is_mirrored(
        files in prop::collection::btree_map(
            "[a-c]{1,2}(/[a-c]{1,2}){0,2}\\.txt",
            prop::collection::vec(any::<u8>(), 0..256),
            1..12,
        ),
        stale in prop::collection::btree_set("[d-f]{1,2}(/[d-f]{1,2}){0,1}\\.old", 0..4),
    ) {
        let roots = roots();
        for (path, content) in &files {
            write_file(&roots.source, path, content);
        }
        for path in &stale {
            write_file(&roots.replica, path, "stale");
        }

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let first = runtime.block_on(sync(&roots.source, &roots.replica, 3)).unwrap();
        prop_assert!(first.is_clean());
        prop_assert_eq!(first.files_copied, files.len() as u64);
        prop_assert_eq!(snapshot_tree(&roots.replica), snapshot_tree(&roots.source));

        let second = runtime.block_on(sync(&roots.source, &roots.replica, 3)).unwrap();
        prop_assert_eq!(second.total_actions(), 0);
    }
}
