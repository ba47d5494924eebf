use anyhow::{bail, Result};
use async_trait::async_trait;
use gdemu_sync_lib::core::comparator::{Classification, GameComparator};
use gdemu_sync_lib::core::scanner::{GameScanner, ScanIssue};
use gdemu_sync_lib::core::slots::SlotAllocator;
use gdemu_sync_lib::models::SyncStatus;
use gdemu_sync_lib::storage::{LocalStorage, Storage};
use gdemu_sync_lib::{ScanSession, SyncEngine};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Raw first sector of a track with `title` in the boot header
fn track_with_title(title: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 2352];
    data[16..32].copy_from_slice(b"SEGA SEGAKATANA ");
    data[144..144 + title.len()].copy_from_slice(title);
    data
}

fn make_game(folder: &Path, title: &str, padding: usize) {
    make_game_raw(folder, title.as_bytes(), padding);
}

fn make_game_raw(folder: &Path, title: &[u8], padding: usize) {
    fs::create_dir_all(folder).unwrap();
    fs::write(folder.join("disc.gdi"), b"1\n1 0 4 2352 track01.bin 0\n").unwrap();
    fs::write(folder.join("track01.bin"), track_with_title(title)).unwrap();
    if padding > 0 {
        fs::write(folder.join("track02.raw"), vec![0u8; padding]).unwrap();
    }
}

/// Local storage that fails every copy into one destination folder
struct FailingStorage {
    inner: LocalStorage,
    fail_into: PathBuf,
    attempts: AtomicUsize,
}

#[async_trait]
impl Storage for FailingStorage {
    async fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.inner.list_dirs(dir).await
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.inner.list_files(dir).await
    }

    async fn read_range(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.inner.read_range(path, offset, length).await
    }

    async fn dir_size(&self, dir: &Path) -> Result<u64> {
        self.inner.dir_size(dir).await
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path).await
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        self.inner.create_dir(path).await
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if to.starts_with(&self.fail_into) {
            bail!("simulated I/O error writing {}", to.display());
        }
        self.inner.copy_file(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        self.inner.remove_file(path).await
    }

    async fn available_space(&self, path: &Path) -> Result<u64> {
        self.inner.available_space(path).await
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[tokio::test]
async fn matched_game_is_skipped_and_new_one_takes_slot_two() {
    let library = TempDir::new().unwrap();
    let card = TempDir::new().unwrap();
    make_game(&library.path().join("A"), "SONIC ADVENTURE", 4096);
    make_game(&library.path().join("B"), "CRAZY TAXI", 1024);
    make_game(&card.path().join("0003"), "SONIC ADVENTURE", 4096);

    let storage = Arc::new(LocalStorage::new());
    let session = ScanSession::scan(
        storage.as_ref(),
        &GameScanner::new(),
        library.path(),
        card.path(),
    )
    .await;

    let reconciled = session.reconcile();
    let by_folder = |folder: &str| {
        reconciled
            .iter()
            .find(|r| r.pc.game.folder_name == folder)
            .map(|r| r.classification)
    };
    assert_eq!(by_folder("A"), Some(Classification::Matched));
    assert_eq!(by_folder("B"), Some(Classification::Absent));

    let plan = session.plan(&session.select(&[]));
    let engine = SyncEngine::new(storage.clone());
    let report = engine
        .run_copy(&plan, card.path(), session.occupied_slots(), None)
        .await;

    assert!(report.is_complete());
    assert_eq!(report.copied.len(), 1);
    assert_eq!(report.copied[0].slot, 2);
    assert!(card.path().join("0002").join("track01.bin").exists());
}

#[test]
fn next_free_slot_after_a_full_run() {
    let occupied: BTreeSet<u16> = [2, 3, 4, 5].into_iter().collect();
    assert_eq!(SlotAllocator::find_available_slot(&occupied, 2), Some(6));
}

#[tokio::test]
async fn copy_failure_stops_the_batch() {
    let library = TempDir::new().unwrap();
    let card = TempDir::new().unwrap();
    make_game(&library.path().join("1"), "GAME ONE", 0);
    make_game(&library.path().join("2"), "GAME TWO", 0);
    make_game(&library.path().join("3"), "GAME THREE", 0);

    let storage = Arc::new(FailingStorage {
        inner: LocalStorage::new(),
        fail_into: card.path().join("0003"),
        attempts: AtomicUsize::new(0),
    });

    let scanner = GameScanner::new();
    let mut library_scan = scanner.scan_library(storage.as_ref(), library.path()).await;
    library_scan
        .entries
        .sort_by(|a, b| a.game.folder_name.cmp(&b.game.folder_name));
    let device_scan = scanner.scan_device(storage.as_ref(), card.path()).await;

    let plan = GameComparator::build_plan(&GameComparator::reconcile(
        &library_scan.entries,
        &device_scan.entries,
    ));
    assert_eq!(plan.len(), 3);

    let engine = SyncEngine::new(storage.clone());
    let report = engine.run_copy(&plan, card.path(), Vec::new(), None).await;

    assert_eq!(report.status, SyncStatus::Failed);
    assert_eq!(report.planned, 3);
    assert_eq!(report.completed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("GAME TWO"));
    // item 1 copies two files, item 2 fails on its first, item 3 is never tried
    assert_eq!(storage.attempts.load(Ordering::SeqCst), 3);
    assert!(!card.path().join("0004").exists());
}

#[tokio::test]
async fn missing_card_makes_every_game_absent() {
    let library = TempDir::new().unwrap();
    make_game(&library.path().join("A"), "SHENMUE", 0);
    make_game(&library.path().join("B"), "SOULCALIBUR", 0);
    let card = library.path().join("no-card");

    let storage = LocalStorage::new();
    let session = ScanSession::scan(&storage, &GameScanner::new(), library.path(), &card).await;

    assert!(session.device.entries.is_empty());
    assert_eq!(
        session.device.issues,
        vec![ScanIssue::PathInvalid { path: card.clone() }]
    );
    assert!(session.is_successful());
    assert!(session
        .reconcile()
        .iter()
        .all(|r| r.classification == Classification::Absent));
}

#[tokio::test]
async fn non_utf8_title_already_on_card_is_not_copied_again() {
    let library = TempDir::new().unwrap();
    let card = TempDir::new().unwrap();
    make_game_raw(&library.path().join("Pokemon"), b"POKEMON \xE9DITION", 0);
    make_game_raw(&card.path().join("0002"), b"POKEMON \xE9DITION", 0);

    let storage = LocalStorage::new();
    let session = ScanSession::scan(&storage, &GameScanner::new(), library.path(), card.path()).await;

    let reconciled = session.reconcile();
    assert_eq!(reconciled[0].classification, Classification::Matched);
    assert_eq!(reconciled[0].device.as_ref().map(|d| d.slot), Some(2));
    assert!(session.plan(&session.select(&[])).is_empty());
}
