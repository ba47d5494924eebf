use crate::core::comparator::{CopyTarget, PlannedCopy, SyncPlan};
use crate::core::slots::{
    slot_folder_name, SlotAllocator, DEFAULT_SLOT_WIDTH, DEFAULT_STARTING_SLOT, MAX_SLOT,
};
use crate::error::SyncError;
use crate::models::{
    CopiedGame, DeviceGameEntry, LogLevel, RemoveReport, SyncEvent, SyncReport, SyncStatus,
};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What a failed copy does to the rest of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CopyFailurePolicy {
    /// Stop at the first failed game
    #[default]
    StopBatch,
    /// Record the failure and go on, like deletions do
    Continue,
}

/// Copy batch settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// First slot considered for new games
    pub starting_slot: u16,
    /// Minimum digits in new slot folder names
    pub slot_width: usize,
    pub copy_failure_policy: CopyFailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            starting_slot: DEFAULT_STARTING_SLOT,
            slot_width: DEFAULT_SLOT_WIDTH,
            copy_failure_policy: CopyFailurePolicy::StopBatch,
        }
    }
}

/// Runs copy and delete batches against the SD card, one game at a time
pub struct SyncEngine {
    storage: Arc<dyn Storage>,
    config: SyncConfig,
    cancelled: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_config(storage, SyncConfig::default())
    }

    pub fn with_config(storage: Arc<dyn Storage>, config: SyncConfig) -> Self {
        Self {
            storage,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop after the game currently being processed
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Flag that can be set from another task
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn send(&self, tx: &Option<mpsc::Sender<SyncEvent>>, event: SyncEvent) {
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    async fn log(&self, tx: &Option<mpsc::Sender<SyncEvent>>, level: LogLevel, message: String) {
        self.send(tx, SyncEvent::log(level, message)).await;
    }

    /// Resolve the folder for one planned copy, allocating a slot if needed
    fn resolve_target(
        &self,
        item: &PlannedCopy,
        device_root: &Path,
        allocator: &mut SlotAllocator,
    ) -> Result<(u16, PathBuf), SyncError> {
        match &item.target {
            CopyTarget::Existing { slot, folder } => Ok((*slot, folder.clone())),
            CopyTarget::NewSlot => {
                let slot = allocator
                    .allocate()
                    .ok_or_else(|| SyncError::SlotSpaceExhausted {
                        from: self.config.starting_slot,
                        max: MAX_SLOT,
                    })?;
                let folder = device_root.join(slot_folder_name(slot, self.config.slot_width));
                Ok((slot, folder))
            }
        }
    }

    /// Execute a copy plan in order. `occupied` are the slots in use on the card.
    /// Never returns an error: failures end up in the report.
    pub async fn run_copy(
        &self,
        plan: &SyncPlan,
        device_root: &Path,
        occupied: impl IntoIterator<Item = u16>,
        progress_tx: Option<mpsc::Sender<SyncEvent>>,
    ) -> SyncReport {
        let start_time = chrono::Utc::now().timestamp();
        let run_id = uuid::Uuid::new_v4().to_string();
        let total = plan.len();

        self.cancelled.store(false, Ordering::SeqCst);
        info!(
            "copy run {}: {} game(s) to {} ({})",
            run_id,
            total,
            device_root.display(),
            self.storage.name()
        );

        self.log(
            &progress_tx,
            LogLevel::Info,
            format!("Copying {} game(s) to SD card...", total),
        )
        .await;
        self.send(
            &progress_tx,
            SyncEvent::BatchStarted {
                run_id: run_id.clone(),
                total,
            },
        )
        .await;

        let mut allocator = SlotAllocator::new(occupied, self.config.starting_slot);
        let mut copied = Vec::new();
        let mut errors = Vec::new();
        let mut bytes_copied = 0u64;
        let mut failed = false;
        let mut cancelled = false;

        for (index, item) in plan.items.iter().enumerate() {
            if self.is_cancelled() {
                info!("copy run {} cancelled before item {}", run_id, index + 1);
                cancelled = true;
                break;
            }

            let name = item.game.game.identity.to_string();
            self.send(
                &progress_tx,
                SyncEvent::ItemStarted {
                    index,
                    total,
                    name: name.clone(),
                },
            )
            .await;
            self.log(&progress_tx, LogLevel::Info, format!("Copying {}...", name))
                .await;

            let (slot, folder) = match self.resolve_target(item, device_root, &mut allocator) {
                Ok(target) => target,
                Err(e) => {
                    error!("{}", e);
                    errors.push(e.to_string());
                    self.log(
                        &progress_tx,
                        LogLevel::Error,
                        format!("You cannot have more than {} games on your SD card.", MAX_SLOT),
                    )
                    .await;
                    failed = true;
                    break;
                }
            };

            debug!(
                "{} -> {} ({:?})",
                item.game.game.full_path.display(),
                folder.display(),
                item.reason
            );

            match self
                .storage
                .copy_dir_contents(&item.game.game.full_path, &folder)
                .await
            {
                Ok(bytes) => {
                    bytes_copied += bytes;
                    copied.push(CopiedGame {
                        name: name.clone(),
                        slot,
                        folder,
                        bytes,
                    });
                    let completed = copied.len();
                    self.send(
                        &progress_tx,
                        SyncEvent::ItemFinished {
                            completed,
                            total,
                            name,
                        },
                    )
                    .await;
                    self.log(
                        &progress_tx,
                        LogLevel::Info,
                        format!("{}/{} games copied", completed, total),
                    )
                    .await;
                }
                Err(e) => {
                    let failure = SyncError::CopyFailure {
                        game: name,
                        reason: e.to_string(),
                    };
                    error!("{}", failure);
                    self.log(&progress_tx, LogLevel::Error, failure.to_string())
                        .await;
                    errors.push(failure.to_string());
                    failed = true;

                    if self.config.copy_failure_policy == CopyFailurePolicy::StopBatch {
                        break;
                    }
                }
            }

            // let the caller observe progress and cancellation between games
            tokio::task::yield_now().await;
        }

        let completed = copied.len();
        let status = if cancelled {
            SyncStatus::Cancelled
        } else if failed {
            SyncStatus::Failed
        } else {
            SyncStatus::Completed
        };

        if completed < total {
            self.log(
                &progress_tx,
                LogLevel::Error,
                format!("There was an error. {} games were copied.", completed),
            )
            .await;
        } else {
            self.log(&progress_tx, LogLevel::Success, "Games copied".to_string())
                .await;
        }

        info!(
            "copy run {} finished: {:?}, {}/{} copied, {} bytes",
            run_id, status, completed, total, bytes_copied
        );

        SyncReport {
            run_id,
            start_time,
            end_time: chrono::Utc::now().timestamp(),
            status,
            planned: total,
            completed,
            bytes_copied,
            copied,
            errors,
        }
    }

    /// Delete the files of each target slot folder. Failures do not stop the batch.
    pub async fn run_remove(
        &self,
        targets: &[DeviceGameEntry],
        progress_tx: Option<mpsc::Sender<SyncEvent>>,
    ) -> RemoveReport {
        self.cancelled.store(false, Ordering::SeqCst);
        let total = targets.len();
        let mut report = RemoveReport {
            planned: total,
            ..Default::default()
        };

        self.log(
            &progress_tx,
            LogLevel::Info,
            format!("Deleting {} game(s) from SD card...", total),
        )
        .await;

        for (index, target) in targets.iter().enumerate() {
            if self.is_cancelled() {
                info!("delete batch cancelled before item {}", index + 1);
                break;
            }

            let name = target.game.identity.to_string();
            self.send(
                &progress_tx,
                SyncEvent::ItemStarted {
                    index,
                    total,
                    name: name.clone(),
                },
            )
            .await;
            self.log(&progress_tx, LogLevel::Info, format!("Deleting {}...", name))
                .await;

            match self.storage.remove_files_in(&target.game.full_path).await {
                Ok(files) => {
                    report.removed += 1;
                    report.files_deleted += files;
                    self.send(
                        &progress_tx,
                        SyncEvent::ItemFinished {
                            completed: report.removed,
                            total,
                            name,
                        },
                    )
                    .await;
                }
                Err(e) => {
                    let failure = SyncError::DeleteFailure {
                        folder: target.game.folder_name.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{}", failure);
                    self.log(&progress_tx, LogLevel::Error, failure.to_string())
                        .await;
                    report.errors.push(failure.to_string());
                }
            }

            tokio::task::yield_now().await;
        }

        if report.errors.is_empty() {
            self.log(&progress_tx, LogLevel::Success, "Games deleted".to_string())
                .await;
        } else {
            self.log(
                &progress_tx,
                LogLevel::Error,
                format!("{} game(s) could not be deleted", report.errors.len()),
            )
            .await;
        }

        info!(
            "delete batch finished: {}/{} removed, {} files",
            report.removed, total, report.files_deleted
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comparator::tests::{pc, sd};
    use crate::core::comparator::{CopyReason, GameComparator};
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn library_game(root: &Path, folder: &str, name: &str) -> crate::models::PcGameEntry {
        let dir = root.join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("disc.gdi"), name.as_bytes()).unwrap();
        let mut entry = pc(folder, name, name.len() as u64);
        entry.game.full_path = dir;
        entry
    }

    async fn drain(mut rx: mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn copies_into_new_and_existing_slots() {
        let pc_root = TempDir::new().unwrap();
        let sd_root = TempDir::new().unwrap();

        let a = library_game(pc_root.path(), "A", "SONIC ADVENTURE");
        let b = library_game(pc_root.path(), "B", "CRAZY TAXI");
        let mut existing = sd(3, "SONIC ADVENTURE", 1);
        existing.game.full_path = sd_root.path().join("0003");

        let reconciled = GameComparator::reconcile(&[a, b], &[existing]);
        let plan = GameComparator::build_plan(&reconciled);
        assert_eq!(plan.items[0].reason, CopyReason::SizeMismatch);

        let engine = SyncEngine::new(Arc::new(LocalStorage::new()));
        let (tx, rx) = mpsc::channel(64);
        let report = engine.run_copy(&plan, sd_root.path(), vec![3u16], Some(tx)).await;
        let events = drain(rx).await;

        assert!(report.is_complete());
        assert_eq!(report.copied[0].slot, 3);
        assert_eq!(report.copied[1].slot, 2);
        assert!(sd_root.path().join("0002").join("disc.gdi").exists());
        assert!(sd_root.path().join("0003").join("disc.gdi").exists());

        let finished: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::ItemFinished { completed, .. } => Some(*completed),
                _ => None,
            })
            .collect();
        assert_eq!(finished, vec![1, 2]);
        assert!(matches!(
            events.last(),
            Some(SyncEvent::Log { level: LogLevel::Success, .. })
        ));
    }

    #[tokio::test]
    async fn exhausted_slots_stop_the_batch() {
        let pc_root = TempDir::new().unwrap();
        let sd_root = TempDir::new().unwrap();
        let a = library_game(pc_root.path(), "A", "ONE");
        let b = library_game(pc_root.path(), "B", "TWO");

        let plan = GameComparator::build_plan(&GameComparator::reconcile(&[a, b], &[]));
        let engine = SyncEngine::with_config(
            Arc::new(LocalStorage::new()),
            SyncConfig {
                starting_slot: 9999,
                ..Default::default()
            },
        );
        let report = engine.run_copy(&plan, sd_root.path(), Vec::new(), None).await;

        assert_eq!(report.status, SyncStatus::Failed);
        assert_eq!(report.completed, 1);
        assert_eq!(report.planned, 2);
        assert_eq!(report.copied[0].folder, sd_root.path().join("9999"));
        assert!(report.errors[0].contains("no free slot"));
    }

    #[tokio::test]
    async fn cancelled_engine_stops_before_next_item() {
        let pc_root = TempDir::new().unwrap();
        let sd_root = TempDir::new().unwrap();
        let a = library_game(pc_root.path(), "A", "ONE");
        let b = library_game(pc_root.path(), "B", "TWO");
        let plan = GameComparator::build_plan(&GameComparator::reconcile(&[a, b], &[]));

        let engine = SyncEngine::new(Arc::new(LocalStorage::new()));
        let (tx, mut rx) = mpsc::channel(64);
        let handle = engine.cancel_handle();

        // the first copy suspends on file I/O, which lets the watcher raise the flag
        let run = engine.run_copy(&plan, sd_root.path(), Vec::new(), Some(tx));
        let watcher = async {
            while let Some(event) = rx.recv().await {
                if matches!(event, SyncEvent::BatchStarted { .. }) {
                    handle.store(true, Ordering::SeqCst);
                }
            }
        };
        let (report, _) = tokio::join!(run, watcher);

        assert_eq!(report.status, SyncStatus::Cancelled);
        assert_eq!(report.completed, 1);
        assert!(sd_root.path().join("0002").exists());
        assert!(!sd_root.path().join("0003").exists());
    }

    #[tokio::test]
    async fn removes_files_and_reports_missing_folders() {
        let sd_root = TempDir::new().unwrap();
        let slot = sd_root.path().join("0002");
        std::fs::create_dir(&slot).unwrap();
        std::fs::write(slot.join("disc.gdi"), b"x").unwrap();
        std::fs::write(slot.join("track01.bin"), b"x").unwrap();

        let mut present = sd(2, "ONE", 2);
        present.game.full_path = slot.clone();
        let mut missing = sd(5, "TWO", 2);
        missing.game.full_path = sd_root.path().join("0005");

        let engine = SyncEngine::new(Arc::new(LocalStorage::new()));
        let report = engine.run_remove(&[missing, present], None).await;

        assert_eq!(report.planned, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(slot.exists());
        assert_eq!(std::fs::read_dir(&slot).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_remove_batch_succeeds() {
        let engine = SyncEngine::new(Arc::new(LocalStorage::new()));
        let report = engine.run_remove(&[], None).await;
        assert_eq!(report.planned, 0);
        assert!(report.errors.is_empty());
    }
}
