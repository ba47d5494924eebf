//! One scan of the library and the SD card, and what can be done with it

use crate::core::comparator::{GameComparator, ReconcileSummary, ReconciledGame, SyncPlan};
use crate::core::engine::SyncConfig;
use crate::core::scanner::{GameScanner, ScanOutcome};
use crate::error::SyncError;
use crate::models::{DeviceGameEntry, PcGameEntry};
use crate::storage::Storage;
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Catalogs of both roots, valid only for the paths they were scanned from
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub pc_root: PathBuf,
    pub device_root: PathBuf,
    pub library: ScanOutcome<PcGameEntry>,
    pub device: ScanOutcome<DeviceGameEntry>,
    pub scanned_at: DateTime<Local>,
}

impl ScanSession {
    pub async fn scan(
        storage: &dyn Storage,
        scanner: &GameScanner,
        pc_root: &Path,
        device_root: &Path,
    ) -> Self {
        let library = scanner.scan_library(storage, pc_root).await;
        let device = scanner.scan_device(storage, device_root).await;

        Self {
            pc_root: pc_root.to_path_buf(),
            device_root: device_root.to_path_buf(),
            library,
            device,
            scanned_at: Local::now(),
        }
    }

    /// Scan the same roots again, keeping shrink flags by folder path
    pub async fn rescan(&self, storage: &dyn Storage, scanner: &GameScanner) -> Self {
        let mut fresh = Self::scan(storage, scanner, &self.pc_root, &self.device_root).await;
        for entry in fresh.library.entries.iter_mut() {
            entry.must_shrink = self
                .library
                .entries
                .iter()
                .any(|old| old.must_shrink && old.game.full_path == entry.game.full_path);
        }
        fresh
    }

    /// A session is usable when the library root was valid
    pub fn is_successful(&self) -> bool {
        self.library.is_successful()
    }

    /// Refuse to act on catalogs scanned from other paths. Only matters to
    /// callers that keep a session across a change of roots.
    pub fn ensure_fresh(&self, pc_root: &Path, device_root: &Path) -> Result<(), SyncError> {
        if self.pc_root != pc_root || self.device_root != device_root {
            warn!(
                "session scanned {} / {}, asked for {} / {}",
                self.pc_root.display(),
                self.device_root.display(),
                pc_root.display(),
                device_root.display()
            );
            return Err(SyncError::StaleSession);
        }
        Ok(())
    }

    /// Both roots must exist before anything is written to the card
    pub fn ensure_writable(&self) -> Result<(), SyncError> {
        if !self.library.is_successful() {
            return Err(SyncError::PathInvalid {
                role: "PC",
                path: self.pc_root.clone(),
            });
        }
        if !self.device.is_successful() {
            return Err(SyncError::PathInvalid {
                role: "SD",
                path: self.device_root.clone(),
            });
        }
        Ok(())
    }

    /// Flag library games for shrinking. Returns how many entries were flagged.
    pub fn mark_shrink(&mut self, names: &[String]) -> usize {
        let mut flagged = 0;
        for entry in self.library.entries.iter_mut() {
            if names.iter().any(|n| selects(entry, n)) {
                entry.must_shrink = true;
                flagged += 1;
            }
        }
        debug!("{} game(s) flagged for shrinking", flagged);
        flagged
    }

    /// Library games picked by name or folder; all of them when `names` is empty
    pub fn select(&self, names: &[String]) -> Vec<PcGameEntry> {
        self.library
            .entries
            .iter()
            .filter(|entry| names.is_empty() || names.iter().any(|n| selects(entry, n)))
            .cloned()
            .collect()
    }

    /// Names that select nothing, to report back to the operator
    pub fn unmatched_names<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .filter(|n| !self.library.entries.iter().any(|e| selects(e, n)))
            .map(|n| n.as_str())
            .collect()
    }

    pub fn reconcile(&self) -> Vec<ReconciledGame> {
        GameComparator::reconcile(&self.library.entries, &self.device.entries)
    }

    pub fn summary(&self) -> ReconcileSummary {
        GameComparator::summarize(&self.reconcile())
    }

    /// Copy plan for the selected games, in library order
    pub fn plan(&self, selection: &[PcGameEntry]) -> SyncPlan {
        GameComparator::build_plan(&GameComparator::reconcile(selection, &self.device.entries))
    }

    /// Every non-empty numbered folder on the card, including the ones skipped as games
    pub fn occupied_slots(&self) -> Vec<u16> {
        self.device
            .reserved_slots
            .iter()
            .copied()
            .chain(self.device.entries.iter().map(|d| d.slot))
            .collect::<BTreeSet<u16>>()
            .into_iter()
            .collect()
    }

    /// New slot folders follow the naming already used on the card
    pub fn sync_config(&self, mut config: SyncConfig) -> SyncConfig {
        if let Some(width) = self.device.slot_name_width {
            if width != config.slot_width {
                debug!("card uses {}-digit slot names", width);
            }
            config.slot_width = width;
        }
        config
    }

    /// SD card folders holding the selected games, plus explicit slots
    pub fn removal_targets(&self, selection: &[PcGameEntry], slots: &[u16]) -> Vec<DeviceGameEntry> {
        let reconciled = GameComparator::reconcile(selection, &self.device.entries);
        let mut targets = GameComparator::removal_targets(&reconciled);

        for slot in slots {
            match self.device.entries.iter().find(|d| d.slot == *slot) {
                Some(entry) => {
                    if !targets.iter().any(|t| t.game.full_path == entry.game.full_path) {
                        targets.push(entry.clone());
                    }
                }
                None => debug!("slot {} holds no game", slot),
            }
        }
        targets
    }
}

fn selects(entry: &PcGameEntry, name: &str) -> bool {
    entry.game.folder_name == name
        || (entry.game.identity.is_known() && entry.game.identity.as_str() == name)
}
