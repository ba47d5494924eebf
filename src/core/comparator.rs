use crate::models::{DeviceGameEntry, PcGameEntry};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// How a library game relates to the SD card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    /// Same name and size on the card, nothing to do
    Matched,
    /// Same name, different size: copy again into the same slot
    SizeMismatch,
    /// Operator asked for a shrink: copy again (same slot when matched)
    ShrinkRequested,
    /// Not on the card: copy into a new slot
    Absent,
}

/// A library game with its classification and, when found, its SD card copy
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledGame {
    pub pc: PcGameEntry,
    pub device: Option<DeviceGameEntry>,
    pub classification: Classification,
}

impl ReconciledGame {
    pub fn needs_copy(&self) -> bool {
        self.classification != Classification::Matched
    }

    pub fn is_on_device(&self) -> bool {
        self.device.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CopyReason {
    NewCopy,
    SizeMismatch,
    ShrinkRequested,
}

/// Where a planned copy goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum CopyTarget {
    /// Next free slot, picked when the copy runs
    NewSlot,
    /// The slot folder the game already occupies
    Existing { slot: u16, folder: PathBuf },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedCopy {
    pub game: PcGameEntry,
    pub target: CopyTarget,
    pub reason: CopyReason,
}

/// Ordered copy plan, rebuilt for every run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    pub items: Vec<PlannedCopy>,
}

impl SyncPlan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Classification counts
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub matched: usize,
    pub size_mismatch: usize,
    pub shrink_requested: usize,
    pub absent: usize,
}

impl ReconcileSummary {
    pub fn to_copy(&self) -> usize {
        self.size_mismatch + self.shrink_requested + self.absent
    }
}

/// Pairs library games with SD card games by name
pub struct GameComparator;

impl GameComparator {
    /// First device entry per known identity, in scan order
    fn index_device(device: &[DeviceGameEntry]) -> HashMap<&str, &DeviceGameEntry> {
        let mut index = HashMap::new();
        for entry in device {
            if entry.game.identity.is_known() {
                index.entry(entry.game.identity.as_str()).or_insert(entry);
            }
        }
        index
    }

    /// Classify one library game against the SD card catalog
    pub fn classify<'a>(
        pc: &PcGameEntry,
        device: &'a [DeviceGameEntry],
    ) -> (Classification, Option<&'a DeviceGameEntry>) {
        let matched = device
            .iter()
            .find(|d| d.game.identity.matches(&pc.game.identity));
        (Self::classify_with(pc, matched), matched)
    }

    fn classify_with(pc: &PcGameEntry, matched: Option<&DeviceGameEntry>) -> Classification {
        if pc.must_shrink {
            return Classification::ShrinkRequested;
        }
        match matched {
            None => Classification::Absent,
            Some(d) if d.game.size_bytes != pc.game.size_bytes => {
                tracing::debug!(
                    "size differs: {} (pc={}, sd={})",
                    pc.game.identity,
                    pc.game.size_bytes,
                    d.game.size_bytes
                );
                Classification::SizeMismatch
            }
            Some(_) => Classification::Matched,
        }
    }

    /// Classify every library game, keeping library order
    pub fn reconcile(pc: &[PcGameEntry], device: &[DeviceGameEntry]) -> Vec<ReconciledGame> {
        let index = Self::index_device(device);

        pc.iter()
            .map(|entry| {
                let matched = if entry.game.identity.is_known() {
                    index.get(entry.game.identity.as_str()).copied()
                } else {
                    None
                };
                ReconciledGame {
                    pc: entry.clone(),
                    device: matched.cloned(),
                    classification: Self::classify_with(entry, matched),
                }
            })
            .collect()
    }

    /// Copy plan for the games that need one, in library order
    pub fn build_plan(reconciled: &[ReconciledGame]) -> SyncPlan {
        let items = reconciled
            .iter()
            .filter(|r| r.needs_copy())
            .map(|r| {
                let target = match &r.device {
                    Some(d) => CopyTarget::Existing {
                        slot: d.slot,
                        folder: d.game.full_path.clone(),
                    },
                    None => CopyTarget::NewSlot,
                };
                let reason = match r.classification {
                    Classification::ShrinkRequested => CopyReason::ShrinkRequested,
                    Classification::SizeMismatch => CopyReason::SizeMismatch,
                    _ => CopyReason::NewCopy,
                };
                PlannedCopy {
                    game: r.pc.clone(),
                    target,
                    reason,
                }
            })
            .collect();

        SyncPlan { items }
    }

    /// SD card entries matching the given library games, without duplicates
    pub fn removal_targets(reconciled: &[ReconciledGame]) -> Vec<DeviceGameEntry> {
        let mut targets: Vec<DeviceGameEntry> = Vec::new();
        for device in reconciled.iter().filter_map(|r| r.device.as_ref()) {
            if !targets.iter().any(|t| t.game.full_path == device.game.full_path) {
                targets.push(device.clone());
            }
        }
        targets
    }

    pub fn summarize(reconciled: &[ReconciledGame]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for r in reconciled {
            match r.classification {
                Classification::Matched => summary.matched += 1,
                Classification::SizeMismatch => summary.size_mismatch += 1,
                Classification::ShrinkRequested => summary.shrink_requested += 1,
                Classification::Absent => summary.absent += 1,
            }
        }
        summary
    }
}
