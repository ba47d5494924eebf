use crate::core::identity::DiscIdentityReader;
use crate::core::slots::parse_slot;
use crate::models::{DeviceGameEntry, GameEntry, PcGameEntry};
use crate::storage::{format_size, Storage};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Game folder recognition settings
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Descriptor extensions marking a game folder, compared case-insensitively
    pub descriptor_extensions: Vec<String>,
    /// Exact file name of the track holding the boot header
    pub primary_track_name: String,
    /// Also decode the full boot header of each game
    pub read_headers: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            descriptor_extensions: vec!["gdi".to_string()],
            primary_track_name: "track01.bin".to_string(),
            read_headers: false,
        }
    }
}

/// Non-fatal conditions met while scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ScanIssue {
    /// Root missing or not a directory; the catalog is empty
    PathInvalid { path: PathBuf },
    /// More than one descriptor file, folder skipped
    AmbiguousDescriptor { folder: PathBuf, count: usize },
    /// Folder could not be listed, skipped
    Unreadable { folder: PathBuf, reason: String },
}

impl fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanIssue::PathInvalid { path } => write!(f, "path is invalid: {}", path.display()),
            ScanIssue::AmbiguousDescriptor { folder, count } => write!(
                f,
                "{} has {} descriptor files, skipped",
                folder.display(),
                count
            ),
            ScanIssue::Unreadable { folder, reason } => {
                write!(f, "cannot read {}: {}", folder.display(), reason)
            }
        }
    }
}

/// Catalog plus whatever went wrong producing it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome<T> {
    pub root: PathBuf,
    pub entries: Vec<T>,
    pub issues: Vec<ScanIssue>,
    /// Numbered folders on the card that hold anything, game or not. None of them is free.
    pub reserved_slots: BTreeSet<u16>,
    /// Name length of the existing numbered folders, longest wins
    pub slot_name_width: Option<usize>,
}

impl<T> ScanOutcome<T> {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            entries: Vec::new(),
            issues: Vec::new(),
            reserved_slots: BTreeSet::new(),
            slot_name_width: None,
        }
    }

    /// False when the root itself was invalid
    pub fn is_successful(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|issue| matches!(issue, ScanIssue::PathInvalid { .. }))
    }
}

/// Scans a library root or an SD card root into a catalog of games
pub struct GameScanner {
    config: ScanConfig,
}

impl GameScanner {
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    fn is_descriptor(&self, file: &Path) -> bool {
        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        self.config
            .descriptor_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').to_lowercase() == ext)
    }

    fn folder_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Immediate subfolders of `root`, or the `PathInvalid` issue
    async fn subfolders(
        &self,
        storage: &dyn Storage,
        root: &Path,
        issues: &mut Vec<ScanIssue>,
    ) -> Vec<PathBuf> {
        if !storage.is_dir(root).await {
            warn!("scan root is invalid: {}", root.display());
            issues.push(ScanIssue::PathInvalid {
                path: root.to_path_buf(),
            });
            return Vec::new();
        }

        match storage.list_dirs(root).await {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!("cannot list {}: {}", root.display(), e);
                issues.push(ScanIssue::PathInvalid {
                    path: root.to_path_buf(),
                });
                Vec::new()
            }
        }
    }

    /// Unlistable folders count as non-empty
    async fn holds_anything(storage: &dyn Storage, folder: &Path) -> bool {
        match (storage.list_files(folder).await, storage.list_dirs(folder).await) {
            (Ok(files), Ok(dirs)) => !files.is_empty() || !dirs.is_empty(),
            _ => true,
        }
    }

    /// Build the entry for `folder` if it holds exactly one descriptor file
    async fn read_game_folder(
        &self,
        storage: &dyn Storage,
        folder: &Path,
        issues: &mut Vec<ScanIssue>,
    ) -> Option<GameEntry> {
        let files = match storage.list_files(folder).await {
            Ok(files) => files,
            Err(e) => {
                warn!("cannot list {}: {}", folder.display(), e);
                issues.push(ScanIssue::Unreadable {
                    folder: folder.to_path_buf(),
                    reason: e.to_string(),
                });
                return None;
            }
        };

        let descriptors = files.iter().filter(|f| self.is_descriptor(f)).count();
        match descriptors {
            0 => {
                debug!("not a game folder: {}", folder.display());
                return None;
            }
            1 => {}
            count => {
                warn!("{} descriptor files in {}, skipped", count, folder.display());
                issues.push(ScanIssue::AmbiguousDescriptor {
                    folder: folder.to_path_buf(),
                    count,
                });
                return None;
            }
        }

        let track = files.iter().find(|f| {
            f.file_name()
                .map(|n| n.to_string_lossy() == self.config.primary_track_name.as_str())
                .unwrap_or(false)
        });

        let reader = DiscIdentityReader::new(storage);
        let identity = reader.identity_or_unknown(track.map(|t| t.as_path())).await;
        let header = match (self.config.read_headers, track) {
            (true, Some(track)) => reader.read_header(track).await,
            _ => None,
        };

        let size_bytes = storage.dir_size(folder).await.unwrap_or_else(|e| {
            warn!("cannot size {}: {}", folder.display(), e);
            0
        });

        Some(GameEntry {
            full_path: folder.to_path_buf(),
            folder_name: Self::folder_name(folder),
            identity,
            size_bytes,
            formatted_size: format_size(size_bytes),
            header,
        })
    }

    /// Scan the PC library. Any folder name is accepted.
    pub async fn scan_library(&self, storage: &dyn Storage, root: &Path) -> ScanOutcome<PcGameEntry> {
        info!("scanning library: {}", root.display());
        let mut outcome = ScanOutcome::new(root);

        for folder in self.subfolders(storage, root, &mut outcome.issues).await {
            if let Some(game) = self
                .read_game_folder(storage, &folder, &mut outcome.issues)
                .await
            {
                outcome.entries.push(PcGameEntry {
                    game,
                    must_shrink: false,
                });
            }
        }

        info!(
            "library scan done: {} games, {} issues",
            outcome.entries.len(),
            outcome.issues.len()
        );
        outcome
    }

    /// Scan the SD card. Only numbered folders are considered. Every non-empty
    /// one is reserved, including the ones skipped as not being games.
    pub async fn scan_device(&self, storage: &dyn Storage, root: &Path) -> ScanOutcome<DeviceGameEntry> {
        info!("scanning SD card: {}", root.display());
        let mut outcome = ScanOutcome::new(root);

        for folder in self.subfolders(storage, root, &mut outcome.issues).await {
            let name = Self::folder_name(&folder);
            let Some(slot) = parse_slot(&name) else {
                debug!("not a slot folder: {}", folder.display());
                continue;
            };
            outcome.slot_name_width = outcome.slot_name_width.max(Some(name.len()));
            if !Self::holds_anything(storage, &folder).await {
                debug!("empty slot folder: {}", folder.display());
                continue;
            }
            outcome.reserved_slots.insert(slot);

            if let Some(game) = self
                .read_game_folder(storage, &folder, &mut outcome.issues)
                .await
            {
                outcome.entries.push(DeviceGameEntry { game, slot });
            }
        }

        info!(
            "SD card scan done: {} games in {} slots, {} issues",
            outcome.entries.len(),
            outcome.reserved_slots.len(),
            outcome.issues.len()
        );
        outcome
    }
}

impl Default for GameScanner {
    fn default() -> Self {
        Self::new()
    }
}
