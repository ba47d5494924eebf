use crate::core::identity::DiscHeader;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Name shown for games whose header could not be read
pub const UNKNOWN_NAME: &str = "Unknown name";

/// Game name read from the disc header, used to pair PC and SD entries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "name")]
pub enum GameIdentity {
    Known(String),
    /// Never matches anything, not even another `Unknown`
    Unknown,
}

impl GameIdentity {
    /// Build from an extracted title; blank titles are `Unknown`
    pub fn from_title(title: &str) -> Self {
        let title = title.trim();
        if title.is_empty() {
            GameIdentity::Unknown
        } else {
            GameIdentity::Known(title.to_string())
        }
    }

    pub fn matches(&self, other: &GameIdentity) -> bool {
        match (self, other) {
            (GameIdentity::Known(a), GameIdentity::Known(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, GameIdentity::Known(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            GameIdentity::Known(name) => name,
            GameIdentity::Unknown => UNKNOWN_NAME,
        }
    }
}

impl fmt::Display for GameIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by library and SD card entries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEntry {
    pub full_path: PathBuf,
    pub folder_name: String,
    pub identity: GameIdentity,
    pub size_bytes: u64,
    pub formatted_size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<DiscHeader>,
}

/// A game folder in the PC library
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcGameEntry {
    #[serde(flatten)]
    pub game: GameEntry,
    /// Set by the operator, forces a re-copy
    pub must_shrink: bool,
}

/// A numbered game folder on the SD card
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGameEntry {
    #[serde(flatten)]
    pub game: GameEntry,
    pub slot: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

/// Events streamed to the caller while a batch runs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum SyncEvent {
    Log {
        level: LogLevel,
        message: String,
        timestamp: DateTime<Local>,
    },
    BatchStarted {
        run_id: String,
        total: usize,
    },
    ItemStarted {
        index: usize,
        total: usize,
        name: String,
    },
    ItemFinished {
        completed: usize,
        total: usize,
        name: String,
    },
}

impl SyncEvent {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        SyncEvent::Log {
            level,
            message: message.into(),
            timestamp: Local::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Completed,
    Failed,
    Cancelled,
}

/// One game written to the SD card
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopiedGame {
    pub name: String,
    pub slot: u16,
    pub folder: PathBuf,
    pub bytes: u64,
}

/// Outcome of a copy batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub status: SyncStatus,
    pub planned: usize,
    pub completed: usize,
    pub bytes_copied: u64,
    pub copied: Vec<CopiedGame>,
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.status == SyncStatus::Completed && self.completed == self.planned
    }
}

/// Outcome of a delete batch
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveReport {
    pub planned: usize,
    pub removed: usize,
    pub files_deleted: usize,
    pub errors: Vec<String>,
}
