//! Error taxonomy shared by the scanners and the sync engine.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Library or device root does not exist or is not a directory
    #[error("{role} path is invalid: {path}")]
    PathInvalid { role: &'static str, path: PathBuf },

    /// Disc header missing, too short or not decodable
    #[error("cannot read game name from {path}: {reason}")]
    IdentityUnreadable { path: PathBuf, reason: String },

    #[error("no free slot left between {from} and {max}")]
    SlotSpaceExhausted { from: u16, max: u16 },

    #[error("copy of {game} failed: {reason}")]
    CopyFailure { game: String, reason: String },

    #[error("delete of {folder} failed: {reason}")]
    DeleteFailure { folder: String, reason: String },

    /// Paths changed since the last successful scan
    #[error("paths changed since the last scan, rescan required")]
    StaleSession,
}
