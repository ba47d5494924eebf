use std::path::PathBuf;
use std::sync::Arc;

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod models;
pub mod session;
pub mod storage;

pub use crate::core::{GameComparator, GameScanner, SyncConfig, SyncEngine, SyncPlan};
pub use error::SyncError;
pub use models::{DeviceGameEntry, GameIdentity, PcGameEntry, SyncEvent, SyncReport};
pub use session::ScanSession;
pub use storage::{LocalStorage, Storage};

/// Shared state for the command handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub config_dir: PathBuf,
}

impl AppState {
    /// `config_dir` overrides the per-user configuration directory
    pub fn new(config_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_dir = config_dir.unwrap_or_else(default_config_dir);
        std::fs::create_dir_all(&config_dir)?;
        tracing::debug!("config dir: {}", config_dir.display());

        Ok(Self {
            storage: Arc::new(LocalStorage::new()),
            config_dir,
        })
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("gdemu-sync"))
        .unwrap_or_else(|| PathBuf::from(".gdemu-sync"))
}

pub mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("USERPROFILE").ok().map(PathBuf::from)
        } else {
            std::env::var("HOME").ok().map(PathBuf::from)
        }
    }

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            home_dir().map(|h| h.join("Library").join("Application Support"))
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| home_dir().map(|h| h.join(".config")))
        }
    }
}
