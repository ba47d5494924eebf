//! Application configuration, stored as sections of `config.json`

use crate::core::engine::{CopyFailurePolicy, SyncConfig};
use crate::core::scanner::ScanConfig;
use crate::core::slots::{DEFAULT_SLOT_WIDTH, DEFAULT_STARTING_SLOT, MAX_SLOT, MIN_SLOT};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "config.json";

/// Read one section; `None` when the file or section is missing or malformed
pub(crate) fn load_section<T: DeserializeOwned>(config_dir: &Path, key: &str) -> Option<T> {
    let content = fs::read_to_string(config_dir.join(CONFIG_FILE)).ok()?;
    let config = serde_json::from_str::<serde_json::Value>(&content).ok()?;
    match serde_json::from_value::<T>(config.get(key)?.clone()) {
        Ok(section) => Some(section),
        Err(e) => {
            debug!("ignoring malformed config section {}: {}", key, e);
            None
        }
    }
}

/// Replace one section, keeping the others
pub(crate) fn save_section<T: Serialize>(config_dir: &Path, key: &str, value: &T) -> Result<()> {
    fs::create_dir_all(config_dir)?;
    let config_file = config_dir.join(CONFIG_FILE);

    let mut config: serde_json::Value = fs::read_to_string(&config_file)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .filter(|value: &serde_json::Value| value.is_object())
        .unwrap_or_else(|| serde_json::json!({}));

    config[key] = serde_json::to_value(value)?;
    fs::write(&config_file, serde_json::to_string_pretty(&config)?)?;
    Ok(())
}

/// Default library and SD card locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConfig {
    #[serde(default = "default_pc_path")]
    pub pc_default_path: String,
    #[serde(default = "default_sd_drive")]
    pub sd_default_drive: String,
}

fn default_pc_path() -> String {
    if cfg!(target_os = "windows") {
        "F:\\Roms\\Sega - Dreamcast".to_string()
    } else {
        crate::dirs::home_dir()
            .map(|h| h.join("Roms").join("Sega - Dreamcast"))
            .unwrap_or_else(|| PathBuf::from("Roms/Sega - Dreamcast"))
            .to_string_lossy()
            .to_string()
    }
}

fn default_sd_drive() -> String {
    if cfg!(target_os = "windows") {
        "H:\\".to_string()
    } else {
        "/media/sdcard".to_string()
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            pc_default_path: default_pc_path(),
            sd_default_drive: default_sd_drive(),
        }
    }
}

impl PathConfig {
    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, "paths").unwrap_or_default()
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        save_section(config_dir, "paths", self)
    }
}

/// Copy and scan behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default = "default_starting_slot")]
    pub starting_slot: u16,
    #[serde(default = "default_slot_name_width")]
    pub slot_name_width: usize,
    #[serde(default)]
    pub copy_failure_policy: CopyFailurePolicy,
    #[serde(default = "default_descriptor_extensions")]
    pub descriptor_extensions: Vec<String>,
    #[serde(default = "default_primary_track_name")]
    pub primary_track_name: String,
}

fn default_starting_slot() -> u16 {
    DEFAULT_STARTING_SLOT
}

fn default_slot_name_width() -> usize {
    DEFAULT_SLOT_WIDTH
}

fn default_descriptor_extensions() -> Vec<String> {
    vec!["gdi".to_string()]
}

fn default_primary_track_name() -> String {
    "track01.bin".to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            starting_slot: default_starting_slot(),
            slot_name_width: default_slot_name_width(),
            copy_failure_policy: CopyFailurePolicy::default(),
            descriptor_extensions: default_descriptor_extensions(),
            primary_track_name: default_primary_track_name(),
        }
    }
}

impl SyncSettings {
    /// Load and clamp out-of-range values
    pub fn load(config_dir: &Path) -> Self {
        let mut settings: Self = load_section(config_dir, "sync").unwrap_or_default();
        settings.starting_slot = settings.starting_slot.clamp(MIN_SLOT, MAX_SLOT);
        settings.slot_name_width = settings.slot_name_width.clamp(1, 4);
        if settings.descriptor_extensions.is_empty() {
            settings.descriptor_extensions = default_descriptor_extensions();
        }
        if settings.primary_track_name.trim().is_empty() {
            settings.primary_track_name = default_primary_track_name();
        }
        settings
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        save_section(config_dir, "sync", self)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            starting_slot: self.starting_slot,
            slot_width: self.slot_name_width,
            copy_failure_policy: self.copy_failure_policy,
        }
    }

    pub fn scan_config(&self, read_headers: bool) -> ScanConfig {
        ScanConfig {
            descriptor_extensions: self.descriptor_extensions.clone(),
            primary_track_name: self.primary_track_name.clone(),
            read_headers,
        }
    }
}
