//! Diagnostic log file with a size cap

use crate::config::{load_section, save_section};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

pub const LOG_FILE: &str = "app.log";
pub const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Log settings, `log` section of `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Rotate once the file grows past this many MB
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, "log").unwrap_or_default()
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        save_section(config_dir, "log", self)
    }

    /// Apply optional changes. Size is clamped to 1-100 MB, unknown levels are rejected.
    pub fn update(
        &mut self,
        enabled: Option<bool>,
        max_size_mb: Option<u32>,
        level: Option<&str>,
    ) -> Result<(), String> {
        if let Some(level) = level {
            let level = level.to_lowercase();
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!("invalid log level: {}", level));
            }
            self.level = level;
        }
        if let Some(enabled) = enabled {
            self.enabled = enabled;
        }
        if let Some(size) = max_size_mb {
            self.max_size_mb = size.clamp(1, 100);
        }
        Ok(())
    }

    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

struct RotatingFile {
    file_path: PathBuf,
    max_size: u64,
    writer: Option<BufWriter<File>>,
}

impl RotatingFile {
    fn open(file_path: &Path, max_size: u64) -> io::Result<BufWriter<File>> {
        if fs::metadata(file_path).map(|m| m.len() > max_size).unwrap_or(false) {
            rotate(file_path)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(file_path)?;
        Ok(BufWriter::new(file))
    }

    fn rotate_if_needed(&mut self) {
        let too_big = fs::metadata(&self.file_path)
            .map(|m| m.len() > self.max_size)
            .unwrap_or(false);
        if !too_big {
            return;
        }

        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
        let _ = rotate(&self.file_path);
        self.writer = Self::open(&self.file_path, self.max_size).ok();
    }
}

/// `app.log` becomes `app.log.old`, replacing any previous backup
fn rotate(file_path: &Path) -> io::Result<()> {
    let backup_path = file_path.with_extension("log.old");
    if backup_path.exists() {
        fs::remove_file(&backup_path)?;
    }
    fs::rename(file_path, &backup_path)
}

/// tracing writer that keeps one backup and caps the live file size
#[derive(Clone)]
pub struct SizeRotatingWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join(LOG_FILE);
        let max_size = u64::from(max_size_mb) * 1024 * 1024;
        let writer = RotatingFile::open(&file_path, max_size)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(RotatingFile {
                file_path,
                max_size,
                writer: Some(writer),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RotatingFile> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle returned for each log event
pub struct LogWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let written = match guard.writer.as_mut() {
            Some(writer) => {
                let n = writer.write(buf)?;
                writer.flush()?;
                n
            }
            None => return Err(io::Error::new(io::ErrorKind::Other, "log file not available")),
        };
        guard.rotate_if_needed();
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match guard.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.lock().rotate_if_needed();
        LogWriter {
            inner: self.inner.clone(),
        }
    }
}

/// Log files live next to the configuration
pub fn get_log_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}
