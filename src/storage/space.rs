//! Free space on the SD card volume and human readable sizes

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Free space report for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeSpace {
    pub bytes: u64,
    pub formatted: String,
}

impl FreeSpace {
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes,
            formatted: format_size(bytes),
        }
    }
}

/// Format a byte count with binary prefixes and one decimal, e.g. `1.5 GiB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

/// Free bytes on the mounted volume that contains `path`.
/// The mount point with the longest matching prefix wins.
pub fn available_space(path: &Path) -> Result<u64> {
    let target = std::fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path));
    let disks = Disks::new_with_refreshed_list();

    let mut best: Option<(usize, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if target.starts_with(mount) {
            let score = mount.as_os_str().len();
            match best {
                Some((best_score, _)) if best_score >= score => {}
                _ => best = Some((score, disk.available_space())),
            }
        }
    }

    best.map(|(_, available)| available)
        .ok_or_else(|| anyhow!("no mounted volume found for {}", target.display()))
}
