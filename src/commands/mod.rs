//! Operations behind the command line, one module per concern

pub mod config;
pub mod log;
pub mod scan;
pub mod space;
pub mod sync;

use crate::config::PathConfig;
use crate::models::{LogLevel, SyncEvent};
use crate::AppState;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Library and SD card roots for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    pub pc: PathBuf,
    pub sd: PathBuf,
}

impl Roots {
    /// Explicit paths win over the saved defaults
    pub fn resolve(state: &AppState, pc: Option<PathBuf>, sd: Option<PathBuf>) -> Self {
        let defaults = PathConfig::load(&state.config_dir);
        Self {
            pc: pc.unwrap_or_else(|| PathBuf::from(defaults.pc_default_path)),
            sd: sd.unwrap_or_else(|| PathBuf::from(defaults.sd_default_drive)),
        }
    }
}

/// `HH:MM:SS: message`, or `None` for events that only drive progress
pub fn render_event(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::Log {
            message, timestamp, ..
        } => Some(format!("{}: {}", timestamp.format("%H:%M:%S"), message)),
        _ => None,
    }
}

fn print_event(event: &SyncEvent) {
    if let Some(line) = render_event(event) {
        match event {
            SyncEvent::Log {
                level: LogLevel::Error,
                ..
            } => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

/// Print batch events as they arrive; finishes when the sender is dropped
pub(crate) fn spawn_event_printer(
    capacity: usize,
) -> (mpsc::Sender<SyncEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<SyncEvent>(capacity);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn log_events_render_with_time_prefix() {
        let event = SyncEvent::Log {
            level: LogLevel::Info,
            message: "2/3 games copied".to_string(),
            timestamp: chrono::Local.with_ymd_and_hms(2024, 5, 1, 9, 7, 3).unwrap(),
        };
        assert_eq!(render_event(&event).unwrap(), "09:07:03: 2/3 games copied");

        let progress = SyncEvent::ItemStarted {
            index: 0,
            total: 1,
            name: "X".to_string(),
        };
        assert!(render_event(&progress).is_none());
    }

    #[test]
    fn explicit_roots_override_saved_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(Some(dir.path().to_path_buf())).unwrap();
        PathConfig {
            pc_default_path: "/library".to_string(),
            sd_default_drive: "/card".to_string(),
        }
        .save(&state.config_dir)
        .unwrap();

        let roots = Roots::resolve(&state, None, Some(PathBuf::from("/other")));
        assert_eq!(roots.pc, PathBuf::from("/library"));
        assert_eq!(roots.sd, PathBuf::from("/other"));
    }
}
