use super::log::get_log_config;
use super::Roots;
use crate::config::{PathConfig, SyncSettings, CONFIG_FILE};
use crate::logging::{get_log_dir, LogConfig};
use crate::AppState;
use serde::Serialize;
use std::path::PathBuf;

/// Everything `config show` prints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    pub config_file: PathBuf,
    pub log_dir: PathBuf,
    pub paths: PathConfig,
    pub sync: SyncSettings,
    pub log: LogConfig,
}

pub fn show_config(state: &AppState) -> ConfigView {
    ConfigView {
        config_file: state.config_dir.join(CONFIG_FILE),
        log_dir: get_log_dir(&state.config_dir),
        paths: PathConfig::load(&state.config_dir),
        sync: SyncSettings::load(&state.config_dir),
        log: get_log_config(state),
    }
}

/// Remember the current roots as the defaults for later runs
pub fn save_paths(state: &AppState, roots: &Roots) -> Result<PathConfig, String> {
    let paths = PathConfig {
        pc_default_path: roots.pc.to_string_lossy().to_string(),
        sd_default_drive: roots.sd.to_string_lossy().to_string(),
    };
    paths.save(&state.config_dir).map_err(|e| e.to_string())?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn saved_paths_become_defaults() {
        let dir = TempDir::new().unwrap();
        let state = AppState::new(Some(dir.path().to_path_buf())).unwrap();
        let roots = Roots {
            pc: PathBuf::from("/srv/dreamcast"),
            sd: PathBuf::from("/media/gdemu"),
        };

        save_paths(&state, &roots).unwrap();
        assert_eq!(Roots::resolve(&state, None, None), roots);

        let view = show_config(&state);
        assert_eq!(view.paths.sd_default_drive, "/media/gdemu");
        assert_eq!(view.sync.starting_slot, 2);
        assert!(view.config_file.ends_with(CONFIG_FILE));
        assert_eq!(view.log, LogConfig::default());
    }
}
