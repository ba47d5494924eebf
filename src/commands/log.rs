//! Log settings

use crate::logging::LogConfig;
use crate::AppState;

pub fn get_log_config(state: &AppState) -> LogConfig {
    LogConfig::load(&state.config_dir)
}

/// Update and persist; takes effect on the next start
pub fn set_log_config(
    state: &AppState,
    enabled: Option<bool>,
    max_size_mb: Option<u32>,
    level: Option<String>,
) -> Result<LogConfig, String> {
    let mut config = LogConfig::load(&state.config_dir);
    config.update(enabled, max_size_mb, level.as_deref())?;
    config.save(&state.config_dir).map_err(|e| e.to_string())?;
    Ok(config)
}
