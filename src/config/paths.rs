use crate::config::ConfigError;
use std::path::{Path, PathBuf};

pub const GLOBAL_STATE_DIR: &str = ".openclaw";
pub const GLOBAL_SETTINGS_FILE_NAME: &str = "bigin-crm.yaml";
pub const CREDENTIALS_DIR_NAME: &str = "credentials";
pub const CONFIG_PATH_ENV: &str = "BIGIN_CONFIG";

fn home_dir() -> Result<PathBuf, ConfigError> {
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or(ConfigError::HomeDirectoryUnavailable)
}

pub fn default_global_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(home_dir()?
        .join(GLOBAL_STATE_DIR)
        .join(GLOBAL_SETTINGS_FILE_NAME))
}

pub fn default_credentials_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(GLOBAL_STATE_DIR).join(CREDENTIALS_DIR_NAME))
}

/// Expands a leading `~/` against `$HOME`; other paths are returned as-is.
pub fn expand_home(path: &Path) -> Result<PathBuf, ConfigError> {
    let raw = path.to_string_lossy();
    if let Some(rest) = raw.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }
    Ok(path.to_path_buf())
}
