use super::{default_credentials_dir, expand_home, ConfigError};
use crate::gateway::Verbosity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_CENTER: &str = "com";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";
pub const DEFAULT_SCOPE: &str = "ZohoBigin.modules.ALL,ZohoBigin.settings.ALL,ZohoBigin.org.READ";
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 120;
pub const SUPPORTED_DATA_CENTERS: &[&str] =
    &["com", "eu", "in", "com.au", "jp", "ca", "sa", "uk", "com.cn"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_data_center", alias = "default_dc")]
    pub data_center: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    pub oauth: OAuthSettings,
    #[serde(default)]
    pub credentials_dir: Option<PathBuf>,
    #[serde(default)]
    pub accounts_base_url: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub log_level: Verbosity,
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,
}

fn default_data_center() -> String {
    DEFAULT_DATA_CENTER.to_string()
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_callback_timeout_secs() -> u64 {
    DEFAULT_CALLBACK_TIMEOUT_SECS
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                }
            }
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Applies `BIGIN_CLIENT_ID`, `BIGIN_CLIENT_SECRET` and `BIGIN_DC` on top
    /// of the file values. `lookup` is `std::env::var` in production.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(client_id) = non_empty("BIGIN_CLIENT_ID") {
            self.oauth.client_id = client_id;
        }
        if let Some(client_secret) = non_empty("BIGIN_CLIENT_SECRET") {
            self.oauth.client_secret = client_secret;
        }
        if let Some(dc) = non_empty("BIGIN_DC") {
            self.oauth.data_center = dc.trim().to_string();
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`oauth.client_id` must be non-empty".to_string(),
            ));
        }
        if self.oauth.client_secret.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`oauth.client_secret` must be non-empty".to_string(),
            ));
        }
        if !SUPPORTED_DATA_CENTERS.contains(&self.oauth.data_center.as_str()) {
            return Err(ConfigError::Settings(format!(
                "`oauth.data_center` `{}` is not one of: {}",
                self.oauth.data_center,
                SUPPORTED_DATA_CENTERS.join(", ")
            )));
        }
        if url::Url::parse(&self.oauth.redirect_uri).is_err() {
            return Err(ConfigError::Settings(format!(
                "`oauth.redirect_uri` `{}` is not a valid url",
                self.oauth.redirect_uri
            )));
        }
        if self.callback_timeout_secs == 0 {
            return Err(ConfigError::Settings(
                "`callback_timeout_secs` must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn accounts_base_url(&self) -> String {
        match self.accounts_base_url.as_deref().filter(|v| !v.trim().is_empty()) {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://accounts.zoho.{}", self.oauth.data_center),
        }
    }

    pub fn api_base_url(&self) -> String {
        match self.api_base_url.as_deref().filter(|v| !v.trim().is_empty()) {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://www.zohoapis.{}/bigin/v2", self.oauth.data_center),
        }
    }

    pub fn credentials_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.credentials_dir {
            Some(dir) => expand_home(dir),
            None => default_credentials_dir(),
        }
    }
}
