use crate::auth::{CredentialStore, OAuthClient, TokenManager};
use crate::config::{default_global_config_path, ConfigError, Settings};
use crate::error::CrmError;
use crate::gateway::{Gateway, HttpTransport, RequestLog, UreqTransport, Verbosity};
use crate::resources::RelatedTo;
use crate::shared::batch::BatchItem;
use crate::shared::clock::{Clock, SystemClock};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

pub const LOG_LEVEL_ENV: &str = "BIGIN_LOG";

/// Everything a command needs: validated settings plus the injected transport
/// and clock.
pub struct CommandContext {
    pub settings: Settings,
    pub transport: Arc<dyn HttpTransport>,
    pub clock: Arc<dyn Clock>,
    pub verbosity: Verbosity,
}

impl CommandContext {
    pub fn new(settings: Settings, transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        let verbosity = settings.log_level;
        Self {
            settings,
            transport,
            clock,
            verbosity,
        }
    }

    /// Loads settings from `config_path` (or the default location), applies
    /// environment overrides and resolves the log level: `-v` flags first,
    /// then `BIGIN_LOG`, then the file.
    pub fn load(config_path: Option<&Path>, verbose: u8) -> Result<Self, String> {
        let settings = load_settings(config_path).map_err(map_config_err)?;
        let fallback = match std::env::var(LOG_LEVEL_ENV) {
            Ok(raw) if !raw.trim().is_empty() => Verbosity::parse(&raw)?,
            _ => settings.log_level,
        };
        let mut context = Self::new(
            settings,
            Arc::new(UreqTransport::new()),
            Arc::new(SystemClock),
        );
        context.verbosity = Verbosity::from_flag_count(verbose, fallback);
        Ok(context)
    }

    pub fn credential_store(&self) -> Result<CredentialStore, CrmError> {
        Ok(CredentialStore::in_dir(&self.settings.credentials_dir()?))
    }

    pub fn oauth_client(&self) -> OAuthClient {
        OAuthClient::new(
            Arc::clone(&self.transport),
            self.settings.oauth.clone(),
            self.settings.accounts_base_url(),
        )
    }

    pub fn token_manager(&self) -> Result<TokenManager, CrmError> {
        Ok(TokenManager::new(
            self.credential_store()?,
            self.oauth_client(),
            Arc::clone(&self.clock),
        ))
    }

    pub fn gateway(&self) -> Result<Gateway, CrmError> {
        Ok(Gateway::new(
            Arc::clone(&self.transport),
            Box::new(self.token_manager()?),
            self.settings.api_base_url(),
            RequestLog::new(self.verbosity),
        ))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

pub fn load_settings(config_path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_global_config_path()?,
    };
    let settings = Settings::from_path(&path)?.with_env_overrides(|key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

/// Installs the stderr fmt subscriber. A second call is a no-op.
pub fn init_tracing(verbosity: Verbosity) {
    let filter = tracing_subscriber::EnvFilter::new(format!("bigin={}", verbosity.tracing_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn map_crm_err(err: CrmError) -> String {
    err.to_string()
}

pub fn render_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to encode output: {e}"))
}

/// `{"updated": n, "failed": m, "results": [...]}`; `updated` counts every
/// non-error item.
pub fn render_batch(items: &[BatchItem]) -> Result<String, String> {
    let failed = items.iter().filter(|item| item.is_error()).count();
    render_json(&json!({
        "updated": items.len() - failed,
        "failed": failed,
        "results": items,
    }))
}

pub fn parse_date(flag: &str, raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid argument: --{flag} `{raw}` must use the form YYYY-MM-DD"))
}

pub fn parse_optional_date(flag: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    raw.map(|raw| parse_date(flag, raw)).transpose()
}

pub fn parse_related(raw: Option<&str>) -> Result<Option<RelatedTo>, String> {
    raw.map(RelatedTo::parse).transpose().map_err(map_crm_err)
}
