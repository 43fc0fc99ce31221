mod error;
mod paths;
mod settings;

pub use error::ConfigError;
pub use paths::{
    default_credentials_dir, default_global_config_path, expand_home, CONFIG_PATH_ENV,
    CREDENTIALS_DIR_NAME, GLOBAL_SETTINGS_FILE_NAME, GLOBAL_STATE_DIR,
};
pub use settings::{
    OAuthSettings, Settings, DEFAULT_CALLBACK_TIMEOUT_SECS, DEFAULT_DATA_CENTER,
    DEFAULT_REDIRECT_URI, DEFAULT_SCOPE, SUPPORTED_DATA_CENTERS,
};
