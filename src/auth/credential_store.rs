use crate::error::CrmError;
use crate::shared::fs_atomic::{atomic_write_file_with_mode, PRIVATE_FILE_MODE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CREDENTIALS_FILE_NAME: &str = "bigin-crm.json";
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn default_data_center() -> String {
    crate::config::DEFAULT_DATA_CENTER.to_string()
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

/// OAuth token material as persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default = "default_data_center")]
    pub data_center: String,
    /// Unix seconds when the access token was issued.
    #[serde(default, alias = "saved_at")]
    pub issued_at: i64,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_domain: Option<String>,
}

impl CredentialRecord {
    pub fn expires_at(&self) -> i64 {
        self.issued_at.saturating_add(self.expires_in)
    }

    pub fn age_secs(&self, now: i64) -> i64 {
        now.saturating_sub(self.issued_at)
    }

    pub fn is_refreshable(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }
}

/// Single credential file, written atomically with owner-only permissions.
/// There is no cross-process lock: concurrent writers race and the last
/// rename wins.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(CREDENTIALS_FILE_NAME),
        }
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, record: &CredentialRecord) -> Result<(), CrmError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CrmError::io(parent, e))?;
        }
        let body = serde_json::to_vec_pretty(record).map_err(|source| CrmError::Parse {
            context: "credential record".to_string(),
            source,
        })?;
        atomic_write_file_with_mode(&self.path, &body, PRIVATE_FILE_MODE)
            .map_err(|e| CrmError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    /// `Ok(None)` when no credential file exists.
    pub fn load(&self) -> Result<Option<CredentialRecord>, CrmError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CrmError::io(&self.path, err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| CrmError::Parse {
                context: format!("credential file {}", self.path.display()),
                source,
            })
    }

    /// Removes the credential file; a missing file is not an error.
    pub fn delete(&self) -> Result<(), CrmError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CrmError::io(&self.path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_saved_at_and_missing_fields_fill_defaults() {
        let record: CredentialRecord = serde_json::from_str(
            r#"{"access_token":"at","refresh_token":"rt","saved_at":1700000000,"created_at":"{}"}"#,
        )
        .expect("parse");
        assert_eq!(record.issued_at, 1_700_000_000);
        assert_eq!(record.expires_in, DEFAULT_EXPIRES_IN_SECS);
        assert_eq!(record.data_center, "com");
        assert_eq!(record.token_type, "Bearer");
        assert_eq!(record.expires_at(), 1_700_003_600);
        assert!(record.is_refreshable());
    }

    #[test]
    fn blank_refresh_token_is_not_refreshable() {
        let record: CredentialRecord =
            serde_json::from_str(r#"{"access_token":"at","refresh_token":" "}"#).expect("parse");
        assert!(!record.is_refreshable());
    }
}
