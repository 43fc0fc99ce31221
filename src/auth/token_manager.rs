use super::callback::CallbackListener;
use super::credential_store::{CredentialRecord, CredentialStore};
use super::oauth::{generate_state, OAuthClient};
use crate::error::CrmError;
use crate::gateway::BearerTokenSource;
use crate::shared::clock::Clock;
use chrono::{TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Seconds before declared expiry at which a token is refreshed.
pub const REFRESH_BUFFER_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Unauthenticated,
    Valid,
    /// Inside the refresh buffer but not past the declared lifetime.
    Expiring,
    RefreshRequired,
    Revoked,
}

impl TokenState {
    pub fn needs_refresh(self) -> bool {
        matches!(self, Self::Expiring | Self::RefreshRequired)
    }
}

pub fn state_of(record: Option<&CredentialRecord>, now: i64) -> TokenState {
    let Some(record) = record else {
        return TokenState::Unauthenticated;
    };
    let age = record.age_secs(now);
    if age >= record.expires_in {
        TokenState::RefreshRequired
    } else if age >= record.expires_in - REFRESH_BUFFER_SECS {
        TokenState::Expiring
    } else {
        TokenState::Valid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub state: TokenState,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_center: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<i64>,
    pub refreshable: bool,
    pub credentials_path: String,
}

/// Owns the stored credential: code exchange, lazy refresh, revocation.
pub struct TokenManager {
    store: CredentialStore,
    oauth: OAuthClient,
    clock: Arc<dyn Clock>,
    revoked: bool,
}

impl TokenManager {
    pub fn new(store: CredentialStore, oauth: OAuthClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            oauth,
            clock,
            revoked: false,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    pub fn status(&self) -> Result<TokenStatus, CrmError> {
        let record = self.store.load()?;
        let now = self.clock.now_secs();
        let state = if self.revoked && record.is_none() {
            TokenState::Revoked
        } else {
            state_of(record.as_ref(), now)
        };
        let expires_at = record.as_ref().and_then(|r| {
            Utc.timestamp_opt(r.expires_at(), 0)
                .single()
                .map(|at| at.to_rfc3339())
        });
        Ok(TokenStatus {
            state,
            authenticated: matches!(state, TokenState::Valid)
                || (state.needs_refresh() && record.as_ref().is_some_and(|r| r.is_refreshable())),
            data_center: record.as_ref().map(|r| r.data_center.clone()),
            expires_at,
            seconds_remaining: record.as_ref().map(|r| r.expires_at() - now),
            refreshable: record.as_ref().is_some_and(|r| r.is_refreshable()),
            credentials_path: self.store.path().display().to_string(),
        })
    }

    /// Exchanges an authorization code and persists the new record.
    pub fn complete_login(&self, code: &str) -> Result<CredentialRecord, CrmError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CrmError::InvalidArgument(
                "authorization code must be non-empty".to_string(),
            ));
        }
        let (access_token, reply) = self.oauth.exchange_code(code)?;
        let record = reply.into_record(
            access_token,
            None,
            self.oauth.data_center(),
            self.clock.now_secs(),
        );
        self.store.save(&record)?;
        tracing::info!(data_center = %record.data_center, "authentication complete");
        Ok(record)
    }

    /// Runs the browser flow: `announce` receives the authorization URL,
    /// then the listener waits for the redirect.
    pub fn login_with_listener(
        &self,
        listener: &CallbackListener,
        timeout: Duration,
        announce: &mut dyn FnMut(&str),
    ) -> Result<CredentialRecord, CrmError> {
        let state = generate_state()?;
        let url = self.oauth.authorization_url(Some(&state))?;
        announce(&url);
        let code = listener.wait_for_code(timeout, Some(&state))?;
        self.complete_login(&code)
    }

    /// Current access token, refreshing first when inside the buffer.
    pub fn get_access_token(&self) -> Result<String, CrmError> {
        let record = self
            .store
            .load()?
            .ok_or_else(|| CrmError::credentials_missing("no stored credentials"))?;
        let state = state_of(Some(&record), self.clock.now_secs());
        if !state.needs_refresh() {
            return Ok(record.access_token);
        }
        let refresh_token = record
            .refresh_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                CrmError::credentials_missing("access token expired and no refresh token is stored")
            })?;
        let (access_token, reply) = self.oauth.refresh(&refresh_token)?;
        let refreshed = reply.into_record(
            access_token,
            Some(refresh_token),
            &record.data_center,
            self.clock.now_secs(),
        );
        self.store.save(&refreshed)?;
        tracing::info!(state = ?state, "access token refreshed");
        Ok(refreshed.access_token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.get_access_token().is_ok()
    }

    /// Revokes the refresh token (or the access token when none is stored)
    /// and deletes the local record.
    pub fn revoke(&mut self) -> Result<(), CrmError> {
        let record = self
            .store
            .load()?
            .ok_or_else(|| CrmError::credentials_missing("nothing to revoke"))?;
        let token = record
            .refresh_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .unwrap_or(&record.access_token);
        self.oauth.revoke(token)?;
        self.store.delete()?;
        self.revoked = true;
        tracing::info!("credentials revoked");
        Ok(())
    }
}

impl BearerTokenSource for TokenManager {
    fn bearer_token(&self) -> Result<String, CrmError> {
        self.get_access_token()
    }
}
