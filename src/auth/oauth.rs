use super::credential_store::{CredentialRecord, DEFAULT_EXPIRES_IN_SECS};
use crate::config::OAuthSettings;
use crate::error::CrmError;
use crate::gateway::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use serde::Deserialize;
use std::sync::Arc;

/// Token endpoint reply. The endpoint may answer `200` with an `error` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub api_domain: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TokenResponse {
    /// Builds the record to persist. `previous_refresh_token` is kept when
    /// the response carries none.
    pub fn into_record(
        self,
        access_token: String,
        previous_refresh_token: Option<String>,
        data_center: &str,
        issued_at: i64,
    ) -> CredentialRecord {
        CredentialRecord {
            access_token,
            refresh_token: self
                .refresh_token
                .filter(|token| !token.trim().is_empty())
                .or(previous_refresh_token),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: self.scope,
            data_center: data_center.to_string(),
            issued_at,
            expires_in: self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            api_domain: self.api_domain,
        }
    }
}

/// Random `state` value for the authorization request.
pub fn generate_state() -> Result<String, CrmError> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).map_err(|err| CrmError::Io {
        path: "os random source".to_string(),
        source: std::io::Error::other(err.to_string()),
    })?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

/// Accounts-server client: authorization URL, code and refresh grants,
/// revocation.
#[derive(Clone)]
pub struct OAuthClient {
    transport: Arc<dyn HttpTransport>,
    settings: OAuthSettings,
    accounts_base_url: String,
}

impl OAuthClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        settings: OAuthSettings,
        accounts_base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            settings,
            accounts_base_url: accounts_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn data_center(&self) -> &str {
        &self.settings.data_center
    }

    pub fn redirect_uri(&self) -> &str {
        &self.settings.redirect_uri
    }

    pub fn authorization_url(&self, state: Option<&str>) -> Result<String, CrmError> {
        let endpoint = format!("{}/oauth/v2/auth", self.accounts_base_url);
        let mut params = vec![
            ("scope", self.settings.scope.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("response_type", "code"),
            ("access_type", "offline"),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];
        if let Some(state) = state {
            params.push(("state", state));
        }
        url::Url::parse_with_params(&endpoint, &params)
            .map(String::from)
            .map_err(|err| {
                CrmError::InvalidArgument(format!("accounts url `{endpoint}` is invalid: {err}"))
            })
    }

    pub fn exchange_code(&self, code: &str) -> Result<(String, TokenResponse), CrmError> {
        tracing::info!("exchanging authorization code");
        self.token_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ])
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<(String, TokenResponse), CrmError> {
        tracing::info!("refreshing access token");
        self.token_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ])
    }

    pub fn revoke(&self, token: &str) -> Result<(), CrmError> {
        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/oauth/v2/token/revoke", self.accounts_base_url),
        )
        .form(&[("token", token)]);
        let response = self.transport.send(&request)?;
        if !response.is_success() {
            return Err(upstream(response));
        }
        Ok(())
    }

    /// Posts a token grant; returns the access token with the full reply.
    fn token_grant(&self, form: &[(&str, &str)]) -> Result<(String, TokenResponse), CrmError> {
        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/oauth/v2/token", self.accounts_base_url),
        )
        .form(form);
        let response = self.transport.send(&request)?;
        if !response.is_success() {
            return Err(upstream(response));
        }
        let reply: TokenResponse =
            serde_json::from_str(&response.body).map_err(|source| CrmError::Parse {
                context: "token endpoint response".to_string(),
                source,
            })?;
        if reply.error.is_some() {
            return Err(upstream(response));
        }
        match reply.access_token.clone().filter(|t| !t.trim().is_empty()) {
            Some(access_token) => Ok((access_token, reply)),
            None => Err(upstream(response)),
        }
    }
}

fn upstream(response: HttpResponse) -> CrmError {
    CrmError::Upstream {
        status: response.status,
        body: response.body,
    }
}
