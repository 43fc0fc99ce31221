//! OAuth credential lifecycle: on-disk store, accounts-server client,
//! redirect listener and the token manager tying them together.

pub mod callback;
pub mod credential_store;
pub mod oauth;
pub mod token_manager;

pub use callback::CallbackListener;
pub use credential_store::{CredentialRecord, CredentialStore, CREDENTIALS_FILE_NAME};
pub use oauth::{generate_state, OAuthClient, TokenResponse};
pub use token_manager::{state_of, TokenManager, TokenState, TokenStatus, REFRESH_BUFFER_SECS};

use crate::error::CrmError;
use crate::gateway::Gateway;
use serde_json::Value;

/// Organization of the authenticated user.
pub fn whoami(gateway: &Gateway) -> Result<Value, CrmError> {
    gateway.get("org", &[])
}
