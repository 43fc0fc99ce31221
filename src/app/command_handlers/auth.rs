use crate::app::cli::AuthCommand;
use crate::app::command_support::{map_crm_err, render_json, CommandContext};
use crate::auth::{whoami, CallbackListener, CredentialRecord};
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::time::Duration;

pub fn cmd_auth(command: AuthCommand, context: &CommandContext) -> Result<String, String> {
    match command {
        AuthCommand::Login { code, timeout } => {
            let record = login(context, code.as_deref(), timeout)?;
            let expires_at = Utc
                .timestamp_opt(record.expires_at(), 0)
                .single()
                .map(|at| at.to_rfc3339());
            render_json(&json!({
                "status": "authenticated",
                "data_center": record.data_center,
                "expires_at": expires_at,
                "refreshable": record.is_refreshable(),
            }))
        }
        AuthCommand::Status => {
            let manager = context.token_manager().map_err(map_crm_err)?;
            render_json(&manager.status().map_err(map_crm_err)?)
        }
        AuthCommand::Whoami => {
            let gateway = context.gateway().map_err(map_crm_err)?;
            render_json(&whoami(&gateway).map_err(map_crm_err)?)
        }
        AuthCommand::Revoke => {
            let mut manager = context.token_manager().map_err(map_crm_err)?;
            manager.revoke().map_err(map_crm_err)?;
            render_json(&json!({
                "status": "revoked",
                "credentials_path": manager.store().path().display().to_string(),
            }))
        }
        AuthCommand::Url => {
            let url = context
                .oauth_client()
                .authorization_url(None)
                .map_err(map_crm_err)?;
            render_json(&json!({ "authorization_url": url }))
        }
    }
}

fn login(
    context: &CommandContext,
    code: Option<&str>,
    timeout: Option<u64>,
) -> Result<CredentialRecord, String> {
    let manager = context.token_manager().map_err(map_crm_err)?;
    if let Some(code) = code {
        return manager.complete_login(code).map_err(map_crm_err);
    }
    let listener = CallbackListener::bind(&context.settings.oauth.redirect_uri).map_err(map_crm_err)?;
    let timeout =
        Duration::from_secs(timeout.unwrap_or(context.settings.callback_timeout_secs).max(1));
    manager
        .login_with_listener(&listener, timeout, &mut |url| {
            eprintln!("Open this URL in your browser to authorize access:\n\n  {url}\n");
            eprintln!("Waiting for the redirect to {} ...", context.settings.oauth.redirect_uri);
        })
        .map_err(map_crm_err)
}
