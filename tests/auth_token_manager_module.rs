mod support;

use bigin::auth::{CredentialRecord, CredentialStore, OAuthClient, TokenManager, TokenState};
use bigin::config::OAuthSettings;
use bigin::gateway::{HttpMethod, HttpResponse};
use bigin::shared::clock::FixedClock;
use bigin::CrmError;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use support::{ScriptedTransport, ACCOUNTS_BASE};

const ISSUED_AT: i64 = 1_000_000;

fn oauth_settings() -> OAuthSettings {
    OAuthSettings {
        client_id: "client-1".to_string(),
        client_secret: "secret-1".to_string(),
        data_center: "com".to_string(),
        redirect_uri: "http://localhost:8888/callback".to_string(),
        scope: "ZohoBigin.modules.ALL".to_string(),
    }
}

fn stored(refresh_token: Option<&str>) -> CredentialRecord {
    CredentialRecord {
        access_token: "old-access".to_string(),
        refresh_token: refresh_token.map(str::to_string),
        token_type: "Bearer".to_string(),
        scope: None,
        data_center: "com".to_string(),
        issued_at: ISSUED_AT,
        expires_in: 3600,
        api_domain: None,
    }
}

fn manager(store: CredentialStore, transport: Arc<ScriptedTransport>, now: i64) -> TokenManager {
    TokenManager::new(
        store,
        OAuthClient::new(transport, oauth_settings(), ACCOUNTS_BASE),
        Arc::new(FixedClock::at_secs(now)),
    )
}

fn refresh_reply(access_token: &str) -> HttpResponse {
    HttpResponse::new(
        200,
        json!({"access_token": access_token, "expires_in": 3600, "token_type": "Bearer"})
            .to_string(),
    )
}

#[test]
fn valid_token_is_returned_without_network_calls() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::in_dir(temp.path());
    store.save(&stored(Some("rt"))).expect("save");
    let transport = ScriptedTransport::new(|_| panic!("no request expected"));

    let tokens = manager(store, transport.clone(), ISSUED_AT + 60);
    assert_eq!(tokens.get_access_token().expect("token"), "old-access");
    assert!(transport.requests().is_empty());
}

#[test]
fn expiring_token_refreshes_once_and_keeps_refresh_token() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::in_dir(temp.path());
    store.save(&stored(Some("keep-me"))).expect("save");
    let transport = ScriptedTransport::new(|_| refresh_reply("new-access"));

    let now = ISSUED_AT + 3600 - 120;
    let tokens = manager(store.clone(), transport.clone(), now);
    assert_eq!(tokens.get_access_token().expect("token"), "new-access");
    assert_eq!(tokens.get_access_token().expect("cached"), "new-access");

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(support::route(&requests[0]), "POST /oauth/v2/token");
    assert_eq!(requests[0].form_value("grant_type"), Some("refresh_token"));
    assert_eq!(requests[0].form_value("refresh_token"), Some("keep-me"));
    assert_eq!(requests[0].form_value("client_secret"), Some("secret-1"));

    let saved = store.load().expect("load").expect("present");
    assert_eq!(saved.access_token, "new-access");
    assert_eq!(saved.refresh_token.as_deref(), Some("keep-me"));
    assert_eq!(saved.issued_at, now);
}

#[test]
fn expired_token_without_refresh_token_is_credentials_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::in_dir(temp.path());
    store.save(&stored(None)).expect("save");
    let transport = ScriptedTransport::new(|_| panic!("no request expected"));

    let tokens = manager(store, transport.clone(), ISSUED_AT + 7200);
    let err = tokens.get_access_token().expect_err("missing refresh token");
    assert!(matches!(err, CrmError::CredentialsMissing { .. }), "got {err}");
    assert!(!tokens.is_authenticated());
    assert!(transport.requests().is_empty());
}

#[test]
fn no_stored_credentials_is_credentials_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let transport = ScriptedTransport::new(|_| panic!("no request expected"));
    let tokens = manager(CredentialStore::in_dir(temp.path()), transport, ISSUED_AT);
    let err = tokens.get_access_token().expect_err("nothing stored");
    assert!(matches!(err, CrmError::CredentialsMissing { .. }));
    let status = tokens.status().expect("status");
    assert_eq!(status.state, TokenState::Unauthenticated);
    assert!(!status.authenticated);
}

#[test]
fn rejected_refresh_is_upstream_error_and_leaves_file_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::in_dir(temp.path());
    store.save(&stored(Some("rt"))).expect("save");
    let transport =
        ScriptedTransport::new(|_| HttpResponse::new(200, r#"{"error":"invalid_code"}"#));

    let tokens = manager(store.clone(), transport, ISSUED_AT + 7200);
    let err = tokens.get_access_token().expect_err("refresh rejected");
    assert!(matches!(err, CrmError::Upstream { .. }), "got {err}");
    assert_eq!(store.load().expect("load"), Some(stored(Some("rt"))));
}

#[test]
fn complete_login_exchanges_code_and_persists_record() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::in_dir(temp.path());
    let transport = ScriptedTransport::new(|_| {
        HttpResponse::new(
            200,
            json!({
                "access_token": "fresh",
                "refresh_token": "long-lived",
                "expires_in": 3600,
                "api_domain": "https://www.zohoapis.com"
            })
            .to_string(),
        )
    });

    let tokens = manager(store.clone(), transport.clone(), ISSUED_AT);
    let record = tokens.complete_login("code-123").expect("login");
    assert_eq!(record.refresh_token.as_deref(), Some("long-lived"));
    assert_eq!(store.load().expect("load"), Some(record));

    let requests = transport.requests();
    assert_eq!(requests[0].form_value("grant_type"), Some("authorization_code"));
    assert_eq!(requests[0].form_value("code"), Some("code-123"));
    assert_eq!(
        requests[0].form_value("redirect_uri"),
        Some("http://localhost:8888/callback")
    );

    let status = tokens.status().expect("status");
    assert_eq!(status.state, TokenState::Valid);
    assert!(status.authenticated);
    assert_eq!(status.seconds_remaining, Some(3600));
}

#[test]
fn revoke_posts_refresh_token_and_deletes_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::in_dir(temp.path());
    store.save(&stored(Some("rt-to-revoke"))).expect("save");
    let transport = ScriptedTransport::new(|_| HttpResponse::new(200, "{}"));

    let mut tokens = manager(store.clone(), transport.clone(), ISSUED_AT);
    tokens.revoke().expect("revoke");

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(support::route(&requests[0]), "POST /oauth/v2/token/revoke");
    assert_eq!(requests[0].form_value("token"), Some("rt-to-revoke"));
    assert!(!store.path().exists());
    assert_eq!(tokens.status().expect("status").state, TokenState::Revoked);
}

/// Two managers sharing one credential file both see the expired token,
/// both refresh, and the later write wins. There is no lock between them.
#[test]
fn concurrent_refresh_races_and_last_writer_wins() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::in_dir(temp.path());
    store.save(&stored(Some("shared-rt"))).expect("save");

    let inside_refresh = Arc::new(Barrier::new(2));
    let issued = Arc::new(AtomicUsize::new(0));
    let transport = {
        let inside_refresh = Arc::clone(&inside_refresh);
        let issued = Arc::clone(&issued);
        ScriptedTransport::new(move |_| {
            // Both callers must have read the stale record before either saves.
            inside_refresh.wait();
            let n = issued.fetch_add(1, Ordering::SeqCst) + 1;
            refresh_reply(&format!("access-{n}"))
        })
    };

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let tokens = manager(store.clone(), transport.clone(), ISSUED_AT + 7200);
            thread::spawn(move || tokens.get_access_token().expect("token"))
        })
        .collect();
    let mut tokens: Vec<String> = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .collect();
    tokens.sort();

    assert_eq!(tokens, vec!["access-1", "access-2"]);
    assert_eq!(transport.count(HttpMethod::Post), 2);
    let saved = store.load().expect("load").expect("present");
    assert!(tokens.contains(&saved.access_token));
    assert_eq!(saved.refresh_token.as_deref(), Some("shared-rt"));
}
