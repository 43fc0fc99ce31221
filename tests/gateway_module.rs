mod support;

use bigin::auth::{CredentialRecord, CredentialStore, OAuthClient, TokenManager};
use bigin::config::OAuthSettings;
use bigin::gateway::{Gateway, RequestLog, StaticToken, UreqTransport, Verbosity};
use bigin::shared::clock::FixedClock;
use bigin::CrmError;
use serde_json::json;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use support::ScriptedTransport;

#[derive(Debug, Clone)]
struct RecordedRequest {
    request_line: String,
    auth_header: String,
    body: String,
}

struct MockCrmServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockCrmServer {
    /// Serves one canned `(status line, body)` per accepted connection.
    fn start(responses: Vec<(&'static str, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let requests_for_thread = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            for (status, response_body) in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

                let mut request_line = String::new();
                reader
                    .read_line(&mut request_line)
                    .expect("read request line");

                let mut auth_header = String::new();
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).expect("read header");
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    let lower = line.to_ascii_lowercase();
                    if lower.starts_with("authorization:") {
                        auth_header = line
                            .split_once(':')
                            .map(|(_, v)| v.trim().to_string())
                            .unwrap_or_default();
                    }
                    if lower.starts_with("content-length:") {
                        content_length = line
                            .split_once(':')
                            .map(|(_, v)| v.trim().parse::<usize>().unwrap_or(0))
                            .unwrap_or(0);
                    }
                }

                let mut body = vec![0_u8; content_length];
                if content_length > 0 {
                    reader.read_exact(&mut body).expect("read body");
                }

                requests_for_thread
                    .lock()
                    .expect("lock requests")
                    .push(RecordedRequest {
                        request_line: request_line.trim_end().to_string(),
                        auth_header,
                        body: String::from_utf8_lossy(&body).to_string(),
                    });

                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response_body.len(),
                    response_body
                );
                stream
                    .write_all(response.as_bytes())
                    .expect("write response");
            }
        });

        Self {
            base_url: format!("http://{addr}/bigin/v2"),
            requests,
            handle: Some(handle),
        }
    }

    fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("join mock server");
        }
        self.requests.lock().expect("lock requests").clone()
    }
}

fn live_gateway(base_url: &str) -> Gateway {
    Gateway::new(
        Arc::new(UreqTransport::with_timeout(Duration::from_secs(5))),
        Box::new(StaticToken("live-token".to_string())),
        base_url,
        RequestLog::new(Verbosity::Debug),
    )
}

#[test]
fn gateway_sends_zoho_auth_header_and_normalizes_no_content() {
    let server = MockCrmServer::start(vec![("204 No Content", String::new())]);
    let gateway = live_gateway(&server.base_url);

    let value = gateway
        .get("Pipelines/search", &[("word", "Acme Corp".to_string())])
        .expect("search");
    assert_eq!(value, json!({"data": []}));

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].request_line,
        "GET /bigin/v2/Pipelines/search?word=Acme+Corp HTTP/1.1"
    );
    assert_eq!(requests[0].auth_header, "Zoho-oauthtoken live-token");
}

#[test]
fn gateway_reports_error_status_with_body() {
    let server = MockCrmServer::start(vec![(
        "404 Not Found",
        r#"{"code":"INVALID_URL_PATTERN"}"#.to_string(),
    )]);
    let gateway = live_gateway(&server.base_url);

    let err = gateway.get("Nope", &[]).expect_err("404");
    match err {
        CrmError::Upstream { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("INVALID_URL_PATTERN"));
        }
        other => panic!("unexpected error: {other}"),
    }
    server.finish();
}

#[test]
fn gateway_posts_json_payload_and_parses_reply() {
    let server = MockCrmServer::start(vec![(
        "201 Created",
        json!({"data": [{"code": "SUCCESS", "details": {"id": "77"}}]}).to_string(),
    )]);
    let gateway = live_gateway(&server.base_url);

    let reply = gateway
        .post_json("Contacts", json!({"data": [{"Last_Name": "Lovelace"}]}))
        .expect("create");
    assert_eq!(reply["data"][0]["details"]["id"], json!("77"));

    let requests = server.finish();
    assert!(requests[0].request_line.starts_with("POST /bigin/v2/Contacts "));
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).expect("json body");
    assert_eq!(body, json!({"data": [{"Last_Name": "Lovelace"}]}));
}

#[test]
fn connection_failure_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let gateway = live_gateway(&format!("http://{addr}/bigin/v2"));
    let err = gateway.get("Pipelines", &[]).expect_err("closed port");
    assert!(matches!(err, CrmError::Transport(_)), "got {err}");
}

#[test]
fn gateway_takes_bearer_token_from_token_manager() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::in_dir(temp.path());
    store
        .save(&CredentialRecord {
            access_token: "stored-access".to_string(),
            refresh_token: Some("rt".to_string()),
            token_type: "Bearer".to_string(),
            scope: None,
            data_center: "com".to_string(),
            issued_at: 5_000,
            expires_in: 3600,
            api_domain: None,
        })
        .expect("save");

    let transport = ScriptedTransport::new(|_| support::envelope(vec![json!({"id": "org-1"})]));
    let tokens = TokenManager::new(
        store,
        OAuthClient::new(
            transport.clone(),
            OAuthSettings {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                data_center: "com".to_string(),
                redirect_uri: "http://localhost:8888/callback".to_string(),
                scope: "ZohoBigin.org.READ".to_string(),
            },
            support::ACCOUNTS_BASE,
        ),
        Arc::new(FixedClock::at_secs(5_060)),
    );
    let gateway = Gateway::new(
        transport.clone(),
        Box::new(tokens),
        support::API_BASE,
        RequestLog::default(),
    );

    let org = bigin::auth::whoami(&gateway).expect("whoami");
    assert_eq!(org["data"][0]["id"], json!("org-1"));
    let requests = transport.requests();
    assert_eq!(support::route(&requests[0]), "GET /org");
    assert_eq!(
        requests[0].header_value("Authorization"),
        Some("Zoho-oauthtoken stored-access")
    );
}

#[test]
fn missing_credentials_fail_before_any_request() {
    let temp = tempfile::tempdir().expect("tempdir");
    let transport = ScriptedTransport::new(|_| panic!("no request expected"));
    let tokens = TokenManager::new(
        CredentialStore::in_dir(temp.path()),
        OAuthClient::new(
            transport.clone(),
            OAuthSettings {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                data_center: "com".to_string(),
                redirect_uri: "http://localhost:8888/callback".to_string(),
                scope: "ZohoBigin.org.READ".to_string(),
            },
            support::ACCOUNTS_BASE,
        ),
        Arc::new(FixedClock::at_secs(0)),
    );
    let gateway = Gateway::new(
        transport.clone(),
        Box::new(tokens),
        support::API_BASE,
        RequestLog::default(),
    );

    let err = gateway.get("Pipelines", &[]).expect_err("no credentials");
    assert!(matches!(err, CrmError::CredentialsMissing { .. }));
    assert!(transport.requests().is_empty());
}
