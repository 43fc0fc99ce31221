#![allow(dead_code)]

use bigin::gateway::{
    Gateway, HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody, RequestLog,
    StaticToken,
};
use bigin::CrmError;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const API_BASE: &str = "https://crm.test/bigin/v2";
pub const ACCOUNTS_BASE: &str = "https://accounts.test";

type Responder = dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync;

/// In-memory transport: records every request and answers from a closure.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock requests").clone()
    }

    /// `METHOD path` for every request, with the base url stripped.
    pub fn routes(&self) -> Vec<String> {
        self.requests().iter().map(route).collect()
    }

    pub fn count(&self, method: HttpMethod) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method)
            .count()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, CrmError> {
        self.requests
            .lock()
            .expect("lock requests")
            .push(request.clone());
        Ok((self.responder)(request))
    }
}

pub fn path_of(request: &HttpRequest) -> &str {
    request
        .url
        .strip_prefix(API_BASE)
        .or_else(|| request.url.strip_prefix(ACCOUNTS_BASE))
        .unwrap_or(&request.url)
}

pub fn route(request: &HttpRequest) -> String {
    format!("{} {}", request.method, path_of(request))
}

pub fn json_body(request: &HttpRequest) -> Value {
    match &request.body {
        RequestBody::Json(body) => body.clone(),
        other => panic!("expected json body, got {other:?}"),
    }
}

/// The single record inside a `{"data": [...]}` write payload.
pub fn written_record(request: &HttpRequest) -> Value {
    json_body(request)["data"][0].clone()
}

pub fn ok(body: Value) -> HttpResponse {
    HttpResponse::new(200, body.to_string())
}

pub fn envelope(records: Vec<Value>) -> HttpResponse {
    ok(json!({ "data": records }))
}

pub fn write_ok(id: &str) -> HttpResponse {
    ok(json!({
        "data": [{"code": "SUCCESS", "details": {"id": id}, "status": "success"}]
    }))
}

pub fn pipeline(id: &str, stage: &str) -> Value {
    json!({
        "id": id,
        "Deal_Name": format!("Deal {id}"),
        "Stage": stage,
    })
}

pub fn gateway(transport: Arc<ScriptedTransport>) -> Gateway {
    Gateway::new(
        transport,
        Box::new(StaticToken("test-token".to_string())),
        API_BASE,
        RequestLog::default(),
    )
}
