//! Authenticated request gateway.
//!
//! Every CRM call goes through [`Gateway`]: it asks a [`BearerTokenSource`]
//! for a token, attaches the `Zoho-oauthtoken` authorization header, sends the
//! request through an [`HttpTransport`] and normalizes the response into a
//! JSON envelope.

pub mod criteria;
pub mod request_log;
pub mod transport;

pub use criteria::{Criteria, CriteriaOperator, EMPTY_VALUE};
pub use request_log::{RequestLog, Verbosity};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody, UreqTransport,
};

use crate::error::CrmError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

pub const AUTHORIZATION_SCHEME: &str = "Zoho-oauthtoken";

/// Supplies a currently-valid bearer token.
pub trait BearerTokenSource {
    fn bearer_token(&self) -> Result<String, CrmError>;
}

/// A fixed token, for callers that manage credentials themselves.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl BearerTokenSource for StaticToken {
    fn bearer_token(&self) -> Result<String, CrmError> {
        Ok(self.0.clone())
    }
}

pub fn empty_envelope() -> Value {
    json!({ "data": [] })
}

/// 204 and empty bodies become `{"data": []}`; any non-2xx status is an
/// upstream error carrying the status and body.
pub fn normalize_response(response: HttpResponse) -> Result<Value, CrmError> {
    if !response.is_success() {
        return Err(CrmError::Upstream {
            status: response.status,
            body: response.body,
        });
    }
    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(empty_envelope());
    }
    serde_json::from_str(&response.body).map_err(|source| CrmError::Parse {
        context: "crm response body".to_string(),
        source,
    })
}

pub struct Gateway {
    transport: Arc<dyn HttpTransport>,
    tokens: Box<dyn BearerTokenSource>,
    base_url: String,
    log: RequestLog,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Box<dyn BearerTokenSource>,
        base_url: impl Into<String>,
        log: RequestLog,
    ) -> Self {
        Self {
            transport,
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            log,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, CrmError> {
        let mut request = HttpRequest::new(HttpMethod::Get, self.endpoint(path));
        for (key, value) in query {
            request = request.query(key, value.clone());
        }
        self.execute(request)
    }

    pub fn post_json(&self, path: &str, body: Value) -> Result<Value, CrmError> {
        self.execute(HttpRequest::new(HttpMethod::Post, self.endpoint(path)).json(body))
    }

    pub fn put_json(&self, path: &str, body: Value) -> Result<Value, CrmError> {
        self.execute(HttpRequest::new(HttpMethod::Put, self.endpoint(path)).json(body))
    }

    pub fn delete(&self, path: &str) -> Result<Value, CrmError> {
        self.execute(HttpRequest::new(HttpMethod::Delete, self.endpoint(path)))
    }

    fn execute(&self, request: HttpRequest) -> Result<Value, CrmError> {
        let token = self.tokens.bearer_token()?;
        let request = request.header("Authorization", format!("{AUTHORIZATION_SCHEME} {token}"));
        self.log.request(&request);
        let started = Instant::now();
        let response = self.transport.send(&request)?;
        self.log.response(&request, &response, started.elapsed());
        normalize_response(response)
    }
}
