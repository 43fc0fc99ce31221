use super::transport::{HttpRequest, HttpResponse, RequestBody};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BODY_PREVIEW_CHARS: usize = 500;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Debug,
}

impl Verbosity {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quiet" | "warn" | "error" => Ok(Self::Quiet),
            "normal" | "info" => Ok(Self::Normal),
            "debug" | "trace" => Ok(Self::Debug),
            other => Err(format!(
                "log level must be one of: quiet, normal, debug (got `{other}`)"
            )),
        }
    }

    /// Maps repeated `-v` flags onto a level; zero keeps `fallback`.
    pub fn from_flag_count(count: u8, fallback: Self) -> Self {
        match count {
            0 => fallback,
            1 => Self::Normal.max(fallback),
            _ => Self::Debug,
        }
    }

    pub fn tracing_filter(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Debug => "debug",
        }
    }
}

/// Request/response logger handed to the gateway. Authorization headers are
/// never written; bodies are only written at `Debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLog {
    verbosity: Verbosity,
}

impl RequestLog {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn request(&self, request: &HttpRequest) {
        match self.verbosity {
            Verbosity::Quiet => {}
            Verbosity::Normal => {
                tracing::info!(method = %request.method, url = %request.url, "crm request");
            }
            Verbosity::Debug => {
                let body = match &request.body {
                    RequestBody::Empty => String::new(),
                    RequestBody::Json(value) => preview_body(&value.to_string()),
                    RequestBody::Form(fields) => fields
                        .iter()
                        .map(|(k, _)| format!("{k}=<redacted>"))
                        .collect::<Vec<_>>()
                        .join("&"),
                };
                tracing::debug!(
                    method = %request.method,
                    url = %request.full_url(),
                    body = %body,
                    "crm request"
                );
            }
        }
    }

    pub fn response(&self, request: &HttpRequest, response: &HttpResponse, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match self.verbosity {
            Verbosity::Quiet => {
                if !response.is_success() {
                    tracing::warn!(
                        method = %request.method,
                        url = %request.url,
                        status = response.status,
                        "crm request failed"
                    );
                }
            }
            Verbosity::Normal => {
                tracing::info!(
                    method = %request.method,
                    url = %request.url,
                    status = response.status,
                    elapsed_ms,
                    "crm response"
                );
            }
            Verbosity::Debug => {
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    status = response.status,
                    elapsed_ms,
                    body = %preview_body(&response.body),
                    "crm response"
                );
            }
        }
    }
}

pub(crate) fn preview_body(body: &str) -> String {
    match body.char_indices().nth(BODY_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}
