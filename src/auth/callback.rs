//! One-shot HTTP listener for the OAuth redirect.

use crate::error::CrmError;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on how long a login waits for the browser.
pub const MAX_CALLBACK_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

const SUCCESS_PAGE: &str = "<html><body><h1>Authentication successful</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";

pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

enum Callback {
    Code(String),
    Denied(String),
    Ignored,
}

impl CallbackListener {
    /// Binds the host and port of `redirect_uri`.
    pub fn bind(redirect_uri: &str) -> Result<Self, CrmError> {
        let url = url::Url::parse(redirect_uri).map_err(|err| {
            CrmError::InvalidArgument(format!("redirect uri `{redirect_uri}` is invalid: {err}"))
        })?;
        let host = url.host_str().unwrap_or("127.0.0.1");
        let host = if host == "localhost" { "127.0.0.1" } else { host };
        let port = url.port_or_known_default().unwrap_or(80);
        let listener = TcpListener::bind((host, port)).map_err(|err| {
            CrmError::Transport(format!(
                "failed to bind callback listener on {host}:{port}: {err}"
            ))
        })?;
        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CrmError> {
        self.listener
            .local_addr()
            .map_err(|err| CrmError::Transport(err.to_string()))
    }

    /// Waits for a redirect carrying `code`. Requests for other paths or
    /// without a code are answered and ignored.
    pub fn wait_for_code(
        &self,
        timeout: Duration,
        expected_state: Option<&str>,
    ) -> Result<String, CrmError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|err| CrmError::Transport(err.to_string()))?;
        let timeout = timeout.min(MAX_CALLBACK_WAIT);
        let started = Instant::now();
        let deadline = started.checked_add(timeout).unwrap_or(started);
        tracing::info!(path = %self.path, timeout_secs = timeout.as_secs(), "waiting for authorization callback");
        while Instant::now() < deadline {
            match self.listener.accept() {
                Ok((stream, _)) => match self.handle(stream, expected_state) {
                    Ok(Callback::Code(code)) => return Ok(code),
                    Ok(Callback::Denied(reason)) => {
                        return Err(CrmError::AuthorizationDenied(reason))
                    }
                    Ok(Callback::Ignored) => {}
                    Err(err) => tracing::warn!(error = %err, "malformed callback request"),
                },
                Err(err) if err.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(err) => return Err(CrmError::Transport(err.to_string())),
            }
        }
        Err(CrmError::AuthTimeout {
            waited_secs: timeout.as_secs(),
        })
    }

    fn handle(
        &self,
        mut stream: TcpStream,
        expected_state: Option<&str>,
    ) -> std::io::Result<Callback> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(STREAM_READ_TIMEOUT))?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line)?;
            if line == "\r\n" || line == "\n" || line.is_empty() {
                break;
            }
        }

        let target = request_line.split_whitespace().nth(1).unwrap_or("/");
        let parsed = url::Url::parse(&format!("http://localhost{target}")).ok();
        let Some(parsed) = parsed.filter(|url| url.path() == self.path) else {
            respond(&mut stream, "404 Not Found", "not found")?;
            return Ok(Callback::Ignored);
        };
        let param = |name: &str| {
            parsed
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(error) = param("error") {
            respond(&mut stream, "400 Bad Request", "Authentication failed.")?;
            return Ok(Callback::Denied(error));
        }
        let Some(code) = param("code").filter(|code| !code.is_empty()) else {
            respond(&mut stream, "400 Bad Request", "Authentication failed. No code received.")?;
            return Ok(Callback::Ignored);
        };
        if let Some(expected) = expected_state {
            if param("state").as_deref() != Some(expected) {
                respond(&mut stream, "400 Bad Request", "Authentication failed. State mismatch.")?;
                return Ok(Callback::Denied("state parameter mismatch".to_string()));
            }
        }
        respond(&mut stream, "200 OK", SUCCESS_PAGE)?;
        Ok(Callback::Code(code))
    }
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()
}
