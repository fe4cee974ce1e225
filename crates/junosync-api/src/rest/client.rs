// REST RPC client
//
// Wraps `reqwest::Client` with device URL construction, basic auth and
// reply decoding. The `CommandChannel` implementation lives in `channel.rs`
// next door so this module stays focused on transport mechanics.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, trace};
use url::Url;

use crate::auth::{ApiFlavor, Credentials};
use crate::error::Error;
use crate::rest::reply::{self, Severity};
use crate::transport::TransportConfig;

/// A decoded RPC reply with no error-severity diagnostics.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub body: String,
    pub warnings: Vec<String>,
}

/// Raw HTTP client for the on-box REST RPC service.
///
/// Every request is an independent management session on the device, so
/// the client tracks staged directives and the lock flag itself and
/// replays them inside a single multi-RPC request at validate/commit time.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    flavor: ApiFlavor,
    timeout: Duration,
    pub(crate) staged: Mutex<Vec<String>>,
    pub(crate) locked: AtomicBool,
    closed: AtomicBool,
}

impl RestClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the device root, e.g. `https://fw1.example.net:3443`.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials, transport.timeout))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Credentials,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
            flavor: ApiFlavor::default(),
            timeout,
            staged: Mutex::new(Vec::new()),
            locked: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Select the URL layout of the management API.
    pub fn with_flavor(mut self, flavor: ApiFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/rpc?stop-on-error=1`
    pub(crate) fn rpc_url(&self) -> Result<Url, Error> {
        let mut url = self.base_url.join(self.flavor.rpc_path())?;
        url.set_query(Some("stop-on-error=1"));
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// POST one or more RPC elements and return the raw reply body.
    ///
    /// Only transport and HTTP failures are errors here; `<rpc-error>`
    /// entries are left in the body.
    pub(crate) async fn post_raw(&self, rpc: &str, body: String) -> Result<String, Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }

        let url = self.rpc_url()?;
        debug!(rpc, "POST {}", url);
        trace!(body = %body, "rpc request");

        let builder = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .header(reqwest::header::ACCEPT, "application/xml")
            .body(body);
        let resp = self
            .credentials
            .apply(builder)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "device rejected credentials (HTTP 401)".into(),
            });
        }

        let text = resp.text().await.map_err(|e| self.map_transport(e))?;
        trace!(status = %status, body = %text, "rpc reply");

        if !status.is_success() {
            if let Some(message) = first_error(&text) {
                return Err(Error::Rpc {
                    rpc: rpc.to_owned(),
                    message,
                });
            }
            return Err(Error::Http {
                status: status.as_u16(),
                message: preview(&text),
            });
        }

        Ok(text)
    }

    /// POST and fail on any error-severity diagnostic, collecting warnings.
    pub(crate) async fn call(&self, rpc: &str, body: String) -> Result<Reply, Error> {
        let body = self.post_raw(rpc, body).await?;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for diag in reply::diagnostics(&body)? {
            match diag.severity {
                Severity::Error => errors.push(diag.message),
                Severity::Warning => warnings.push(diag.message),
            }
        }
        if !errors.is_empty() {
            return Err(Error::Rpc {
                rpc: rpc.to_owned(),
                message: errors.join("; "),
            });
        }
        for warning in &warnings {
            debug!(rpc, warning = %warning, "rpc warning");
        }
        Ok(Reply { body, warnings })
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

fn first_error(body: &str) -> Option<String> {
    reply::diagnostics(body)
        .unwrap_or_default()
        .into_iter()
        .find(|d| d.severity == Severity::Error)
        .map(|d| d.message)
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
