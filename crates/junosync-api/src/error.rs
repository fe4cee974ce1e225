use thiserror::Error;

/// Top-level error type for the `junosync-api` crate.
///
/// Covers every failure mode of the remote command channel: authentication,
/// transport, RPC errors reported by the device, and malformed replies.
/// `junosync-core` maps these into engine-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected by the device (HTTP 401, bad credentials).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The session was closed and can no longer carry commands.
    #[error("Session closed")]
    SessionClosed,

    // ── Device ──────────────────────────────────────────────────────
    /// `<rpc-error>` with severity `error` returned by the device.
    #[error("RPC {rpc} failed: {message}")]
    Rpc { rpc: String, message: String },

    /// HTTP-level failure that carried no structured RPC error.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Reply body could not be decoded, with the raw body for debugging.
    #[error("Malformed reply: {message}")]
    Deserialization { message: String, body: String },

    /// Directive that is neither `set` nor `delete`.
    #[error("Unsupported directive: {0}")]
    UnsupportedDirective(String),
}

impl Error {
    /// Returns `true` if the device reported the candidate database locked
    /// by another session.
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Self::Rpc { message, .. } => {
                let msg = message.to_ascii_lowercase();
                msg.contains("database locked")
                    || msg.contains("lock failed")
                    || msg.contains("configuration database modified")
            }
            _ => false,
        }
    }
}
