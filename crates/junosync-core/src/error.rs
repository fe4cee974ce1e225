// ── Core error types ──
//
// User-facing errors from junosync-core. Consumers never see HTTP status
// codes or XML decoding failures directly: the `From<junosync_api::Error>`
// impl translates channel-level errors into engine-level variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Device connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Command channel error: {message}")]
    Channel { message: String },

    #[error("Cancelled while waiting for the configuration lock")]
    Cancelled,

    // ── Compiler errors ──────────────────────────────────────────────
    #[error("{resource}: invalid field `{field}`: {reason}")]
    StructuralConstraintViolation {
        resource: String,
        field: String,
        reason: String,
    },

    #[error("{resource}: conflicting options {fields}")]
    ConflictingOptions { resource: String, fields: String },

    // ── Parser errors ────────────────────────────────────────────────
    #[error("{resource}: cannot interpret device output line `{line}`: {reason}")]
    MalformedDeviceOutput {
        resource: String,
        line: String,
        reason: String,
    },

    // ── Allocator errors ─────────────────────────────────────────────
    #[error("No free identifier left in {namespace}")]
    AllocationExhausted { namespace: String },

    // ── Transaction errors ───────────────────────────────────────────
    #[error("{resource}: device rejected configuration: {message}")]
    ApplyRejected { resource: String, message: String },

    #[error("{resource}: commit check failed: {message}")]
    ValidationFailed { resource: String, message: String },

    #[error("{resource}: commit failed: {message}")]
    CommitFailed { resource: String, message: String },

    #[error("{resource}: committed but {reason}")]
    PostCommitDivergence { resource: String, reason: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{resource} already exists")]
    AlreadyExists { resource: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn violation(
        resource: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::StructuralConstraintViolation {
            resource: resource.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// `true` for errors caused by the caller's resource description.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::StructuralConstraintViolation { .. } | Self::ConflictingOptions { .. }
        )
    }
}

// ── Conversion from channel-level errors ─────────────────────────────

impl From<junosync_api::Error> for CoreError {
    fn from(err: junosync_api::Error) -> Self {
        match err {
            junosync_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            junosync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Channel {
                        message: e.to_string(),
                    }
                }
            }
            junosync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            junosync_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            junosync_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            junosync_api::Error::SessionClosed => CoreError::Channel {
                message: "session already closed".into(),
            },
            junosync_api::Error::Rpc { rpc, message } => CoreError::Channel {
                message: format!("{rpc}: {message}"),
            },
            junosync_api::Error::Http { status, message } => CoreError::Channel {
                message: format!("HTTP {status}: {message}"),
            },
            junosync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            junosync_api::Error::UnsupportedDirective(line) => {
                CoreError::Internal(format!("unsupported directive: {line}"))
            }
        }
    }
}

/// Message carried by a device-side rejection, for the transaction errors.
pub(crate) fn rejection_message(err: &junosync_api::Error) -> Option<String> {
    match err {
        junosync_api::Error::Rpc { message, .. } => Some(message.clone()),
        junosync_api::Error::UnsupportedDirective(line) => Some(format!("unsupported directive: {line}")),
        _ => None,
    }
}
