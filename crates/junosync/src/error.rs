//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use junosync_config::ConfigError;
use junosync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(junosync::connection_failed),
        help(
            "Check that `system services rest` is enabled and reachable.\n\
             URL: {url}\n\
             Self-signed certificate? Try --insecure (-k)."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Device error: {message}")]
    #[diagnostic(code(junosync::device))]
    Device { message: String },

    #[error("Gave up waiting for the configuration lock")]
    #[diagnostic(
        code(junosync::cancelled),
        help("Another session holds `configure exclusive`; retry once it commits.")
    )]
    Cancelled,

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(junosync::timeout),
        help("Increase timeout with --timeout or check device responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(junosync::auth_failed),
        help(
            "Verify the username and password.\n\
             Run: junosync config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(junosync::no_credentials),
        help(
            "Configure credentials with: junosync config init\n\
             Or set JUNOSYNC_USERNAME and JUNOSYNC_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource} not found")]
    #[diagnostic(
        code(junosync::not_found),
        help("Check the identifier with: junosync read <kind> <id>")
    )]
    NotFound { resource: String },

    #[error("{resource} already exists")]
    #[diagnostic(
        code(junosync::conflict),
        help("Use `junosync apply` without --create to update it, or import it first.")
    )]
    Conflict { resource: String },

    #[error("{message}")]
    #[diagnostic(code(junosync::invalid_resource))]
    InvalidResource { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(junosync::rejected),
        help("The candidate configuration was rolled back; the device is unchanged.")
    )]
    Rejected { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(junosync::diverged),
        help("The commit went through. Inspect the object with `junosync read`.")
    )]
    Diverged { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(junosync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(junosync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: junosync config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(junosync::no_config),
        help(
            "Create a profile with: junosync config init\n\
             Expected at: {path}\n\
             Or pass --host with credentials."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(junosync::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(junosync::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(junosync::json))]
    Json(#[from] serde_json::Error),

    #[error("Invalid description: {0}")]
    #[diagnostic(
        code(junosync::yaml),
        help("Descriptions are `kind:` + `spec:` documents, or a list of them.")
    )]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } | Self::Cancelled => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::InvalidResource { .. }
            | Self::Yaml(_)
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message: _ } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Cancelled => CliError::Cancelled,

            CoreError::NotFound { resource } => CliError::NotFound { resource },

            CoreError::AlreadyExists { resource } => CliError::Conflict { resource },

            err @ (CoreError::StructuralConstraintViolation { .. }
            | CoreError::ConflictingOptions { .. }) => CliError::InvalidResource {
                message: err.to_string(),
            },

            err @ (CoreError::ApplyRejected { .. }
            | CoreError::ValidationFailed { .. }
            | CoreError::CommitFailed { .. }) => CliError::Rejected {
                message: err.to_string(),
            },

            err @ CoreError::PostCommitDivergence { .. } => CliError::Diverged {
                message: err.to_string(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            err @ (CoreError::Channel { .. }
            | CoreError::MalformedDeviceOutput { .. }
            | CoreError::AllocationExhausted { .. }
            | CoreError::Internal(_)) => CliError::Device {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::NotFound {
                    resource: "security_zone dmz".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::AlreadyExists {
                    resource: "interface ge-0/0/1".into(),
                },
                exit_code::CONFLICT,
            ),
            (
                CoreError::ConflictingOptions {
                    resource: "ipsec_vpn hq".into(),
                    fields: "bind_interface, bind_interface_auto".into(),
                },
                exit_code::USAGE,
            ),
            (
                CoreError::CommitFailed {
                    resource: "ospf_area 0.0.0.0".into(),
                    message: "mgd: error".into(),
                },
                exit_code::REJECTED,
            ),
            (CoreError::Cancelled, exit_code::TIMEOUT),
        ];
        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn rejection_keeps_the_device_message() {
        let err = CliError::from(CoreError::ValidationFailed {
            resource: "security_zone dmz".into(),
            message: "zone has no interfaces".into(),
        });
        assert!(err.to_string().contains("zone has no interfaces"));
    }
}
