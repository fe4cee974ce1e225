// Remote command channel contract
//
// The engine never talks to a transport directly. Everything it needs from
// a device (inspection commands, staging directives, the commit cycle)
// goes through `CommandChannel`, so the REST client and the in-memory
// device are interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use strum::{Display, EnumString};

use crate::error::Error;

/// Opening marker framing a text configuration payload.
pub const CONFIG_OUTPUT_START: &str = "<configuration-output>";
/// Closing marker framing a text configuration payload.
pub const CONFIG_OUTPUT_END: &str = "</configuration-output>";
/// Reserved reply denoting "nothing configured at this scope".
pub const EMPTY_OUTPUT: &str = "empty";

/// Coarse platform family, used to pick platform-specific statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PlatformFamily {
    Srx,
    Ex,
    Qfx,
    Mx,
    Other,
}

impl PlatformFamily {
    /// Classify a product model string (`srx340`, `vSRX`, `ex4300-48t`, `mx204`).
    pub fn from_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        let model = model.trim_start_matches('v');
        if model.starts_with("srx") {
            Self::Srx
        } else if model.starts_with("ex") {
            Self::Ex
        } else if model.starts_with("qfx") {
            Self::Qfx
        } else if model.starts_with("mx") {
            Self::Mx
        } else {
            Self::Other
        }
    }
}

/// Identity and capabilities reported by a device when a session opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFacts {
    pub hostname: String,
    pub model: String,
    pub version: String,
    pub platform: PlatformFamily,
}

impl DeviceFacts {
    /// Build facts from the raw model string, deriving the platform family.
    pub fn new(
        hostname: impl Into<String>,
        model: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let model = model.into();
        Self {
            hostname: hostname.into(),
            platform: PlatformFamily::from_model(&model),
            model,
            version: version.into(),
        }
    }
}

/// The primitives the synchronization engine consumes.
///
/// Implementations are not required to be reentrant: callers serialize
/// reads through the engine's read guard and writes through the device lock.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Identity of the device behind this channel.
    async fn facts(&self) -> Result<DeviceFacts, Error>;

    /// Run a read-only inspection command and return its raw text.
    ///
    /// Configuration dumps are returned framed by [`CONFIG_OUTPUT_START`] /
    /// [`CONFIG_OUTPUT_END`], or as [`EMPTY_OUTPUT`] when nothing matched.
    async fn query(&self, command: &str) -> Result<String, Error>;

    /// Run a structured (tag-delimited) RPC and return the raw reply.
    /// RPC errors are left in the reply for the caller to inspect.
    async fn query_structured(&self, rpc: &str) -> Result<String, Error>;

    /// Stage directives into the candidate configuration. Returns warnings.
    async fn apply(&self, lines: &[String]) -> Result<Vec<String>, Error>;

    /// Try to take the exclusive configuration lock.
    /// `Ok(false)` means another session currently holds it.
    async fn lock(&self) -> Result<bool, Error>;

    async fn unlock(&self) -> Result<(), Error>;

    /// Dry-run validation of the candidate configuration.
    async fn validate(&self) -> Result<(), Error>;

    /// Commit the candidate configuration. Returns warnings.
    async fn commit(&self, comment: Option<&str>) -> Result<Vec<String>, Error>;

    /// Drop staged edits, restoring the candidate to the active configuration.
    async fn discard_candidate(&self) -> Result<(), Error>;

    /// Tear down the session.
    async fn close(&self) -> Result<(), Error>;
}

/// Opens one channel per operation.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn CommandChannel>, Error>;
}

/// Collapse a configuration reply whose payload is blank to [`EMPTY_OUTPUT`].
pub fn normalize_output(body: String) -> String {
    let payload = body
        .trim()
        .trim_start_matches(CONFIG_OUTPUT_START)
        .trim_end_matches(CONFIG_OUTPUT_END);
    if payload.trim().is_empty() {
        EMPTY_OUTPUT.to_owned()
    } else {
        body
    }
}

/// Frame a set-form payload the way the device does.
pub fn frame_output(lines: &[String]) -> String {
    if lines.is_empty() {
        return EMPTY_OUTPUT.to_owned();
    }
    let mut out = String::from(CONFIG_OUTPUT_START);
    out.push('\n');
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(CONFIG_OUTPUT_END);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn platform_from_model() {
        assert_eq!(PlatformFamily::from_model("vSRX"), PlatformFamily::Srx);
        assert_eq!(PlatformFamily::from_model("srx340"), PlatformFamily::Srx);
        assert_eq!(PlatformFamily::from_model("ex4300-48t"), PlatformFamily::Ex);
        assert_eq!(PlatformFamily::from_model("mx204"), PlatformFamily::Mx);
        assert_eq!(PlatformFamily::from_model("vmx"), PlatformFamily::Mx);
        assert_eq!(PlatformFamily::from_model("acx710"), PlatformFamily::Other);
    }

    #[test]
    fn platform_round_trips_through_strings() {
        assert_eq!(PlatformFamily::Qfx.to_string(), "qfx");
        assert_eq!("mx".parse::<PlatformFamily>().unwrap(), PlatformFamily::Mx);
    }

    #[test]
    fn blank_payload_collapses_to_sentinel() {
        let body = format!("{CONFIG_OUTPUT_START}\n\n{CONFIG_OUTPUT_END}\n");
        assert_eq!(normalize_output(body), EMPTY_OUTPUT);
        assert_eq!(normalize_output(String::new()), EMPTY_OUTPUT);
    }

    #[test]
    fn frame_output_wraps_lines() {
        let framed = frame_output(&["set disable".to_owned()]);
        assert_eq!(framed, "<configuration-output>\nset disable\n</configuration-output>");
        assert_eq!(frame_output(&[]), EMPTY_OUTPUT);
    }
}
