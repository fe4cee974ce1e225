// ── Runtime connection configuration ──
//
// These types describe *how* to reach a device and how the engine paces
// itself. They carry credential data and tuning but never touch disk.
// The CLI constructs a `DeviceConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::allocator::TunnelUnitStrategy;

/// Username/password pair for the device's management API.
#[derive(Debug, Clone)]
pub struct AuthCredentials {
    pub username: String,
    pub password: SecretString,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (factory self-signed certificates).
    DangerAcceptInvalid,
}

/// Configuration for managing a single device.
///
/// Built by the CLI, passed to `Device`; core never reads config files.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Management API root (e.g. `https://fw1.example.net:3443`).
    pub url: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// URL layout of the RPC endpoint.
    pub flavor: junosync_api::ApiFlavor,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Settle delay after every remote command.
    pub command_delay: Duration,
    /// Sleep between attempts while the configuration lock is busy.
    pub lock_poll_interval: Duration,
    /// Group applied to a physical interface instead of the
    /// `description NC` + `disable` placeholder when it is deleted.
    pub group_interface_delete: Option<String>,
    pub tunnel_unit_strategy: TunnelUnitStrategy,
    /// Log message attached to every commit.
    pub commit_comment: Option<String>,
}

impl DeviceConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_COMMAND_DELAY: Duration = Duration::from_millis(100);
    pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_secs(10);

    /// Config with default pacing for the given endpoint and credentials.
    pub fn new(url: Url, auth: AuthCredentials) -> Self {
        Self {
            url,
            auth,
            tls: TlsVerification::default(),
            flavor: junosync_api::ApiFlavor::default(),
            timeout: Self::DEFAULT_TIMEOUT,
            command_delay: Self::DEFAULT_COMMAND_DELAY,
            lock_poll_interval: Self::DEFAULT_LOCK_POLL_INTERVAL,
            group_interface_delete: None,
            tunnel_unit_strategy: TunnelUnitStrategy::default(),
            commit_comment: None,
        }
    }

    /// Channel-level transport settings derived from this config.
    pub fn transport(&self) -> junosync_api::TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => junosync_api::TlsMode::System,
            TlsVerification::CustomCa(path) => junosync_api::TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => junosync_api::TlsMode::DangerAcceptInvalid,
        };
        junosync_api::TransportConfig::new(tls, self.timeout)
    }

    /// REST connector for this device.
    pub fn connector(&self) -> junosync_api::RestConnector {
        junosync_api::RestConnector::new(
            self.url.clone(),
            junosync_api::Credentials::new(self.auth.username.clone(), self.auth.password.clone()),
            self.transport(),
        )
        .with_flavor(self.flavor)
    }
}
