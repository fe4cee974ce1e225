//! Profile configuration for junosync.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `junosync_core::DeviceConfig`. The CLI layers its
//! flag overrides on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use junosync_api::ApiFlavor;
use junosync_core::{AuthCredentials, DeviceConfig, TlsVerification, TunnelUnitStrategy};

/// Keyring service under which profile passwords are stored.
pub const KEYRING_SERVICE: &str = "junosync";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level contents of `config.toml`.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Settle delay after each remote command, milliseconds.
    #[serde(default = "default_command_delay_ms")]
    pub command_delay_ms: u64,

    /// Sleep between configuration lock attempts, seconds.
    #[serde(default = "default_lock_poll_interval")]
    pub lock_poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            command_delay_ms: default_command_delay_ms(),
            lock_poll_interval: default_lock_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "yaml".into()
}
fn default_timeout() -> u64 {
    DeviceConfig::DEFAULT_TIMEOUT.as_secs()
}
fn default_command_delay_ms() -> u64 {
    100
}
fn default_lock_poll_interval() -> u64 {
    DeviceConfig::DEFAULT_LOCK_POLL_INTERVAL.as_secs()
}

/// A named device profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Management API root (e.g., "https://fw1.example.net:3443").
    pub host: String,

    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// "onbox" (default) or "proxied".
    pub api_flavor: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    pub insecure: Option<bool>,

    pub timeout: Option<u64>,

    pub command_delay_ms: Option<u64>,

    pub lock_poll_interval: Option<u64>,

    /// Group applied to deleted physical interfaces instead of the
    /// `description NC` + `disable` placeholder.
    pub group_interface_delete: Option<String>,

    pub tunnel_unit_strategy: Option<TunnelUnitStrategy>,

    /// Log message attached to every commit.
    pub commit_comment: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "junosync", "junosync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("junosync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, then overlay `JUNOSYNC_` variables.
///
/// Nested keys use a double underscore: `JUNOSYNC_DEFAULTS__TIMEOUT=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("JUNOSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Keyring account holding a profile's password.
pub fn keyring_account(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

/// Resolve the username: profile, then `JUNOSYNC_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var("JUNOSYNC_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password from the credential chain.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env, then the global variable
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }
    if let Ok(val) = std::env::var("JUNOSYNC_PASSWORD") {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_account(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;
    Ok(AuthCredentials { username, password })
}

/// Parse the profile's host into a URL.
pub fn profile_url(profile: &Profile) -> Result<url::Url, ConfigError> {
    profile.host.parse().map_err(|_| ConfigError::Validation {
        field: "host".into(),
        reason: format!("invalid URL: {}", profile.host),
    })
}

pub fn profile_flavor(profile: &Profile) -> Result<ApiFlavor, ConfigError> {
    match profile.api_flavor.as_deref() {
        None => Ok(ApiFlavor::default()),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Validation {
            field: "api_flavor".into(),
            reason: format!("expected 'onbox' or 'proxied', got '{raw}'"),
        }),
    }
}

/// Build a `DeviceConfig` from a profile, falling back to `defaults`
/// for every tuning knob the profile leaves unset.
pub fn profile_to_device_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    let auth = resolve_auth(profile, profile_name)?;
    device_config_with_auth(profile, defaults, auth)
}

/// Like [`profile_to_device_config`], with credentials resolved elsewhere.
pub fn device_config_with_auth(
    profile: &Profile,
    defaults: &Defaults,
    auth: AuthCredentials,
) -> Result<DeviceConfig, ConfigError> {
    let url = profile_url(profile)?;
    let mut config = DeviceConfig::new(url, auth);

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    config.flavor = profile_flavor(profile)?;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.command_delay =
        Duration::from_millis(profile.command_delay_ms.unwrap_or(defaults.command_delay_ms));
    config.lock_poll_interval = Duration::from_secs(
        profile
            .lock_poll_interval
            .unwrap_or(defaults.lock_poll_interval),
    );
    config.group_interface_delete = profile
        .group_interface_delete
        .clone()
        .filter(|g| !g.is_empty());
    config.tunnel_unit_strategy = profile.tunnel_unit_strategy.unwrap_or_default();
    config.commit_comment = profile.commit_comment.clone().filter(|c| !c.is_empty());

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
timeout = 20

[profiles.lab]
host = "https://fw1.lab.example:3443"
username = "automation"
password = "s3cret"
api_flavor = "proxied"
insecure = true
group_interface_delete = "disabled-ports"
tunnel_unit_strategy = "absent"
commit_comment = "managed by junosync"
"#;

    fn load_sample() -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout, 60);
        assert_eq!(cfg.defaults.lock_poll_interval, 10);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profile_fields_are_loaded() {
        let cfg = load_sample();
        assert_eq!(cfg.default_profile.as_deref(), Some("lab"));
        assert_eq!(cfg.defaults.timeout, 20);
        assert_eq!(cfg.defaults.command_delay_ms, 100);

        let lab = &cfg.profiles["lab"];
        assert_eq!(lab.host, "https://fw1.lab.example:3443");
        assert_eq!(lab.tunnel_unit_strategy, Some(TunnelUnitStrategy::Absent));
    }

    #[test]
    fn profile_translates_to_device_config() {
        let cfg = load_sample();
        let device = profile_to_device_config(&cfg.profiles["lab"], "lab", &cfg.defaults).unwrap();

        assert_eq!(device.url.as_str(), "https://fw1.lab.example:3443/");
        assert_eq!(device.auth.username, "automation");
        assert_eq!(device.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(device.flavor, ApiFlavor::Proxied);
        assert_eq!(device.timeout, Duration::from_secs(20));
        assert_eq!(device.command_delay, Duration::from_millis(100));
        assert_eq!(device.group_interface_delete.as_deref(), Some("disabled-ports"));
        assert_eq!(device.tunnel_unit_strategy, TunnelUnitStrategy::Absent);
        assert_eq!(device.commit_comment.as_deref(), Some("managed by junosync"));
    }

    #[test]
    fn plaintext_password_is_the_last_resort() {
        let profile = Profile {
            host: "https://fw1".into(),
            username: Some("ops".into()),
            password: Some("from-file".into()),
            ..Profile::default()
        };
        let secret = resolve_password(&profile, "junosync-test-no-keyring-entry").unwrap();
        if std::env::var("JUNOSYNC_PASSWORD").is_err() {
            assert_eq!(secret.expose_secret(), "from-file");
        }
    }

    #[test]
    fn bad_values_are_validation_errors() {
        let profile = Profile {
            host: "not a url".into(),
            api_flavor: Some("netconf".into()),
            ..Profile::default()
        };
        assert!(matches!(
            profile_url(&profile),
            Err(ConfigError::Validation { ref field, .. }) if field == "host"
        ));
        assert!(matches!(
            profile_flavor(&profile),
            Err(ConfigError::Validation { ref field, .. }) if field == "api_flavor"
        ));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let cfg = load_sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        save_config_to(&cfg, &path).unwrap();
        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded.profiles["lab"].username.as_deref(), Some("automation"));
        assert_eq!(reloaded.defaults.timeout, 20);
    }
}
