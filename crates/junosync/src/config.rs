//! CLI configuration: thin wrapper around `junosync_config`.
//!
//! Adds the `GlobalOpts` flag overrides (--host, --username, --insecure,
//! --timeout) on top of profile resolution.

use std::time::Duration;

use secrecy::SecretString;

use junosync_core::{AuthCredentials, DeviceConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use junosync_config::{
    Config, Defaults, KEYRING_SERVICE, Profile, config_path, keyring_account,
    load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// List profile names for error help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    names.sort();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// Build the `DeviceConfig` for this invocation.
///
/// Flags take priority over the profile; without a profile, `--host`
/// plus username and password must be given.
pub fn resolve_device_config(global: &GlobalOpts) -> Result<DeviceConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut device = match cfg.profiles.get(&profile_name) {
        Some(profile) => resolve_profile(profile, &profile_name, global, &cfg.defaults)?,
        None => {
            if global.profile.is_some() {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: available_profiles(&cfg),
                });
            }
            from_flags(global, &profile_name, &cfg.defaults)?
        }
    };

    if global.insecure {
        device.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        device.timeout = Duration::from_secs(secs);
    }
    Ok(device)
}

fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
    defaults: &Defaults,
) -> Result<DeviceConfig, CliError> {
    let merged = Profile {
        host: global.host.clone().unwrap_or_else(|| profile.host.clone()),
        username: global.username.clone().or_else(|| profile.username.clone()),
        password: profile.password.clone(),
        password_env: profile.password_env.clone(),
        api_flavor: profile.api_flavor.clone(),
        ca_cert: profile.ca_cert.clone(),
        insecure: profile.insecure,
        timeout: profile.timeout,
        command_delay_ms: profile.command_delay_ms,
        lock_poll_interval: profile.lock_poll_interval,
        group_interface_delete: profile.group_interface_delete.clone(),
        tunnel_unit_strategy: profile.tunnel_unit_strategy,
        commit_comment: profile.commit_comment.clone(),
    };

    // --password skips the env/keyring/plaintext chain entirely
    let auth = match global.password {
        Some(ref password) => AuthCredentials {
            username: junosync_config::resolve_username(&merged, profile_name)?,
            password: SecretString::from(password.clone()),
        },
        None => junosync_config::resolve_auth(&merged, profile_name)?,
    };

    Ok(junosync_config::device_config_with_auth(
        &merged, defaults, auth,
    )?)
}

fn from_flags(
    global: &GlobalOpts,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<DeviceConfig, CliError> {
    let host = global.host.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;

    let url: url::Url = host.parse().map_err(|_| CliError::Validation {
        field: "host".into(),
        reason: format!("invalid URL: {host}"),
    })?;

    let (Some(username), Some(password)) = (global.username.clone(), global.password.clone())
    else {
        return Err(CliError::NoCredentials {
            profile: profile_name.into(),
        });
    };

    let mut device = DeviceConfig::new(
        url,
        AuthCredentials {
            username,
            password: SecretString::from(password),
        },
    );
    device.tls = if defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };
    device.timeout = Duration::from_secs(defaults.timeout);
    device.command_delay = Duration::from_millis(defaults.command_delay_ms);
    device.lock_poll_interval = Duration::from_secs(defaults.lock_poll_interval);
    Ok(device)
}
