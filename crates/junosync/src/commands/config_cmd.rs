//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};

use junosync_core::TunnelUnitStrategy;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, KEYRING_SERVICE, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "command_delay_ms = {}", cfg.defaults.command_delay_ms);
    let _ = writeln!(out, "lock_poll_interval = {}", cfg.defaults.lock_poll_interval);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref flavor) = p.api_flavor {
            let _ = writeln!(out, "api_flavor = \"{flavor}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ref group) = p.group_interface_delete {
            let _ = writeln!(out, "group_interface_delete = \"{group}\"");
        }
        if let Some(strategy) = p.tunnel_unit_strategy {
            let _ = writeln!(out, "tunnel_unit_strategy = \"{strategy}\"");
        }
        if let Some(ref comment) = p.commit_comment {
            let _ = writeln!(out, "commit_comment = \"{comment}\"");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn store_in_keyring(profile_name: &str, secret: &str) -> Result<(), CliError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &config::keyring_account(profile_name))
        .map_err(|e| CliError::Validation {
            field: "keyring".into(),
            reason: format!("failed to access keyring: {e}"),
        })?;
    entry.set_password(secret).map_err(|e| CliError::Validation {
        field: "keyring".into(),
        reason: format!("failed to store password in keyring: {e}"),
    })
}

fn parse_number(field: &str, value: &str) -> Result<u64, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: "must be a whole number".into(),
    })
}

/// Apply one `config set` assignment to a profile.
fn set_profile_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key.replace('-', "_").as_str() {
        "host" => profile.host = value,
        "username" => profile.username = Some(value),
        "password_env" => profile.password_env = Some(value),
        "api_flavor" => {
            if value.parse::<junosync_api::ApiFlavor>().is_err() {
                return Err(CliError::Validation {
                    field: "api_flavor".into(),
                    reason: "must be 'onbox' or 'proxied'".into(),
                });
            }
            profile.api_flavor = Some(value);
        }
        "ca_cert" => profile.ca_cert = Some(value.into()),
        "insecure" => {
            profile.insecure = Some(value.parse().map_err(|_| CliError::Validation {
                field: "insecure".into(),
                reason: "must be 'true' or 'false'".into(),
            })?);
        }
        "timeout" => profile.timeout = Some(parse_number("timeout", &value)?),
        "command_delay_ms" => {
            profile.command_delay_ms = Some(parse_number("command_delay_ms", &value)?);
        }
        "lock_poll_interval" => {
            profile.lock_poll_interval = Some(parse_number("lock_poll_interval", &value)?);
        }
        "group_interface_delete" => profile.group_interface_delete = Some(value),
        "tunnel_unit_strategy" => {
            let strategy: TunnelUnitStrategy =
                value.parse().map_err(|_| CliError::Validation {
                    field: "tunnel_unit_strategy".into(),
                    reason: "must be 'empty_or_disabled' or 'absent'".into(),
                })?;
            profile.tunnel_unit_strategy = Some(strategy);
        }
        "commit_comment" => profile.commit_comment = Some(value),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: host, username, password_env, \
                     api_flavor, ca_cert, insecure, timeout, command_delay_ms, \
                     lock_poll_interval, group_interface_delete, tunnel_unit_strategy, \
                     commit_comment"
                ),
            });
        }
    }
    Ok(())
}

fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("junosync configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let host: String = Input::new()
        .with_prompt("Management API URL")
        .default("https://192.168.1.1:3443".into())
        .interact_text()
        .map_err(prompt_err)?;

    let flavors = &["On-box REST service", "Proxied (/api/junos)"];
    let flavor = Select::new()
        .with_prompt("API flavor")
        .items(flavors)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let username: String = Input::new()
        .with_prompt("Username")
        .interact_text()
        .map_err(prompt_err)?;
    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if username.is_empty() || password.is_empty() {
        return Err(CliError::Validation {
            field: "credentials".into(),
            reason: "username and password cannot be empty".into(),
        });
    }

    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let storage = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    let plaintext = if storage == 0 {
        store_in_keyring(&profile_name, &password)?;
        eprintln!("   ✓ Password stored in system keyring");
        None
    } else {
        Some(password)
    };

    let insecure = Confirm::new()
        .with_prompt("Accept self-signed certificates?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let profile = Profile {
        host,
        username: Some(username),
        password: plaintext,
        api_flavor: (flavor == 1).then(|| "proxied".into()),
        insecure: insecure.then_some(true),
        ..Profile::default()
    };

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: junosync exists security_zone trust");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        // Always the redacted TOML view, whatever --output says
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            output::print_output(&format_config_redacted(&cfg), global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_profile_key(profile, &key, value)?;
            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: junosync config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: config::available_profiles(&cfg),
                });
            }

            let secret = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            store_in_keyring(&profile_name, &secret)?;
            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_accepts_dashed_keys() {
        let mut profile = Profile::default();
        set_profile_key(&mut profile, "group-interface-delete", "disabled-ports".into()).unwrap();
        set_profile_key(&mut profile, "tunnel_unit_strategy", "absent".into()).unwrap();
        set_profile_key(&mut profile, "timeout", "15".into()).unwrap();
        assert_eq!(profile.group_interface_delete.as_deref(), Some("disabled-ports"));
        assert_eq!(profile.tunnel_unit_strategy, Some(TunnelUnitStrategy::Absent));
        assert_eq!(profile.timeout, Some(15));
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut profile = Profile::default();
        assert!(set_profile_key(&mut profile, "api_flavor", "netconf".into()).is_err());
        assert!(set_profile_key(&mut profile, "timeout", "soon".into()).is_err());
        assert!(set_profile_key(&mut profile, "site", "default".into()).is_err());
    }

    #[test]
    fn redacted_view_hides_passwords() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                host: "https://fw1".into(),
                password: Some("hunter2".into()),
                ..Profile::default()
            },
        );
        let shown = format_config_redacted(&cfg);
        assert!(shown.contains("[profiles.lab]"));
        assert!(shown.contains("password = \"****\""));
        assert!(!shown.contains("hunter2"));
    }
}
