//! Shared helpers for command handlers.

use std::io::{IsTerminal, Read};
use std::path::Path;

use serde::Deserialize;

use junosync_core::AnyResource;

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Read a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    Ok(std::fs::read_to_string(path)?)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<AnyResource>),
    One(Box<AnyResource>),
}

/// Parse descriptions from YAML (JSON is a subset): a single
/// `kind`/`spec` document, a list of them, or several `---` documents.
pub fn parse_descriptions(text: &str) -> Result<Vec<AnyResource>, CliError> {
    let mut out = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        match serde_yaml::from_value(value)? {
            OneOrMany::Many(list) => out.extend(list),
            OneOrMany::One(one) => out.push(*one),
        }
    }
    if out.is_empty() {
        return Err(CliError::Validation {
            field: "file".into(),
            reason: "no resource descriptions found".into(),
        });
    }
    Ok(out)
}
