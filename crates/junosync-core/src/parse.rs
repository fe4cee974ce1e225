// ── State parser plumbing ──
//
// A `display set relative` dump is a flat list of `set <path>` lines. Each
// resource kind owns a `LineTable`: an ordered list of (prefix, action)
// pairs matched longest-first on whole tokens. The table is plain data, so
// it can be exercised without a device.

use junosync_api::channel::{CONFIG_OUTPUT_END, CONFIG_OUTPUT_START, EMPTY_OUTPUT};
use tracing::trace;

use crate::error::CoreError;

/// Reason a single line could not be applied to a description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError(pub String);

impl LineError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

pub type Handler<T> = fn(&mut T, &str) -> Result<(), LineError>;

/// What to do with a line whose path starts with a table prefix.
pub enum Action<T> {
    /// Feed the remainder of the line to a handler.
    Apply(Handler<T>),
    /// Recognized but belongs to something else.
    Skip,
}

pub struct LineTable<T> {
    entries: Vec<(&'static str, Action<T>)>,
}

impl<T> LineTable<T> {
    /// Build a table; entries are reordered longest prefix first.
    pub fn new(mut entries: Vec<(&'static str, Action<T>)>) -> Self {
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    /// Dispatch one path (verb already stripped). Returns `false` when no
    /// prefix matched.
    pub fn dispatch(&self, target: &mut T, path: &str) -> Result<bool, LineError> {
        for (prefix, action) in &self.entries {
            if let Some(rest) = strip_token_prefix(path, prefix) {
                if let Action::Apply(handler) = action {
                    handler(target, rest)?;
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(p, _)| *p)
    }
}

/// `path` minus `prefix`, if `prefix` ends on a token boundary of `path`.
pub fn strip_token_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if path == prefix {
        return Some("");
    }
    path.strip_prefix(prefix)?.strip_prefix(' ')
}

/// Payload lines of a dump, or `None` when nothing is configured.
///
/// Framing markers and blank lines are dropped.
pub fn strip_envelope(dump: &str) -> Option<Vec<&str>> {
    if dump.trim() == EMPTY_OUTPUT {
        return None;
    }
    let lines: Vec<&str> = dump
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != CONFIG_OUTPUT_START && *l != CONFIG_OUTPUT_END)
        .collect();
    if lines.is_empty() { None } else { Some(lines) }
}

/// Run every `set` line of a dump through `table`.
///
/// Returns `false` when the dump denotes an unconfigured scope.
pub fn parse_dump<T>(
    resource: &str,
    dump: &str,
    table: &LineTable<T>,
    target: &mut T,
) -> Result<bool, CoreError> {
    let Some(lines) = strip_envelope(dump) else {
        return Ok(false);
    };
    for line in lines {
        let Some(path) = line.strip_prefix("set ") else {
            continue;
        };
        match table.dispatch(target, path) {
            Ok(true) => trace!(resource, line, "parsed"),
            Ok(false) => trace!(resource, line, "skipping unrecognized line"),
            Err(LineError(reason)) => {
                return Err(CoreError::MalformedDeviceOutput {
                    resource: resource.to_owned(),
                    line: line.to_owned(),
                    reason,
                });
            }
        }
    }
    Ok(true)
}

// ── Value helpers ────────────────────────────────────────────────────

/// Strict integer conversion of a leaf value.
pub fn parse_int<N: std::str::FromStr>(value: &str) -> Result<N, LineError> {
    let value = value.trim();
    value
        .parse()
        .map_err(|_| LineError::new(format!("expected an integer, got {value:?}")))
}

/// Undo the device's quoting of a leaf value.
pub fn unquote(value: &str) -> String {
    let value = value.trim();
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => value.to_owned(),
    }
}

/// First token (quoted tokens kept whole, unquoted) and the remainder.
pub fn split_first(rest: &str) -> (String, &str) {
    let rest = rest.trim_start();
    if rest.starts_with('"') {
        let mut escaped = false;
        for (idx, c) in rest.char_indices().skip(1) {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    let (token, tail) = rest.split_at(idx + 1);
                    return (unquote(token), tail.trim_start());
                }
                _ => escaped = false,
            }
        }
        return (unquote(rest), "");
    }
    match rest.split_once(' ') {
        Some((token, tail)) => (token.to_owned(), tail.trim_start()),
        None => (rest.to_owned(), ""),
    }
}

/// Index of the element matching `matches`, appending `make()` if none does.
pub fn find_or_push<T>(
    items: &mut Vec<T>,
    matches: impl Fn(&T) -> bool,
    make: impl FnOnce() -> T,
) -> &mut T {
    let idx = match items.iter().position(matches) {
        Some(idx) => idx,
        None => {
            items.push(make());
            items.len() - 1
        }
    };
    &mut items[idx]
}

/// Append `value` unless already present.
pub fn push_unique(items: &mut Vec<String>, value: String) {
    if !items.contains(&value) {
        items.push(value);
    }
}
