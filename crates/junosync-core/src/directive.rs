// ── Configuration directives ──
//
// A directive is one `set`/`delete` line. A batch is the ordered list of
// directives compiled for a single resource mutation; it is applied as a
// whole and committed atomically by the device.

use std::fmt;

use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Verb {
    Set,
    Delete,
}

/// One configuration line: `<verb> <hierarchical-path> [value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub verb: Verb,
    pub path: String,
}

impl Directive {
    pub fn set(path: impl Into<String>) -> Self {
        Self {
            verb: Verb::Set,
            path: path.into(),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            verb: Verb::Delete,
            path: path.into(),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.path)
    }
}

/// Ordered directives for one resource mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveBatch {
    directives: Vec<Directive>,
}

impl DirectiveBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub fn set(&mut self, path: impl Into<String>) {
        self.push(Directive::set(path));
    }

    pub fn delete(&mut self, path: impl Into<String>) {
        self.push(Directive::delete(path));
    }

    /// Put a directive ahead of everything already compiled.
    pub fn prepend(&mut self, directive: Directive) {
        self.directives.insert(0, directive);
    }

    pub fn extend(&mut self, other: DirectiveBatch) {
        self.directives.extend(other.directives);
    }

    /// Builder for lines that share a hierarchical prefix.
    pub fn scoped(&mut self, scope: impl Into<String>) -> Scoped<'_> {
        Scoped {
            batch: self,
            scope: scope.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Render as the textual lines sent to the device.
    pub fn to_lines(&self) -> Vec<String> {
        self.directives.iter().map(ToString::to_string).collect()
    }
}

/// Appends lines under a fixed path prefix.
pub struct Scoped<'a> {
    batch: &'a mut DirectiveBatch,
    scope: String,
}

impl Scoped<'_> {
    fn path(&self, rel: &str) -> String {
        if rel.is_empty() {
            self.scope.clone()
        } else {
            format!("{} {rel}", self.scope)
        }
    }

    /// `set <scope> <rel>`
    pub fn set(&mut self, rel: impl AsRef<str>) {
        let path = self.path(rel.as_ref());
        self.batch.set(path);
    }

    /// `set <scope> <rel> <value>`; the value is quoted when needed.
    pub fn set_value(&mut self, rel: &str, value: impl fmt::Display) {
        let path = self.path(&format!("{rel} {}", quote(&value.to_string())));
        self.batch.set(path);
    }

    /// Like `set_value`, skipped when the value is empty.
    pub fn set_str(&mut self, rel: &str, value: &str) {
        if !value.is_empty() {
            self.set_value(rel, value);
        }
    }

    /// Like `set_value`, skipped when the value is zero.
    pub fn set_num(&mut self, rel: &str, value: u32) {
        if value != 0 {
            self.set_value(rel, value);
        }
    }

    pub fn set_flag(&mut self, rel: &str, enabled: bool) {
        if enabled {
            self.set(rel);
        }
    }

    /// `delete <scope> <rel>`
    pub fn delete(&mut self, rel: impl AsRef<str>) {
        let path = self.path(rel.as_ref());
        self.batch.delete(path);
    }

    /// Nested builder with `rel` appended to the prefix.
    pub fn nested(&mut self, rel: impl AsRef<str>) -> Scoped<'_> {
        let scope = self.path(rel.as_ref());
        Scoped {
            batch: &mut *self.batch,
            scope,
        }
    }
}

/// Quote a leaf value the way the device prints it.
pub fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | ';' | '{' | '}' | '#'));
    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_owned()
    }
}
