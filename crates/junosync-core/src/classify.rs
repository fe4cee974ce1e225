// ── Existence / disabled-state classifier ──
//
// Some objects are never removed outright by this engine: a physical port
// that exists in hardware is left behind as a disabled placeholder. The
// classifier tells the three cases apart from a relative dump of the
// object's scope.

use strum::Display;

use crate::parse::{strip_envelope, unquote};

/// Description written on placeholder objects.
pub const PLACEHOLDER_DESCRIPTION: &str = "NC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Presence {
    Unconfigured,
    AdministrativelyDisabled,
    Configured,
}

impl Presence {
    pub fn is_configured(self) -> bool {
        self == Self::Configured
    }
}

/// Classify a relative `display set` dump.
pub fn classify(dump: &str) -> Presence {
    classify_with_group(dump, None)
}

/// Classify, also recognizing `apply-groups <group>` as the placeholder
/// when a delete group is configured.
pub fn classify_with_group(dump: &str, group: Option<&str>) -> Presence {
    match strip_envelope(dump) {
        None => Presence::Unconfigured,
        Some(lines) if is_placeholder(&lines, group) => Presence::AdministrativelyDisabled,
        Some(_) => Presence::Configured,
    }
}

/// `true` if `lines` (relative `set` lines) are exactly a placeholder.
pub fn is_placeholder(lines: &[&str], group: Option<&str>) -> bool {
    let mut description = false;
    let mut disable = false;
    for line in lines {
        match line.trim() {
            "set disable" => disable = true,
            l => match l.strip_prefix("set description ") {
                Some(value) if unquote(value) == PLACEHOLDER_DESCRIPTION => description = true,
                _ => return is_group_placeholder(lines, group),
            },
        }
    }
    description && disable
}

fn is_group_placeholder(lines: &[&str], group: Option<&str>) -> bool {
    let Some(group) = group else {
        return false;
    };
    match lines {
        [line] => line
            .trim()
            .strip_prefix("set apply-groups ")
            .is_some_and(|g| unquote(g) == group),
        _ => false,
    }
}
