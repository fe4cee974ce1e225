// ── Identifier allocators ──
//
// Pure functions of a device dump: no state is kept between calls, so an
// allocation is only collision-free while the caller holds the device lock
// and the read guard across the read-scan-emit sequence.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::classify::is_placeholder;
use crate::directive::Directive;
use crate::error::CoreError;
use crate::parse::{parse_int, strip_envelope};

/// Dump of every interface, relative to `interfaces`.
pub const INTERFACES_SCAN: &str = "show configuration interfaces | display set relative";
/// Dump of the secure tunnel interface, relative to `interfaces st0`.
pub const TUNNEL_SCAN: &str = "show configuration interfaces st0 | display set relative";

/// Highest unit number accepted on `st0`.
pub const TUNNEL_UNIT_MAX: u32 = 1_073_741_823;

const DEVICE_COUNT_PATH: &str = "chassis aggregated-devices ethernet device-count";

// ── Aggregated devices ───────────────────────────────────────────────

/// Outcome of the aggregated-device count computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCount {
    Set(u32),
    /// No aggregated interface is referenced any more.
    Remove,
}

impl DeviceCount {
    pub fn directive(self) -> Directive {
        match self {
            Self::Set(count) => Directive::set(format!("{DEVICE_COUNT_PATH} {count}")),
            Self::Remove => Directive::delete(DEVICE_COUNT_PATH),
        }
    }
}

/// Index of an aggregated interface name (`ae12` -> 12).
pub fn ae_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("ae")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Compute the chassis device count after `interface` changes.
///
/// Every `aeN` still owned by another interface (a member's 802.3ad
/// statement or the parent's own configuration) counts, plus `new_parent`.
/// Lines of `interface` itself are ignored: its old membership is being
/// replaced.
pub fn aggregated_device_count(
    dump: &str,
    interface: &str,
    new_parent: Option<&str>,
) -> DeviceCount {
    let mut owners: BTreeSet<u32> = new_parent.and_then(ae_index).into_iter().collect();

    for line in strip_envelope(dump).unwrap_or_default() {
        let Some(path) = line.strip_prefix("set ") else {
            continue;
        };
        let (name, rest) = path.split_once(' ').unwrap_or((path, ""));
        if name == interface {
            continue;
        }
        if let Some(idx) = ae_index(name) {
            owners.insert(idx);
            continue;
        }
        let parent = rest
            .strip_prefix("ether-options 802.3ad ")
            .or_else(|| rest.strip_prefix("gigether-options 802.3ad "))
            .and_then(|p| p.split_whitespace().next())
            .and_then(ae_index);
        if let Some(idx) = parent {
            owners.insert(idx);
        }
    }

    match owners.last() {
        Some(max) => DeviceCount::Set(max + 1),
        None => DeviceCount::Remove,
    }
}

// ── Tunnel units ─────────────────────────────────────────────────────

/// How the next free `st0` unit is chosen.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TunnelUnitStrategy {
    /// First unit from 0 that is absent, empty or a disabled placeholder.
    #[default]
    EmptyOrDisabled,
    /// First unit from 1 that is entirely absent.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Configured,
    Disabled,
    /// Present with no statements under it.
    Empty,
}

/// Unit usage on `st0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotMap(BTreeMap<u32, SlotState>);

impl SlotMap {
    /// Group a relative `st0` dump by unit.
    pub fn from_dump(dump: &str) -> Result<Self, CoreError> {
        let mut units: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for line in strip_envelope(dump).unwrap_or_default() {
            let Some(rest) = line.strip_prefix("set unit ") else {
                continue;
            };
            let (unit, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            let unit: u32 = parse_int(unit).map_err(|e| CoreError::MalformedDeviceOutput {
                resource: "interface st0".into(),
                line: line.to_owned(),
                reason: e.0,
            })?;
            let entry = units.entry(unit).or_default();
            if !tail.is_empty() {
                entry.push(format!("set {tail}"));
            }
        }

        let slots = units
            .into_iter()
            .map(|(unit, lines)| {
                let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
                let state = if lines.is_empty() {
                    SlotState::Empty
                } else if is_placeholder(&lines, None) {
                    SlotState::Disabled
                } else {
                    SlotState::Configured
                };
                (unit, state)
            })
            .collect();
        Ok(Self(slots))
    }

    pub fn insert(&mut self, unit: u32, state: SlotState) {
        self.0.insert(unit, state);
    }

    pub fn get(&self, unit: u32) -> Option<SlotState> {
        self.0.get(&unit).copied()
    }
}

/// A freshly assigned `st0` unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelUnit {
    pub unit: u32,
    /// The slot holds a placeholder that must be deleted before reuse.
    pub reclaim: bool,
}

impl TunnelUnit {
    pub fn interface_name(self) -> String {
        format!("st0.{}", self.unit)
    }
}

/// Scan for the next free unit.
pub fn next_tunnel_unit(
    slots: &SlotMap,
    strategy: TunnelUnitStrategy,
) -> Result<TunnelUnit, CoreError> {
    let start = match strategy {
        TunnelUnitStrategy::EmptyOrDisabled => 0,
        TunnelUnitStrategy::Absent => 1,
    };
    for unit in start..=TUNNEL_UNIT_MAX {
        match (strategy, slots.get(unit)) {
            (_, None) => {
                return Ok(TunnelUnit {
                    unit,
                    reclaim: false,
                });
            }
            (
                TunnelUnitStrategy::EmptyOrDisabled,
                Some(SlotState::Disabled | SlotState::Empty),
            ) => return Ok(TunnelUnit { unit, reclaim: true }),
            _ => {}
        }
    }
    Err(CoreError::AllocationExhausted {
        namespace: "st0 units".into(),
    })
}

/// Unit number of an `st0.N` binding.
pub fn tunnel_unit_of(bind_interface: &str) -> Option<u32> {
    bind_interface.strip_prefix("st0.")?.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn ae_index_is_strict() {
        assert_eq!(ae_index("ae0"), Some(0));
        assert_eq!(ae_index("ae12"), Some(12));
        assert_eq!(ae_index("ae"), None);
        assert_eq!(ae_index("ae1.0"), None);
        assert_eq!(ae_index("ge-0/0/0"), None);
    }

    #[test]
    fn count_is_one_past_the_highest_owner() {
        let dump = "<configuration-output>
set ge-0/0/0 ether-options 802.3ad ae0
set ge-0/0/1 ether-options 802.3ad ae2
set ge-0/0/2 ether-options 802.3ad ae5
set ae5 aggregated-ether-options lacp active
</configuration-output>";
        // ge-0/0/2 moves to ae1; ae5 keeps its parent configuration.
        assert_eq!(
            aggregated_device_count(dump, "ge-0/0/2", Some("ae1")),
            DeviceCount::Set(6)
        );
    }

    #[test]
    fn released_index_is_dropped_when_unowned() {
        let dump = "set ge-0/0/0 ether-options 802.3ad ae0\nset xe-0/0/1 gigether-options 802.3ad ae3";
        assert_eq!(
            aggregated_device_count(dump, "xe-0/0/1", None),
            DeviceCount::Set(1)
        );
    }

    #[test]
    fn no_owners_removes_the_count() {
        let dump = "set ge-0/0/0 ether-options 802.3ad ae0";
        assert_eq!(aggregated_device_count(dump, "ge-0/0/0", None), DeviceCount::Remove);
        assert_eq!(aggregated_device_count("empty", "ge-0/0/0", None), DeviceCount::Remove);
        assert_eq!(
            DeviceCount::Remove.directive().to_string(),
            "delete chassis aggregated-devices ethernet device-count"
        );
        assert_eq!(
            DeviceCount::Set(2).directive().to_string(),
            "set chassis aggregated-devices ethernet device-count 2"
        );
    }

    #[test]
    fn slot_states_from_dump() {
        let dump = "<configuration-output>
set unit 0 family inet
set unit 1 description NC
set unit 1 disable
set unit 3
</configuration-output>";
        let slots = SlotMap::from_dump(dump).unwrap();
        assert_eq!(slots.get(0), Some(SlotState::Configured));
        assert_eq!(slots.get(1), Some(SlotState::Disabled));
        assert_eq!(slots.get(2), None);
        assert_eq!(slots.get(3), Some(SlotState::Empty));
    }

    #[test]
    fn slot_strategies() {
        let mut slots = SlotMap::default();
        slots.insert(0, SlotState::Configured);
        slots.insert(1, SlotState::Disabled);
        assert_eq!(
            next_tunnel_unit(&slots, TunnelUnitStrategy::EmptyOrDisabled).unwrap(),
            TunnelUnit { unit: 1, reclaim: true }
        );
        assert_eq!(
            next_tunnel_unit(&slots, TunnelUnitStrategy::Absent).unwrap(),
            TunnelUnit { unit: 2, reclaim: false }
        );
    }

    #[test]
    fn absent_strategy_skips_unit_zero() {
        let slots = SlotMap::default();
        assert_eq!(next_tunnel_unit(&slots, TunnelUnitStrategy::Absent).unwrap().unit, 1);
        assert_eq!(
            next_tunnel_unit(&slots, TunnelUnitStrategy::EmptyOrDisabled).unwrap().unit,
            0
        );
    }

    #[test]
    fn malformed_unit_number() {
        let err = SlotMap::from_dump("set unit x family inet").unwrap_err();
        assert!(matches!(err, CoreError::MalformedDeviceOutput { .. }));
    }

    #[test]
    fn strategy_names() {
        assert_eq!(TunnelUnitStrategy::EmptyOrDisabled.to_string(), "empty_or_disabled");
        assert_eq!("absent".parse::<TunnelUnitStrategy>().unwrap(), TunnelUnitStrategy::Absent);
        assert_eq!(tunnel_unit_of("st0.7"), Some(7));
        assert_eq!(tunnel_unit_of("ge-0/0/0.7"), None);
    }
}
