// ── OSPF area ──
//
// Identified by area, protocol version and routing instance together; the
// import identifier joins the three with `_-_`.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::LazyLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::context::DeviceContext;
use crate::directive::DirectiveBatch;
use crate::error::CoreError;
use crate::parse::{
    Action, LineError, LineTable, find_or_push, parse_dump, parse_int, split_first, unquote,
};
use crate::resource::{Resolved, Resource};

const KEY_SEPARATOR: &str = "_-_";
const DEFAULT_INSTANCE: &str = "default";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OspfVersion {
    #[default]
    V2,
    V3,
}

impl OspfVersion {
    fn protocol(self) -> &'static str {
        match self {
            Self::V2 => "ospf",
            Self::V3 => "ospf3",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AreaType {
    #[default]
    None,
    Stub,
    Nssa,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfArea {
    pub area_id: String,
    pub version: OspfVersion,
    /// Empty or `default` for the master instance.
    pub routing_instance: String,
    pub area_type: AreaType,
    pub interface: Vec<OspfInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfInterface {
    pub name: String,
    pub disable: bool,
    pub passive: bool,
    pub metric: u32,
    pub priority: u32,
    pub hello_interval: u32,
    pub dead_interval: u32,
    pub retransmit_interval: u32,
    pub interface_type: String,
}

/// Area identity: `<area>_-_<version>_-_<routing instance>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OspfAreaKey {
    pub area_id: String,
    pub version: OspfVersion,
    pub routing_instance: String,
}

impl OspfAreaKey {
    pub fn new(
        area_id: &str,
        version: OspfVersion,
        routing_instance: &str,
    ) -> Self {
        let routing_instance = if routing_instance.is_empty() {
            DEFAULT_INSTANCE
        } else {
            routing_instance
        };
        Self {
            area_id: normalize_area_id(area_id),
            version,
            routing_instance: routing_instance.to_owned(),
        }
    }

    fn in_master(&self) -> bool {
        self.routing_instance == DEFAULT_INSTANCE
    }
}

impl fmt::Display for OspfAreaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            self.area_id, self.version, self.routing_instance
        )
    }
}

impl FromStr for OspfAreaKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(KEY_SEPARATOR).collect();
        let [area, version, instance] = parts.as_slice() else {
            return Err(CoreError::violation(
                format!("ospf_area {s}"),
                "id",
                format!("expected <area>{KEY_SEPARATOR}<v2|v3>{KEY_SEPARATOR}<routing instance>"),
            ));
        };
        let version = version.parse::<OspfVersion>().map_err(|_| {
            CoreError::violation(format!("ospf_area {s}"), "version", "must be v2 or v3")
        })?;
        Ok(Self::new(area, version, instance))
    }
}

/// Areas given as a plain number are written in dotted-quad form.
pub fn normalize_area_id(area_id: &str) -> String {
    match area_id.parse::<u32>() {
        Ok(n) => Ipv4Addr::from(n).to_string(),
        Err(_) => area_id.to_owned(),
    }
}

// ── Parser ───────────────────────────────────────────────────────────

static AREA_TABLE: LazyLock<LineTable<OspfArea>> = LazyLock::new(|| {
    LineTable::new(vec![
        ("stub", Action::Apply(|a: &mut OspfArea, _: &str| {
            a.area_type = AreaType::Stub;
            Ok(())
        })),
        ("nssa", Action::Apply(|a: &mut OspfArea, _: &str| {
            a.area_type = AreaType::Nssa;
            Ok(())
        })),
        ("interface", Action::Apply(interface)),
    ])
});

static INTERFACE_TABLE: LazyLock<LineTable<OspfInterface>> = LazyLock::new(|| {
    LineTable::new(vec![
        ("disable", Action::Apply(|i: &mut OspfInterface, _: &str| {
            i.disable = true;
            Ok(())
        })),
        ("passive", Action::Apply(|i: &mut OspfInterface, _: &str| {
            i.passive = true;
            Ok(())
        })),
        ("metric", Action::Apply(|i: &mut OspfInterface, rest: &str| {
            i.metric = parse_int(rest)?;
            Ok(())
        })),
        ("priority", Action::Apply(|i: &mut OspfInterface, rest: &str| {
            i.priority = parse_int(rest)?;
            Ok(())
        })),
        ("hello-interval", Action::Apply(|i: &mut OspfInterface, rest: &str| {
            i.hello_interval = parse_int(rest)?;
            Ok(())
        })),
        ("dead-interval", Action::Apply(|i: &mut OspfInterface, rest: &str| {
            i.dead_interval = parse_int(rest)?;
            Ok(())
        })),
        ("retransmit-interval", Action::Apply(|i: &mut OspfInterface, rest: &str| {
            i.retransmit_interval = parse_int(rest)?;
            Ok(())
        })),
        ("interface-type", Action::Apply(|i: &mut OspfInterface, rest: &str| {
            i.interface_type = unquote(rest);
            Ok(())
        })),
    ])
});

fn interface(area: &mut OspfArea, rest: &str) -> Result<(), LineError> {
    let (name, tail) = split_first(rest);
    if name.is_empty() {
        return Err(LineError::new("missing interface name"));
    }
    let entry = find_or_push(&mut area.interface, |i| i.name == name, || OspfInterface {
        name: name.clone(),
        ..OspfInterface::default()
    });
    INTERFACE_TABLE.dispatch(entry, tail)?;
    Ok(())
}

// ── Resource ─────────────────────────────────────────────────────────

#[async_trait]
impl Resource for OspfArea {
    const KIND: &'static str = "ospf_area";

    type Key = OspfAreaKey;

    fn key(&self) -> OspfAreaKey {
        OspfAreaKey::new(&self.area_id, self.version, &self.routing_instance)
    }

    fn scope(key: &OspfAreaKey) -> String {
        let protocol = key.version.protocol();
        if key.in_master() {
            format!("protocols {protocol} area {}", key.area_id)
        } else {
            format!(
                "routing-instances {} protocols {protocol} area {}",
                key.routing_instance, key.area_id
            )
        }
    }

    fn parse(key: &OspfAreaKey, dump: &str) -> Result<Self, CoreError> {
        let mut area = OspfArea::default();
        if parse_dump(&Self::label(key), dump, &AREA_TABLE, &mut area)? {
            area.area_id.clone_from(&key.area_id);
            area.version = key.version;
            area.routing_instance.clone_from(&key.routing_instance);
        }
        Ok(area)
    }

    fn validate(&self) -> Result<(), CoreError> {
        let label = Self::label(&self.key());
        let area_id = normalize_area_id(&self.area_id);
        if area_id.parse::<Ipv4Addr>().is_err() {
            return Err(CoreError::violation(
                label,
                "area_id",
                "must be a dotted quad or a number",
            ));
        }
        if self.routing_instance.contains(char::is_whitespace) {
            return Err(CoreError::violation(label, "routing_instance", "must be a single word"));
        }
        if self.interface.iter().any(|i| i.name.is_empty()) {
            return Err(CoreError::violation(label, "interface", "name must not be empty"));
        }
        Ok(())
    }

    fn compile(&self, _ctx: &DeviceContext, _resolved: &Resolved) -> Result<DirectiveBatch, CoreError> {
        self.validate()?;
        let mut batch = DirectiveBatch::new();
        let mut s = batch.scoped(Self::scope(&self.key()));
        s.set("");
        match self.area_type {
            AreaType::None => {}
            AreaType::Stub => s.set("stub"),
            AreaType::Nssa => s.set("nssa"),
        }
        for iface in &self.interface {
            let mut i = s.nested(format!("interface {}", iface.name));
            i.set("");
            i.set_flag("disable", iface.disable);
            i.set_flag("passive", iface.passive);
            i.set_num("metric", iface.metric);
            i.set_num("priority", iface.priority);
            i.set_num("hello-interval", iface.hello_interval);
            i.set_num("dead-interval", iface.dead_interval);
            i.set_num("retransmit-interval", iface.retransmit_interval);
            i.set_str("interface-type", &iface.interface_type);
        }
        Ok(batch)
    }

    fn compile_delete(
        &self,
        _ctx: &DeviceContext,
        _resolved: &Resolved,
    ) -> Result<DirectiveBatch, CoreError> {
        let mut batch = DirectiveBatch::new();
        batch.delete(Self::scope(&self.key()));
        Ok(batch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn key_round_trips_through_its_string_form() {
        let key: OspfAreaKey = "0_-_v3_-_blue".parse().unwrap();
        assert_eq!(key.area_id, "0.0.0.0");
        assert_eq!(key.version, OspfVersion::V3);
        assert_eq!(key.to_string(), "0.0.0.0_-_v3_-_blue");
        assert!("0.0.0.0_-_v4_-_default".parse::<OspfAreaKey>().is_err());
        assert!("0.0.0.0".parse::<OspfAreaKey>().is_err());
    }

    #[test]
    fn scope_depends_on_instance() {
        let master = OspfAreaKey::new("1", OspfVersion::V2, "");
        assert_eq!(OspfArea::scope(&master), "protocols ospf area 0.0.0.1");
        let blue = OspfAreaKey::new("0.0.0.0", OspfVersion::V3, "blue");
        assert_eq!(
            OspfArea::scope(&blue),
            "routing-instances blue protocols ospf3 area 0.0.0.0"
        );
    }

    #[test]
    fn compile_and_parse() {
        let area = OspfArea {
            area_id: "0.0.0.10".into(),
            version: OspfVersion::V2,
            routing_instance: DEFAULT_INSTANCE.into(),
            area_type: AreaType::Stub,
            interface: vec![
                OspfInterface {
                    name: "ge-0/0/0.0".into(),
                    metric: 10,
                    interface_type: "p2p".into(),
                    ..OspfInterface::default()
                },
                OspfInterface {
                    name: "lo0.0".into(),
                    passive: true,
                    ..OspfInterface::default()
                },
            ],
        };
        let batch = area.compile(&DeviceContext::default(), &Resolved::default()).unwrap();
        assert_eq!(
            batch.to_lines()[..3],
            [
                "set protocols ospf area 0.0.0.10",
                "set protocols ospf area 0.0.0.10 stub",
                "set protocols ospf area 0.0.0.10 interface ge-0/0/0.0",
            ]
        );
        let dump: Vec<String> = batch
            .to_lines()
            .iter()
            .map(|l| l.replacen("set protocols ospf area 0.0.0.10", "set", 1))
            .collect();
        let parsed = OspfArea::parse(&area.key(), &dump.join("\n")).unwrap();
        assert_eq!(parsed, area);
    }

    #[test]
    fn rejects_bad_area() {
        let area = OspfArea {
            area_id: "backbone".into(),
            ..OspfArea::default()
        };
        assert!(area.validate().unwrap_err().is_input_error());
    }
}
