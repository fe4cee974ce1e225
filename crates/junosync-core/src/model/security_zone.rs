// ── Security zone ──

use std::sync::LazyLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::DeviceContext;
use crate::directive::DirectiveBatch;
use crate::error::CoreError;
use crate::parse::{
    Action, LineError, LineTable, find_or_push, parse_dump, push_unique, split_first,
    strip_token_prefix, unquote,
};
use crate::resource::{Resolved, Resource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityZone {
    pub name: String,
    pub description: String,
    pub address_book: Vec<ZoneAddress>,
    pub address_book_set: Vec<ZoneAddressSet>,
    pub inbound_services: Vec<String>,
    pub inbound_protocols: Vec<String>,
    pub screen: String,
    pub application_tracking: bool,
    pub tcp_rst: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneAddress {
    pub name: String,
    pub network: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneAddressSet {
    pub name: String,
    pub address: Vec<String>,
}

impl SecurityZone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

static ZONE_TABLE: LazyLock<LineTable<SecurityZone>> = LazyLock::new(|| {
    LineTable::new(vec![
        ("description", Action::Apply(|z: &mut SecurityZone, rest: &str| {
            z.description = unquote(rest);
            Ok(())
        })),
        ("address-book address", Action::Apply(book_address)),
        ("address-book address-set", Action::Apply(book_address_set)),
        ("host-inbound-traffic system-services", Action::Apply(|z: &mut SecurityZone, rest: &str| {
            push_unique(&mut z.inbound_services, unquote(rest));
            Ok(())
        })),
        ("host-inbound-traffic protocols", Action::Apply(|z: &mut SecurityZone, rest: &str| {
            push_unique(&mut z.inbound_protocols, unquote(rest));
            Ok(())
        })),
        ("screen", Action::Apply(|z: &mut SecurityZone, rest: &str| {
            z.screen = unquote(rest);
            Ok(())
        })),
        ("application-tracking", Action::Apply(|z: &mut SecurityZone, _: &str| {
            z.application_tracking = true;
            Ok(())
        })),
        ("tcp-rst", Action::Apply(|z: &mut SecurityZone, _: &str| {
            z.tcp_rst = true;
            Ok(())
        })),
        // Bound by the interface resources.
        ("interfaces", Action::Skip),
    ])
});

fn book_address(zone: &mut SecurityZone, rest: &str) -> Result<(), LineError> {
    let (name, tail) = split_first(rest);
    if name.is_empty() {
        return Err(LineError::new("missing address name"));
    }
    let entry = find_or_push(
        &mut zone.address_book,
        |a| a.name == name,
        || ZoneAddress {
            name: name.clone(),
            ..ZoneAddress::default()
        },
    );
    match strip_token_prefix(tail, "description") {
        Some(description) => entry.description = unquote(description),
        None if !tail.is_empty() => entry.network = unquote(tail),
        None => {}
    }
    Ok(())
}

fn book_address_set(zone: &mut SecurityZone, rest: &str) -> Result<(), LineError> {
    let (name, tail) = split_first(rest);
    let set = find_or_push(
        &mut zone.address_book_set,
        |s| s.name == name,
        || ZoneAddressSet {
            name: name.clone(),
            address: Vec::new(),
        },
    );
    if let Some(member) = strip_token_prefix(tail, "address") {
        push_unique(&mut set.address, unquote(member));
    }
    Ok(())
}

#[async_trait]
impl Resource for SecurityZone {
    const KIND: &'static str = "security_zone";

    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn scope(key: &String) -> String {
        format!("security zones security-zone {key}")
    }

    fn parse(key: &String, dump: &str) -> Result<Self, CoreError> {
        let mut zone = SecurityZone::default();
        if parse_dump(&Self::label(key), dump, &ZONE_TABLE, &mut zone)? {
            zone.name.clone_from(key);
        }
        Ok(zone)
    }

    fn validate(&self) -> Result<(), CoreError> {
        let label = Self::label(&self.name);
        if self.name.is_empty() || self.name.contains(char::is_whitespace) {
            return Err(CoreError::violation(label, "name", "must be a single non-empty word"));
        }
        for address in &self.address_book {
            if address.name.is_empty() || address.network.is_empty() {
                return Err(CoreError::violation(
                    label,
                    "address_book",
                    "every address needs a name and a network",
                ));
            }
        }
        for set in &self.address_book_set {
            if set.name.is_empty() || set.address.is_empty() {
                return Err(CoreError::violation(
                    label,
                    "address_book_set",
                    "every address set needs a name and at least one address",
                ));
            }
        }
        Ok(())
    }

    fn compile(&self, _ctx: &DeviceContext, _resolved: &Resolved) -> Result<DirectiveBatch, CoreError> {
        self.validate()?;
        let mut batch = DirectiveBatch::new();
        let mut s = batch.scoped(Self::scope(&self.name));
        s.set("");
        s.set_str("description", &self.description);
        for address in &self.address_book {
            let rel = format!("address-book address {}", address.name);
            s.set_value(&rel, &address.network);
            s.set_str(&format!("{rel} description"), &address.description);
        }
        for set in &self.address_book_set {
            let mut a = s.nested(format!("address-book address-set {}", set.name));
            for member in &set.address {
                a.set_value("address", member);
            }
        }
        for service in &self.inbound_services {
            s.set_value("host-inbound-traffic system-services", service);
        }
        for protocol in &self.inbound_protocols {
            s.set_value("host-inbound-traffic protocols", protocol);
        }
        s.set_str("screen", &self.screen);
        s.set_flag("application-tracking", self.application_tracking);
        s.set_flag("tcp-rst", self.tcp_rst);
        Ok(batch)
    }

    fn compile_delete(
        &self,
        _ctx: &DeviceContext,
        resolved: &Resolved,
    ) -> Result<DirectiveBatch, CoreError> {
        let mut batch = DirectiveBatch::new();
        if !resolved.is_update_remove() {
            batch.delete(Self::scope(&self.name));
            return Ok(batch);
        }
        // Interface bindings belong to the interface resources.
        let mut s = batch.scoped(Self::scope(&self.name));
        let owned = [
            ("description", !self.description.is_empty()),
            (
                "address-book",
                !self.address_book.is_empty() || !self.address_book_set.is_empty(),
            ),
            (
                "host-inbound-traffic",
                !self.inbound_services.is_empty() || !self.inbound_protocols.is_empty(),
            ),
            ("screen", !self.screen.is_empty()),
            ("application-tracking", self.application_tracking),
            ("tcp-rst", self.tcp_rst),
        ];
        for (statement, _) in owned.iter().filter(|(_, set)| *set) {
            s.delete(statement);
        }
        Ok(batch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::resource::Phase;

    fn zone() -> SecurityZone {
        let mut zone = SecurityZone::new("dmz");
        zone.description = "public services".into();
        zone.address_book = vec![ZoneAddress {
            name: "web".into(),
            network: "198.51.100.10/32".into(),
            description: "front end".into(),
        }];
        zone.address_book_set = vec![ZoneAddressSet {
            name: "servers".into(),
            address: vec!["web".into()],
        }];
        zone.inbound_services = vec!["ping".into(), "ssh".into()];
        zone.tcp_rst = true;
        zone
    }

    #[test]
    fn bare_zone_line_comes_first() {
        let batch = zone().compile(&DeviceContext::default(), &Resolved::default()).unwrap();
        let lines = batch.to_lines();
        assert_eq!(lines[0], "set security zones security-zone dmz");
        assert_eq!(
            lines[2],
            "set security zones security-zone dmz address-book address web 198.51.100.10/32"
        );
        assert_eq!(lines.last().unwrap(), "set security zones security-zone dmz tcp-rst");
    }

    #[test]
    fn parse_round_trip_ignores_interfaces() {
        let original = zone();
        let batch = original.compile(&DeviceContext::default(), &Resolved::default()).unwrap();
        let mut dump: Vec<String> = batch
            .to_lines()
            .iter()
            .map(|l| l.replacen("set security zones security-zone dmz", "set", 1))
            .collect();
        dump.push("set interfaces ge-0/0/1.0 host-inbound-traffic system-services all".into());
        let parsed = SecurityZone::parse(&"dmz".to_owned(), &dump.join("\n")).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn update_removal_keeps_interface_bindings() {
        let mut current = SecurityZone::new("dmz");
        current.inbound_services = vec!["ping".into()];
        current.screen = "untrust-screen".into();
        let resolved = Resolved::for_phase(Phase::UpdateRemove);
        assert_eq!(
            current.compile_delete(&DeviceContext::default(), &resolved).unwrap().to_lines(),
            vec![
                "delete security zones security-zone dmz host-inbound-traffic",
                "delete security zones security-zone dmz screen",
            ]
        );
        let delete = Resolved::for_phase(Phase::Delete);
        assert_eq!(
            current.compile_delete(&DeviceContext::default(), &delete).unwrap().to_lines(),
            vec!["delete security zones security-zone dmz"]
        );
    }

    #[test]
    fn incomplete_address_set_is_rejected() {
        let mut bad = SecurityZone::new("dmz");
        bad.address_book_set = vec![ZoneAddressSet {
            name: "empty".into(),
            address: Vec::new(),
        }];
        assert!(bad.validate().unwrap_err().is_input_error());
    }
}
