// ── Logical interface ──
//
// A unit of a port (`ge-0/0/0.100`) with nested family blocks. Unlike a
// physical port it is removed outright on delete.

use std::sync::LazyLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::DeviceContext;
use crate::directive::DirectiveBatch;
use crate::error::CoreError;
use crate::model::family::{
    AddressFamily, FamilyHost, FamilyMut, FamilyOptions, FamilyRef, compile_family,
    family_entries, validate_family,
};
use crate::model::interface::{
    add_memberships, find_memberships, interface_scope, remove_memberships, split_unit,
};
use crate::parse::{Action, LineTable, parse_dump, parse_int, unquote};
use crate::resource::{Resolved, Resource};
use crate::session::Reader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicalInterface {
    pub name: String,
    pub description: String,
    pub disable: bool,
    pub vlan_id: u32,
    pub family_inet: Option<FamilyOptions>,
    pub family_inet6: Option<FamilyOptions>,
    pub security_zone: String,
    pub routing_instance: String,
}

impl LogicalInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl FamilyHost for LogicalInterface {
    fn family(&self, family: AddressFamily) -> Option<FamilyRef<'_>> {
        match family {
            AddressFamily::Inet => self.family_inet.as_ref().map(FamilyOptions::view),
            AddressFamily::Inet6 => self.family_inet6.as_ref().map(FamilyOptions::view),
        }
    }

    fn family_mut(&mut self, family: AddressFamily) -> FamilyMut<'_> {
        let slot = match family {
            AddressFamily::Inet => &mut self.family_inet,
            AddressFamily::Inet6 => &mut self.family_inet6,
        };
        slot.get_or_insert_with(FamilyOptions::default).view_mut()
    }
}

static LOGICAL_TABLE: LazyLock<LineTable<LogicalInterface>> = LazyLock::new(|| {
    let mut entries: Vec<(&'static str, Action<LogicalInterface>)> = vec![
        ("description", Action::Apply(|l: &mut LogicalInterface, rest: &str| {
            l.description = unquote(rest);
            Ok(())
        })),
        ("disable", Action::Apply(|l: &mut LogicalInterface, _: &str| {
            l.disable = true;
            Ok(())
        })),
        ("vlan-id", Action::Apply(|l: &mut LogicalInterface, rest: &str| {
            l.vlan_id = parse_int(rest)?;
            Ok(())
        })),
    ];
    entries.extend(family_entries::<LogicalInterface>());
    LineTable::new(entries)
});

#[async_trait]
impl Resource for LogicalInterface {
    const KIND: &'static str = "logical_interface";

    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn scope(key: &String) -> String {
        interface_scope(key)
    }

    fn parse(key: &String, dump: &str) -> Result<Self, CoreError> {
        let mut unit = LogicalInterface::default();
        if parse_dump(&Self::label(key), dump, &LOGICAL_TABLE, &mut unit)? {
            unit.name.clone_from(key);
        }
        Ok(unit)
    }

    fn validate(&self) -> Result<(), CoreError> {
        let label = Self::label(&self.name);
        if self.name.matches('.').count() != 1 {
            return Err(CoreError::violation(
                label,
                "name",
                "must be <port>.<unit> with exactly one dot",
            ));
        }
        split_unit(&label, &self.name)?;
        for family in [AddressFamily::Inet, AddressFamily::Inet6] {
            if let Some(view) = self.family(family) {
                validate_family(&label, family, view)?;
            }
        }
        Ok(())
    }

    fn compile(&self, _ctx: &DeviceContext, _resolved: &Resolved) -> Result<DirectiveBatch, CoreError> {
        self.validate()?;
        let mut batch = DirectiveBatch::new();
        {
            let mut s = batch.scoped(interface_scope(&self.name));
            s.set("");
            s.set_str("description", &self.description);
            s.set_flag("disable", self.disable);
            s.set_num("vlan-id", self.vlan_id);
            for family in [AddressFamily::Inet, AddressFamily::Inet6] {
                if let Some(view) = self.family(family) {
                    compile_family(&mut s, family, view);
                }
            }
        }
        add_memberships(&mut batch, &self.name, &self.security_zone, &self.routing_instance);
        Ok(batch)
    }

    fn compile_delete(
        &self,
        _ctx: &DeviceContext,
        _resolved: &Resolved,
    ) -> Result<DirectiveBatch, CoreError> {
        let mut batch = DirectiveBatch::new();
        batch.delete(interface_scope(&self.name));
        remove_memberships(&mut batch, &self.name, &self.security_zone, &self.routing_instance);
        Ok(batch)
    }

    async fn enrich(&mut self, reader: &mut Reader<'_>) -> Result<(), CoreError> {
        let (zone, instance) = find_memberships(reader, &self.name).await?;
        self.security_zone = zone;
        self.routing_instance = instance;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::family::Address;

    #[test]
    fn name_needs_exactly_one_dot() {
        assert!(LogicalInterface::new("ge-0/0/0").validate().is_err());
        assert!(LogicalInterface::new("ge-0/0/0.1.2").validate().is_err());
        assert!(LogicalInterface::new("ge-0/0/0.12").validate().is_ok());
    }

    #[test]
    fn compiles_families_and_memberships() {
        let mut unit = LogicalInterface::new("reth0.10");
        unit.vlan_id = 10;
        unit.family_inet = Some(FamilyOptions {
            address: vec![Address::new("172.16.10.1/24")],
            ..FamilyOptions::default()
        });
        unit.routing_instance = "guest".into();
        let batch = unit.compile(&DeviceContext::default(), &Resolved::default()).unwrap();
        assert_eq!(
            batch.to_lines(),
            vec![
                "set interfaces reth0 unit 10",
                "set interfaces reth0 unit 10 vlan-id 10",
                "set interfaces reth0 unit 10 family inet",
                "set interfaces reth0 unit 10 family inet address 172.16.10.1/24",
                "set routing-instances guest interface reth0.10",
            ]
        );

        let delete = unit.compile_delete(&DeviceContext::default(), &Resolved::default()).unwrap();
        assert_eq!(
            delete.to_lines(),
            vec![
                "delete interfaces reth0 unit 10",
                "delete routing-instances guest interface reth0.10",
            ]
        );
    }

    #[test]
    fn parse_round_trip() {
        let mut unit = LogicalInterface::new("ge-0/0/3.0");
        unit.description = "transit".into();
        unit.disable = true;
        unit.family_inet6 = Some(FamilyOptions {
            mtu: 1400,
            address: vec![Address::new("2001:db8:1::1/64")],
            ..FamilyOptions::default()
        });
        let batch = unit.compile(&DeviceContext::default(), &Resolved::default()).unwrap();
        let dump: Vec<String> = batch
            .to_lines()
            .iter()
            .map(|l| l.replacen("set interfaces ge-0/0/3 unit 0", "set", 1))
            .collect();
        let parsed = LogicalInterface::parse(&unit.name, &dump.join("\n")).unwrap();
        assert_eq!(parsed, unit);
    }
}
