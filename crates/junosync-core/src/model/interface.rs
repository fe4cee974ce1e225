// ── Interface ──
//
// One description covers a physical port (`ge-0/0/0`, `ae0`) or one of its
// units (`ge-0/0/0.100`). Physical ports that exist in hardware are never
// removed: deletion leaves a disabled placeholder behind. LAG membership
// changes recompute the chassis aggregated-device count.

use std::sync::LazyLock;

use async_trait::async_trait;
use junosync_api::PlatformFamily;
use serde::{Deserialize, Serialize};

use crate::allocator::{INTERFACES_SCAN, ae_index, aggregated_device_count};
use crate::classify::{PLACEHOLDER_DESCRIPTION, Presence, classify_with_group};
use crate::context::DeviceContext;
use crate::directive::DirectiveBatch;
use crate::error::CoreError;
use crate::model::family::{
    Address, AddressFamily, FamilyHost, FamilyMut, FamilyRef, compile_family, family_entries,
    validate_family,
};
use crate::parse::{
    Action, LineError, LineTable, parse_dump, parse_int, push_unique, strip_envelope,
    strip_token_prefix, unquote,
};
use crate::resource::{Phase, Resolved, Resource};
use crate::session::Reader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interface {
    pub name: String,
    pub description: String,
    pub disable: bool,
    pub mtu: u32,
    pub vlan_tagging: bool,
    pub vlan_native: u32,
    pub trunk: bool,
    pub vlan_members: Vec<String>,
    pub ether802_3ad: String,
    pub ae_lacp: String,
    pub ae_link_speed: String,
    pub ae_minimum_links: u32,
    pub vlan_id: u32,
    pub inet: bool,
    pub inet6: bool,
    pub inet_address: Vec<Address>,
    pub inet6_address: Vec<Address>,
    pub inet_mtu: u32,
    pub inet6_mtu: u32,
    pub inet_filter_input: String,
    pub inet_filter_output: String,
    pub inet6_filter_input: String,
    pub inet6_filter_output: String,
    pub security_zone: String,
    pub routing_instance: String,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn is_unit(&self) -> bool {
        self.name.contains('.')
    }

    fn resource_label(&self) -> String {
        <Self as Resource>::label(&self.name)
    }

    fn validate_physical_only(&self) -> Result<(), CoreError> {
        let physical_only = [
            ("mtu", self.mtu != 0),
            ("vlan_tagging", self.vlan_tagging),
            ("vlan_native", self.vlan_native != 0),
            ("trunk", self.trunk),
            ("vlan_members", !self.vlan_members.is_empty()),
            ("ether802_3ad", !self.ether802_3ad.is_empty()),
            ("ae_lacp", !self.ae_lacp.is_empty()),
            ("ae_link_speed", !self.ae_link_speed.is_empty()),
            ("ae_minimum_links", self.ae_minimum_links != 0),
        ];
        match physical_only.iter().find(|(_, set)| *set) {
            Some((field, _)) => Err(CoreError::violation(
                self.resource_label(),
                *field,
                "only valid on a physical interface name",
            )),
            None => Ok(()),
        }
    }

    fn validate_families(&self) -> Result<(), CoreError> {
        let needs_inet = [
            ("inet_address", !self.inet_address.is_empty()),
            ("inet_mtu", self.inet_mtu != 0),
            ("inet_filter_input", !self.inet_filter_input.is_empty()),
            ("inet_filter_output", !self.inet_filter_output.is_empty()),
        ];
        if !self.inet {
            if let Some((field, _)) = needs_inet.iter().find(|(_, set)| *set) {
                return Err(CoreError::violation(self.resource_label(), *field, "requires inet"));
            }
        }
        let needs_inet6 = [
            ("inet6_address", !self.inet6_address.is_empty()),
            ("inet6_mtu", self.inet6_mtu != 0),
            ("inet6_filter_input", !self.inet6_filter_input.is_empty()),
            ("inet6_filter_output", !self.inet6_filter_output.is_empty()),
        ];
        if !self.inet6 {
            if let Some((field, _)) = needs_inet6.iter().find(|(_, set)| *set) {
                return Err(CoreError::violation(self.resource_label(), *field, "requires inet6"));
            }
        }
        for family in [AddressFamily::Inet, AddressFamily::Inet6] {
            if let Some(view) = self.family(family) {
                validate_family(&self.resource_label(), family, view)?;
            }
        }
        Ok(())
    }

    fn validate_lag(&self) -> Result<(), CoreError> {
        let is_ae = ae_index(&self.name).is_some();
        let ae_options = [
            ("ae_lacp", !self.ae_lacp.is_empty()),
            ("ae_link_speed", !self.ae_link_speed.is_empty()),
            ("ae_minimum_links", self.ae_minimum_links != 0),
        ];
        if !is_ae {
            if let Some((field, _)) = ae_options.iter().find(|(_, set)| *set) {
                return Err(CoreError::violation(
                    self.resource_label(),
                    *field,
                    "requires an aggregated interface name (aeN)",
                ));
            }
        }
        if !self.ae_lacp.is_empty() && !matches!(self.ae_lacp.as_str(), "active" | "passive") {
            return Err(CoreError::violation(
                self.resource_label(),
                "ae_lacp",
                "must be active or passive",
            ));
        }
        if self.ether802_3ad.is_empty() {
            return Ok(());
        }
        if ae_index(&self.ether802_3ad).is_none() {
            return Err(CoreError::violation(
                self.resource_label(),
                "ether802_3ad",
                "must name an aggregated interface (aeN)",
            ));
        }
        if is_ae {
            return Err(CoreError::violation(
                self.resource_label(),
                "ether802_3ad",
                "an aggregated interface cannot join another one",
            ));
        }
        let member_conflicts = [
            ("inet", self.inet),
            ("inet6", self.inet6),
            ("vlan_tagging", self.vlan_tagging),
            ("trunk", self.trunk),
        ];
        if let Some((field, _)) = member_conflicts.iter().find(|(_, set)| *set) {
            return Err(CoreError::ConflictingOptions {
                resource: self.resource_label(),
                fields: format!("ether802_3ad and {field}"),
            });
        }
        Ok(())
    }
}

impl Interface {
    /// Remove only the statements this description sets on a port, leaving
    /// its units (objects of their own) in place.
    fn compile_owned_removal(&self, ctx: &DeviceContext) -> DirectiveBatch {
        let mut batch = DirectiveBatch::new();
        {
            let mut s = batch.scoped(interface_scope(&self.name));
            let owned = [
                ("description", !self.description.is_empty()),
                ("disable", self.disable),
                ("mtu", self.mtu != 0),
                ("vlan-tagging", self.vlan_tagging),
                ("native-vlan-id", self.vlan_native != 0),
                (
                    "unit 0 family ethernet-switching",
                    self.trunk || !self.vlan_members.is_empty(),
                ),
                (
                    "aggregated-ether-options",
                    !self.ae_lacp.is_empty()
                        || !self.ae_link_speed.is_empty()
                        || self.ae_minimum_links != 0,
                ),
                ("family inet", self.inet),
                ("family inet6", self.inet6),
            ];
            for (statement, _) in owned.iter().filter(|(_, set)| *set) {
                s.delete(statement);
            }
            if !self.ether802_3ad.is_empty() {
                s.delete(format!("{} 802.3ad", ctx.lag_member_options()));
            }
        }
        remove_memberships(&mut batch, &self.name, &self.security_zone, &self.routing_instance);
        batch
    }
}

impl FamilyHost for Interface {
    fn family(&self, family: AddressFamily) -> Option<FamilyRef<'_>> {
        match family {
            AddressFamily::Inet if self.inet => Some(FamilyRef {
                mtu: self.inet_mtu,
                filter_input: &self.inet_filter_input,
                filter_output: &self.inet_filter_output,
                address: &self.inet_address,
            }),
            AddressFamily::Inet6 if self.inet6 => Some(FamilyRef {
                mtu: self.inet6_mtu,
                filter_input: &self.inet6_filter_input,
                filter_output: &self.inet6_filter_output,
                address: &self.inet6_address,
            }),
            _ => None,
        }
    }

    fn family_mut(&mut self, family: AddressFamily) -> FamilyMut<'_> {
        match family {
            AddressFamily::Inet => {
                self.inet = true;
                FamilyMut {
                    mtu: &mut self.inet_mtu,
                    filter_input: &mut self.inet_filter_input,
                    filter_output: &mut self.inet_filter_output,
                    address: &mut self.inet_address,
                }
            }
            AddressFamily::Inet6 => {
                self.inet6 = true;
                FamilyMut {
                    mtu: &mut self.inet6_mtu,
                    filter_input: &mut self.inet6_filter_input,
                    filter_output: &mut self.inet6_filter_output,
                    address: &mut self.inet6_address,
                }
            }
        }
    }
}

// ── Parser table ─────────────────────────────────────────────────────

static INTERFACE_TABLE: LazyLock<LineTable<Interface>> = LazyLock::new(|| {
    let mut entries: Vec<(&'static str, Action<Interface>)> = vec![
        ("description", Action::Apply(|i: &mut Interface, rest: &str| {
            i.description = unquote(rest);
            Ok(())
        })),
        ("disable", Action::Apply(|i: &mut Interface, _: &str| {
            i.disable = true;
            Ok(())
        })),
        ("mtu", Action::Apply(|i: &mut Interface, rest: &str| {
            i.mtu = parse_int(rest)?;
            Ok(())
        })),
        ("vlan-tagging", Action::Apply(|i: &mut Interface, _: &str| {
            i.vlan_tagging = true;
            Ok(())
        })),
        ("native-vlan-id", Action::Apply(|i: &mut Interface, rest: &str| {
            i.vlan_native = parse_int(rest)?;
            Ok(())
        })),
        ("vlan-id", Action::Apply(|i: &mut Interface, rest: &str| {
            i.vlan_id = parse_int(rest)?;
            Ok(())
        })),
        ("ether-options 802.3ad", Action::Apply(lag_parent)),
        ("gigether-options 802.3ad", Action::Apply(lag_parent)),
        ("aggregated-ether-options lacp", Action::Apply(|i: &mut Interface, rest: &str| {
            let (mode, _) = rest.split_once(' ').unwrap_or((rest, ""));
            i.ae_lacp = mode.to_owned();
            Ok(())
        })),
        ("aggregated-ether-options link-speed", Action::Apply(|i: &mut Interface, rest: &str| {
            i.ae_link_speed = unquote(rest);
            Ok(())
        })),
        ("aggregated-ether-options minimum-links", Action::Apply(|i: &mut Interface, rest: &str| {
            i.ae_minimum_links = parse_int(rest)?;
            Ok(())
        })),
        ("unit 0 family ethernet-switching interface-mode", Action::Apply(switching_mode)),
        ("unit 0 family ethernet-switching port-mode", Action::Apply(switching_mode)),
        ("unit 0 family ethernet-switching vlan members", Action::Apply(|i: &mut Interface, rest: &str| {
            push_unique(&mut i.vlan_members, unquote(rest));
            Ok(())
        })),
        // Units are objects of their own.
        ("unit", Action::Skip),
    ];
    entries.extend(family_entries::<Interface>());
    LineTable::new(entries)
});

fn lag_parent(i: &mut Interface, rest: &str) -> Result<(), LineError> {
    i.ether802_3ad = unquote(rest);
    Ok(())
}

fn switching_mode(i: &mut Interface, rest: &str) -> Result<(), LineError> {
    i.trunk = rest.trim() == "trunk";
    Ok(())
}

// ── Resource ─────────────────────────────────────────────────────────

#[async_trait]
impl Resource for Interface {
    const KIND: &'static str = "interface";

    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn scope(key: &String) -> String {
        interface_scope(key)
    }

    fn presence(ctx: &DeviceContext, dump: &str) -> Presence {
        classify_with_group(dump, ctx.group_interface_delete.as_deref())
    }

    fn parse(key: &String, dump: &str) -> Result<Self, CoreError> {
        let mut iface = Interface::default();
        if !parse_dump(&<Self as Resource>::label(key), dump, &INTERFACE_TABLE, &mut iface)? {
            return Ok(iface);
        }
        iface.name.clone_from(key);
        Ok(iface)
    }

    fn validate(&self) -> Result<(), CoreError> {
        let (_, unit) = split_unit(&self.resource_label(), &self.name)?;
        match unit {
            Some(_) => self.validate_physical_only()?,
            None if self.vlan_id != 0 => {
                return Err(CoreError::violation(
                    self.resource_label(),
                    "vlan_id",
                    "requires a unit name (<port>.<unit>)",
                ));
            }
            None => {}
        }
        self.validate_lag()?;
        self.validate_families()
    }

    fn compile(&self, ctx: &DeviceContext, resolved: &Resolved) -> Result<DirectiveBatch, CoreError> {
        self.validate()?;
        let mut batch = DirectiveBatch::new();
        {
            let mut s = batch.scoped(interface_scope(&self.name));
            s.set_str("description", &self.description);
            s.set_flag("disable", self.disable);
            s.set_num("mtu", self.mtu);
            s.set_flag("vlan-tagging", self.vlan_tagging);
            s.set_num("native-vlan-id", self.vlan_native);
            {
                let mut switching = s.nested("unit 0 family ethernet-switching");
                switching.set_flag("interface-mode trunk", self.trunk);
                for vlan in &self.vlan_members {
                    switching.set_value("vlan members", vlan);
                }
            }
            if !self.ether802_3ad.is_empty() {
                s.set_value(&format!("{} 802.3ad", ctx.lag_member_options()), &self.ether802_3ad);
            }
            s.set_str("aggregated-ether-options lacp", &self.ae_lacp);
            s.set_str("aggregated-ether-options link-speed", &self.ae_link_speed);
            s.set_num("aggregated-ether-options minimum-links", self.ae_minimum_links);
            s.set_num("vlan-id", self.vlan_id);
            for family in [AddressFamily::Inet, AddressFamily::Inet6] {
                if let Some(view) = self.family(family) {
                    compile_family(&mut s, family, view);
                }
            }
        }
        // A port with nothing under it still has to exist after commit.
        if batch.is_empty() {
            batch.set(interface_scope(&self.name));
        }
        add_memberships(&mut batch, &self.name, &self.security_zone, &self.routing_instance);
        if let Some(count) = resolved.aggregated_count {
            batch.push(count.directive());
        }
        Ok(batch)
    }

    fn compile_delete(
        &self,
        ctx: &DeviceContext,
        resolved: &Resolved,
    ) -> Result<DirectiveBatch, CoreError> {
        if resolved.is_update_remove() && !self.is_unit() {
            return Ok(self.compile_owned_removal(ctx));
        }
        let scope = interface_scope(&self.name);
        let mut batch = DirectiveBatch::new();
        batch.delete(&scope);
        if resolved.hardware_present {
            let mut s = batch.scoped(&scope);
            match &ctx.group_interface_delete {
                Some(group) => s.set_value("apply-groups", group),
                None => {
                    s.set_value("description", PLACEHOLDER_DESCRIPTION);
                    s.set("disable");
                }
            }
        }
        remove_memberships(&mut batch, &self.name, &self.security_zone, &self.routing_instance);
        if let Some(count) = resolved.aggregated_count {
            batch.push(count.directive());
        }
        Ok(batch)
    }

    async fn enrich(&mut self, reader: &mut Reader<'_>) -> Result<(), CoreError> {
        let (zone, instance) = find_memberships(reader, &self.name).await?;
        self.security_zone = zone;
        self.routing_instance = instance;
        Ok(())
    }

    async fn resolve(&self, reader: &mut Reader<'_>, phase: Phase) -> Result<Resolved, CoreError> {
        let mut resolved = Resolved::for_phase(phase);
        if self.is_unit() {
            return Ok(resolved);
        }
        let is_ae = ae_index(&self.name).is_some();
        match phase {
            Phase::Create | Phase::UpdateAdd => {
                let scan = reader.query(INTERFACES_SCAN).await?;
                let was_member = member_parent(&scan, &self.name).is_some();
                if !self.ether802_3ad.is_empty() || was_member {
                    let parent = Some(self.ether802_3ad.as_str()).filter(|p| !p.is_empty());
                    resolved.aggregated_count =
                        Some(aggregated_device_count(&scan, &self.name, parent));
                }
            }
            Phase::Delete => {
                if is_ae || !self.ether802_3ad.is_empty() {
                    let scan = reader.query(INTERFACES_SCAN).await?;
                    resolved.aggregated_count =
                        Some(aggregated_device_count(&scan, &self.name, None));
                }
                if !is_ae {
                    resolved.hardware_present = reader.interface_present(&self.name).await?;
                }
            }
            Phase::UpdateRemove => {}
        }
        Ok(resolved)
    }
}

// ── Shared interface helpers ─────────────────────────────────────────

/// Split `ge-0/0/0.100` into its port and unit.
pub(crate) fn split_unit<'a>(
    resource: &str,
    name: &'a str,
) -> Result<(&'a str, Option<u32>), CoreError> {
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(CoreError::violation(resource, "name", "must be a non-empty interface name"));
    }
    match name.split_once('.') {
        None => Ok((name, None)),
        Some((port, unit)) => {
            let unit = unit.parse::<u32>().map_err(|_| {
                CoreError::violation(resource, "name", "unit suffix must be a number")
            })?;
            if port.is_empty() {
                return Err(CoreError::violation(resource, "name", "missing port before the unit"));
            }
            Ok((port, Some(unit)))
        }
    }
}

/// `interfaces <port>` or `interfaces <port> unit <n>`.
pub(crate) fn interface_scope(name: &str) -> String {
    match name.split_once('.') {
        Some((port, unit)) => format!("interfaces {port} unit {unit}"),
        None => format!("interfaces {name}"),
    }
}

/// The LAG a port currently belongs to, from an `interfaces` scan.
fn member_parent(scan: &str, port: &str) -> Option<String> {
    strip_envelope(scan)?.into_iter().find_map(|line| {
        let rest = strip_token_prefix(line.strip_prefix("set ")?, port)?;
        strip_token_prefix(rest, "ether-options 802.3ad")
            .or_else(|| strip_token_prefix(rest, "gigether-options 802.3ad"))
            .map(unquote)
    })
}

pub(crate) fn add_memberships(batch: &mut DirectiveBatch, name: &str, zone: &str, instance: &str) {
    if !zone.is_empty() {
        batch.set(format!("security zones security-zone {zone} interfaces {name}"));
    }
    if !instance.is_empty() {
        batch.set(format!("routing-instances {instance} interface {name}"));
    }
}

pub(crate) fn remove_memberships(
    batch: &mut DirectiveBatch,
    name: &str,
    zone: &str,
    instance: &str,
) {
    if !zone.is_empty() {
        batch.delete(format!("security zones security-zone {zone} interfaces {name}"));
    }
    if !instance.is_empty() {
        batch.delete(format!("routing-instances {instance} interface {name}"));
    }
}

/// Security zone and routing instance an interface is bound to.
pub(crate) async fn find_memberships(
    reader: &mut Reader<'_>,
    name: &str,
) -> Result<(String, String), CoreError> {
    let zone = if matches!(reader.context().platform, PlatformFamily::Srx) {
        let dump = reader.dump("security zones").await?;
        zone_of(&dump, name)
    } else {
        None
    };
    let dump = reader.dump("routing-instances").await?;
    let instance = routing_instance_of(&dump, name);
    Ok((zone.unwrap_or_default(), instance.unwrap_or_default()))
}

/// Zone whose `interfaces` list names `interface`, from a relative dump of
/// `security zones`.
pub(crate) fn zone_of(dump: &str, interface: &str) -> Option<String> {
    strip_envelope(dump)?.into_iter().find_map(|line| {
        let rest = line.strip_prefix("set security-zone ")?;
        let (zone, tail) = rest.split_once(' ')?;
        let bound = strip_token_prefix(tail, "interfaces")?;
        let (bound, _) = bound.split_once(' ').unwrap_or((bound, ""));
        (bound == interface).then(|| unquote(zone))
    })
}

/// Routing instance listing `interface`, from a relative dump of
/// `routing-instances`.
pub(crate) fn routing_instance_of(dump: &str, interface: &str) -> Option<String> {
    strip_envelope(dump)?.into_iter().find_map(|line| {
        let rest = line.strip_prefix("set ")?;
        let (instance, tail) = rest.split_once(' ')?;
        let bound = strip_token_prefix(tail, "interface")?;
        (bound.trim() == interface).then(|| unquote(instance))
    })
}
