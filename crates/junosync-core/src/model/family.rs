// ── Address families ──
//
// `family inet` / `family inet6` blocks are shared by physical and logical
// interfaces: addresses, each owning VRRP groups, each owning tracking
// clauses. This module holds the types, the parser handlers (generic over
// the host description) and the compiler for one family block.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::directive::Scoped;
use crate::error::CoreError;
use crate::parse::{
    Action, LineError, LineTable, find_or_push, parse_int, push_unique, split_first,
    strip_token_prefix, unquote,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AddressFamily {
    Inet,
    Inet6,
}

impl AddressFamily {
    fn vrrp_keyword(self) -> &'static str {
        match self {
            Self::Inet => "vrrp-group",
            Self::Inet6 => "vrrp-inet6-group",
        }
    }

    fn virtual_address_keyword(self) -> &'static str {
        match self {
            Self::Inet => "virtual-address",
            Self::Inet6 => "virtual-inet6-address",
        }
    }
}

// ── Types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyOptions {
    pub mtu: u32,
    pub filter_input: String,
    pub filter_output: String,
    pub address: Vec<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub cidr: String,
    pub preferred: bool,
    pub primary: bool,
    pub vrrp_group: Vec<VrrpGroup>,
}

impl Address {
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VrrpGroup {
    pub identifier: u32,
    pub virtual_address: Vec<String>,
    pub accept_data: bool,
    pub no_accept_data: bool,
    pub preempt: bool,
    pub no_preempt: bool,
    pub priority: u32,
    pub advertisements_threshold: u32,
    pub track_interface: Vec<TrackInterface>,
    pub track_route: Vec<TrackRoute>,
    pub family: VrrpFamily,
}

impl VrrpGroup {
    pub fn new(identifier: u32, family: VrrpFamily) -> Self {
        Self {
            identifier,
            family,
            ..Self::default()
        }
    }
}

/// The statements that exist only for one address family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VrrpFamily {
    Inet {
        #[serde(default)]
        advertise_interval: u32,
        #[serde(default)]
        authentication_key: String,
        #[serde(default)]
        authentication_type: String,
    },
    Inet6 {
        #[serde(default)]
        virtual_link_local_address: String,
        #[serde(default)]
        inet6_advertise_interval: u32,
    },
}

impl VrrpFamily {
    pub fn inet() -> Self {
        Self::Inet {
            advertise_interval: 0,
            authentication_key: String::new(),
            authentication_type: String::new(),
        }
    }

    pub fn inet6() -> Self {
        Self::Inet6 {
            virtual_link_local_address: String::new(),
            inet6_advertise_interval: 0,
        }
    }

    fn address_family(&self) -> AddressFamily {
        match self {
            Self::Inet { .. } => AddressFamily::Inet,
            Self::Inet6 { .. } => AddressFamily::Inet6,
        }
    }
}

impl Default for VrrpFamily {
    fn default() -> Self {
        Self::inet()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackInterface {
    pub interface: String,
    pub priority_cost: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRoute {
    pub route: String,
    pub routing_instance: String,
    pub priority_cost: u32,
}

// ── Host access ──────────────────────────────────────────────────────

/// Borrowed view of one enabled family block.
#[derive(Debug, Clone, Copy)]
pub struct FamilyRef<'a> {
    pub mtu: u32,
    pub filter_input: &'a str,
    pub filter_output: &'a str,
    pub address: &'a [Address],
}

/// Mutable access to one family block; obtaining it enables the family.
pub struct FamilyMut<'a> {
    pub mtu: &'a mut u32,
    pub filter_input: &'a mut String,
    pub filter_output: &'a mut String,
    pub address: &'a mut Vec<Address>,
}

impl FamilyOptions {
    pub fn view(&self) -> FamilyRef<'_> {
        FamilyRef {
            mtu: self.mtu,
            filter_input: &self.filter_input,
            filter_output: &self.filter_output,
            address: &self.address,
        }
    }

    pub fn view_mut(&mut self) -> FamilyMut<'_> {
        FamilyMut {
            mtu: &mut self.mtu,
            filter_input: &mut self.filter_input,
            filter_output: &mut self.filter_output,
            address: &mut self.address,
        }
    }
}

/// A description that carries family blocks.
pub trait FamilyHost {
    fn family(&self, family: AddressFamily) -> Option<FamilyRef<'_>>;
    fn family_mut(&mut self, family: AddressFamily) -> FamilyMut<'_>;
}

// ── Parser ───────────────────────────────────────────────────────────

/// Table entries for both family blocks of a host description.
pub fn family_entries<T: FamilyHost + 'static>() -> Vec<(&'static str, Action<T>)> {
    vec![
        ("family inet", Action::Apply(enable::<T, false>)),
        ("family inet mtu", Action::Apply(mtu::<T, false>)),
        ("family inet filter input", Action::Apply(filter_input::<T, false>)),
        ("family inet filter output", Action::Apply(filter_output::<T, false>)),
        ("family inet address", Action::Apply(address::<T, false>)),
        ("family inet6", Action::Apply(enable::<T, true>)),
        ("family inet6 mtu", Action::Apply(mtu::<T, true>)),
        ("family inet6 filter input", Action::Apply(filter_input::<T, true>)),
        ("family inet6 filter output", Action::Apply(filter_output::<T, true>)),
        ("family inet6 address", Action::Apply(address::<T, true>)),
    ]
}

fn family_of(v6: bool) -> AddressFamily {
    if v6 {
        AddressFamily::Inet6
    } else {
        AddressFamily::Inet
    }
}

fn enable<T: FamilyHost, const V6: bool>(host: &mut T, _: &str) -> Result<(), LineError> {
    host.family_mut(family_of(V6));
    Ok(())
}

fn mtu<T: FamilyHost, const V6: bool>(host: &mut T, rest: &str) -> Result<(), LineError> {
    *host.family_mut(family_of(V6)).mtu = parse_int(rest)?;
    Ok(())
}

fn filter_input<T: FamilyHost, const V6: bool>(host: &mut T, rest: &str) -> Result<(), LineError> {
    *host.family_mut(family_of(V6)).filter_input = unquote(rest);
    Ok(())
}

fn filter_output<T: FamilyHost, const V6: bool>(host: &mut T, rest: &str) -> Result<(), LineError> {
    *host.family_mut(family_of(V6)).filter_output = unquote(rest);
    Ok(())
}

fn address<T: FamilyHost, const V6: bool>(host: &mut T, rest: &str) -> Result<(), LineError> {
    merge_address(host.family_mut(family_of(V6)).address, rest)
}

/// Merge one `address <cidr> ...` line into an address list.
pub fn merge_address(list: &mut Vec<Address>, rest: &str) -> Result<(), LineError> {
    let (cidr, tail) = split_first(rest);
    if cidr.is_empty() {
        return Err(LineError::new("missing address"));
    }
    let addr = find_or_push(list, |a| a.cidr == cidr, || Address::new(cidr.clone()));
    ADDRESS_TABLE.dispatch(addr, tail)?;
    Ok(())
}

static ADDRESS_TABLE: LazyLock<LineTable<Address>> = LazyLock::new(|| {
    LineTable::new(vec![
        ("preferred", Action::Apply(|a: &mut Address, _: &str| {
            a.preferred = true;
            Ok(())
        })),
        ("primary", Action::Apply(|a: &mut Address, _: &str| {
            a.primary = true;
            Ok(())
        })),
        ("vrrp-group", Action::Apply(|a: &mut Address, rest: &str| {
            merge_vrrp(a, rest, VrrpFamily::inet)
        })),
        ("vrrp-inet6-group", Action::Apply(|a: &mut Address, rest: &str| {
            merge_vrrp(a, rest, VrrpFamily::inet6)
        })),
    ])
});

fn merge_vrrp(addr: &mut Address, rest: &str, family: fn() -> VrrpFamily) -> Result<(), LineError> {
    let (id, tail) = split_first(rest);
    let id: u32 = parse_int(&id)?;
    let group = find_or_push(
        &mut addr.vrrp_group,
        |g| g.identifier == id,
        || VrrpGroup::new(id, family()),
    );
    VRRP_TABLE.dispatch(group, tail)?;
    Ok(())
}

static VRRP_TABLE: LazyLock<LineTable<VrrpGroup>> = LazyLock::new(|| {
    LineTable::new(vec![
        ("virtual-address", Action::Apply(virtual_address)),
        ("virtual-inet6-address", Action::Apply(virtual_address)),
        ("virtual-link-local-address", Action::Apply(|g: &mut VrrpGroup, rest: &str| {
            if let VrrpFamily::Inet6 { virtual_link_local_address, .. } = &mut g.family {
                *virtual_link_local_address = unquote(rest);
            }
            Ok(())
        })),
        ("accept-data", Action::Apply(|g: &mut VrrpGroup, _: &str| {
            g.accept_data = true;
            Ok(())
        })),
        ("no-accept-data", Action::Apply(|g: &mut VrrpGroup, _: &str| {
            g.no_accept_data = true;
            Ok(())
        })),
        ("preempt", Action::Apply(|g: &mut VrrpGroup, _: &str| {
            g.preempt = true;
            Ok(())
        })),
        ("no-preempt", Action::Apply(|g: &mut VrrpGroup, _: &str| {
            g.no_preempt = true;
            Ok(())
        })),
        ("priority", Action::Apply(|g: &mut VrrpGroup, rest: &str| {
            g.priority = parse_int(rest)?;
            Ok(())
        })),
        ("advertisements-threshold", Action::Apply(|g: &mut VrrpGroup, rest: &str| {
            g.advertisements_threshold = parse_int(rest)?;
            Ok(())
        })),
        ("advertise-interval", Action::Apply(|g: &mut VrrpGroup, rest: &str| {
            if let VrrpFamily::Inet { advertise_interval, .. } = &mut g.family {
                *advertise_interval = parse_int(rest)?;
            }
            Ok(())
        })),
        ("inet6-advertise-interval", Action::Apply(|g: &mut VrrpGroup, rest: &str| {
            if let VrrpFamily::Inet6 { inet6_advertise_interval, .. } = &mut g.family {
                *inet6_advertise_interval = parse_int(rest)?;
            }
            Ok(())
        })),
        ("authentication-key", Action::Apply(|g: &mut VrrpGroup, rest: &str| {
            if let VrrpFamily::Inet { authentication_key, .. } = &mut g.family {
                *authentication_key = unquote(rest);
            }
            Ok(())
        })),
        ("authentication-type", Action::Apply(|g: &mut VrrpGroup, rest: &str| {
            if let VrrpFamily::Inet { authentication_type, .. } = &mut g.family {
                *authentication_type = unquote(rest);
            }
            Ok(())
        })),
        ("track interface", Action::Apply(track_interface)),
        ("track route", Action::Apply(track_route)),
    ])
});

fn virtual_address(group: &mut VrrpGroup, rest: &str) -> Result<(), LineError> {
    push_unique(&mut group.virtual_address, unquote(rest));
    Ok(())
}

fn track_interface(group: &mut VrrpGroup, rest: &str) -> Result<(), LineError> {
    let (name, tail) = split_first(rest);
    let track = find_or_push(
        &mut group.track_interface,
        |t| t.interface == name,
        || TrackInterface {
            interface: name.clone(),
            priority_cost: 0,
        },
    );
    if let Some(cost) = strip_token_prefix(tail, "priority-cost") {
        track.priority_cost = parse_int(cost)?;
    }
    Ok(())
}

fn track_route(group: &mut VrrpGroup, rest: &str) -> Result<(), LineError> {
    let (route, tail) = split_first(rest);
    let mut routing_instance = String::new();
    let mut priority_cost = 0;
    let mut tokens = tail.split_whitespace();
    while let Some(keyword) = tokens.next() {
        let value = tokens
            .next()
            .ok_or_else(|| LineError::new(format!("missing value after {keyword}")))?;
        match keyword {
            "routing-instance" => routing_instance = unquote(value),
            "priority-cost" => priority_cost = parse_int(value)?,
            _ => {}
        }
    }
    let track = find_or_push(
        &mut group.track_route,
        |t| t.route == route && t.routing_instance == routing_instance,
        || TrackRoute {
            route: route.clone(),
            routing_instance: routing_instance.clone(),
            priority_cost: 0,
        },
    );
    if priority_cost != 0 {
        track.priority_cost = priority_cost;
    }
    Ok(())
}

// ── Validation ───────────────────────────────────────────────────────

/// Structural checks on one family block. Conflicts are reported before
/// anything is compiled.
pub fn validate_family(
    resource: &str,
    family: AddressFamily,
    view: FamilyRef<'_>,
) -> Result<(), CoreError> {
    for addr in view.address {
        if addr.cidr.is_empty() {
            return Err(CoreError::violation(resource, format!("{family}_address"), "address must not be empty"));
        }
        for group in &addr.vrrp_group {
            if group.family.address_family() != family {
                return Err(CoreError::violation(
                    resource,
                    "vrrp_group",
                    format!(
                        "group {} on {} carries {} options",
                        group.identifier,
                        addr.cidr,
                        group.family.address_family()
                    ),
                ));
            }
            if group.preempt && group.no_preempt {
                return Err(CoreError::ConflictingOptions {
                    resource: resource.to_owned(),
                    fields: format!("preempt and no_preempt in vrrp group {}", group.identifier),
                });
            }
            if group.accept_data && group.no_accept_data {
                return Err(CoreError::ConflictingOptions {
                    resource: resource.to_owned(),
                    fields: format!(
                        "accept_data and no_accept_data in vrrp group {}",
                        group.identifier
                    ),
                });
            }
            if group.track_route.iter().any(|t| t.route.is_empty()) {
                return Err(CoreError::violation(resource, "track_route", "route must not be empty"));
            }
            if group.track_interface.iter().any(|t| t.interface.is_empty()) {
                return Err(CoreError::violation(
                    resource,
                    "track_interface",
                    "interface must not be empty",
                ));
            }
        }
    }
    Ok(())
}

// ── Compiler ─────────────────────────────────────────────────────────

/// Emit one family block under `scope`, parents before the statements
/// that qualify them.
pub fn compile_family(scope: &mut Scoped<'_>, family: AddressFamily, view: FamilyRef<'_>) {
    let mut block = scope.nested(format!("family {family}"));
    block.set("");
    block.set_num("mtu", view.mtu);
    block.set_str("filter input", view.filter_input);
    block.set_str("filter output", view.filter_output);
    for addr in view.address {
        let mut a = block.nested(format!("address {}", addr.cidr));
        a.set("");
        a.set_flag("preferred", addr.preferred);
        a.set_flag("primary", addr.primary);
        for group in &addr.vrrp_group {
            compile_vrrp(&mut a, family, group);
        }
    }
}

fn compile_vrrp(address: &mut Scoped<'_>, family: AddressFamily, group: &VrrpGroup) {
    let mut g = address.nested(format!("{} {}", family.vrrp_keyword(), group.identifier));
    g.set("");
    for va in &group.virtual_address {
        g.set_value(family.virtual_address_keyword(), va);
    }
    match &group.family {
        VrrpFamily::Inet {
            advertise_interval,
            authentication_key,
            authentication_type,
        } => {
            g.set_num("advertise-interval", *advertise_interval);
            g.set_str("authentication-key", authentication_key);
            g.set_str("authentication-type", authentication_type);
        }
        VrrpFamily::Inet6 {
            virtual_link_local_address,
            inet6_advertise_interval,
        } => {
            g.set_str("virtual-link-local-address", virtual_link_local_address);
            g.set_num("inet6-advertise-interval", *inet6_advertise_interval);
        }
    }
    g.set_flag("accept-data", group.accept_data);
    g.set_flag("no-accept-data", group.no_accept_data);
    g.set_flag("preempt", group.preempt);
    g.set_flag("no-preempt", group.no_preempt);
    g.set_num("priority", group.priority);
    g.set_num("advertisements-threshold", group.advertisements_threshold);
    for track in &group.track_interface {
        if track.priority_cost == 0 {
            g.set(format!("track interface {}", track.interface));
        } else {
            g.set(format!(
                "track interface {} priority-cost {}",
                track.interface, track.priority_cost
            ));
        }
    }
    for track in &group.track_route {
        let mut line = format!("track route {}", track.route);
        if !track.routing_instance.is_empty() {
            line.push_str(&format!(" routing-instance {}", track.routing_instance));
        }
        if track.priority_cost != 0 {
            line.push_str(&format!(" priority-cost {}", track.priority_cost));
        }
        g.set(line);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::directive::DirectiveBatch;

    #[derive(Debug, Default, PartialEq)]
    struct Host {
        inet: Option<FamilyOptions>,
        inet6: Option<FamilyOptions>,
    }

    impl FamilyHost for Host {
        fn family(&self, family: AddressFamily) -> Option<FamilyRef<'_>> {
            match family {
                AddressFamily::Inet => self.inet.as_ref().map(FamilyOptions::view),
                AddressFamily::Inet6 => self.inet6.as_ref().map(FamilyOptions::view),
            }
        }

        fn family_mut(&mut self, family: AddressFamily) -> FamilyMut<'_> {
            match family {
                AddressFamily::Inet => self.inet.get_or_insert_with(Default::default).view_mut(),
                AddressFamily::Inet6 => self.inet6.get_or_insert_with(Default::default).view_mut(),
            }
        }
    }

    fn table() -> LineTable<Host> {
        LineTable::new(family_entries::<Host>())
    }

    #[test]
    fn vrrp_lines_merge_into_one_group() {
        let t = table();
        let mut host = Host::default();
        for line in [
            "family inet address 192.0.2.2/24 vrrp-group 10 virtual-address 192.0.2.1",
            "family inet address 192.0.2.2/24 vrrp-group 10 priority 150",
            "family inet address 192.0.2.2/24 vrrp-group 10 preempt",
            "family inet address 192.0.2.2/24 vrrp-group 10 track interface ge-0/0/3 priority-cost 20",
            "family inet address 192.0.2.2/24 vrrp-group 10 track route 0.0.0.0/0 routing-instance default priority-cost 30",
            "family inet address 192.0.2.2/24 vrrp-group 10 authentication-type md5",
            "family inet address 192.0.2.3/24 primary",
        ] {
            assert!(t.dispatch(&mut host, line).unwrap());
        }
        let inet = host.inet.unwrap();
        assert_eq!(inet.address.len(), 2);
        let group = &inet.address[0].vrrp_group[0];
        assert_eq!(group.identifier, 10);
        assert_eq!(group.virtual_address, vec!["192.0.2.1"]);
        assert_eq!(group.priority, 150);
        assert!(group.preempt);
        assert_eq!(group.track_interface[0].priority_cost, 20);
        assert_eq!(group.track_route[0].routing_instance, "default");
        assert_eq!(group.track_route[0].priority_cost, 30);
        assert!(matches!(&group.family, VrrpFamily::Inet { authentication_type, .. } if authentication_type == "md5"));
        assert!(inet.address[1].primary);
        assert!(host.inet6.is_none());
    }

    #[test]
    fn inet6_group_variant() {
        let t = table();
        let mut host = Host::default();
        t.dispatch(
            &mut host,
            "family inet6 address 2001:db8::2/64 vrrp-inet6-group 4 virtual-link-local-address fe80::1",
        )
        .unwrap();
        let group = &host.inet6.unwrap().address[0].vrrp_group[0];
        assert_eq!(
            group.family,
            VrrpFamily::Inet6 {
                virtual_link_local_address: "fe80::1".into(),
                inet6_advertise_interval: 0,
            }
        );
    }

    #[test]
    fn conflicting_preempt_is_rejected() {
        let mut group = VrrpGroup::new(1, VrrpFamily::inet());
        group.preempt = true;
        group.no_preempt = true;
        let mut addr = Address::new("10.0.0.2/24");
        addr.vrrp_group.push(group);
        let opts = FamilyOptions {
            address: vec![addr],
            ..FamilyOptions::default()
        };
        let err = validate_family("interface ge-0/0/0", AddressFamily::Inet, opts.view()).unwrap_err();
        assert!(matches!(err, CoreError::ConflictingOptions { .. }));
    }

    #[test]
    fn family_mismatch_is_rejected() {
        let mut addr = Address::new("2001:db8::2/64");
        addr.vrrp_group.push(VrrpGroup::new(1, VrrpFamily::inet()));
        let opts = FamilyOptions {
            address: vec![addr],
            ..FamilyOptions::default()
        };
        let err = validate_family("interface ge-0/0/0", AddressFamily::Inet6, opts.view()).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn compile_then_parse_reproduces_block() {
        let mut group = VrrpGroup::new(3, VrrpFamily::inet());
        group.virtual_address = vec!["10.0.0.1".into()];
        group.no_preempt = true;
        group.track_route = vec![TrackRoute {
            route: "0.0.0.0/0".into(),
            routing_instance: "default".into(),
            priority_cost: 10,
        }];
        let mut addr = Address::new("10.0.0.2/24");
        addr.preferred = true;
        addr.vrrp_group.push(group);
        let original = Host {
            inet: Some(FamilyOptions {
                mtu: 1500,
                filter_input: "protect-re".into(),
                filter_output: String::new(),
                address: vec![addr],
            }),
            inet6: None,
        };

        let mut batch = DirectiveBatch::new();
        {
            let mut scope = batch.scoped("interfaces ge-0/0/0 unit 0");
            compile_family(&mut scope, AddressFamily::Inet, original.family(AddressFamily::Inet).unwrap());
        }
        let t = table();
        let mut parsed = Host::default();
        for line in batch.to_lines() {
            let rel = line.strip_prefix("set interfaces ge-0/0/0 unit 0 ").unwrap();
            t.dispatch(&mut parsed, rel).unwrap();
        }
        assert_eq!(parsed, original);
    }
}
