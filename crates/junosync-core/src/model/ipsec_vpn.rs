// ── IPsec VPN ──
//
// A route-based VPN binds to an `st0` unit. With `bind_interface_auto` the
// unit is allocated from the device's current `st0` usage while the lock
// and the read guard are both held; an update keeps the unit the VPN is
// already bound to. On delete an auto-created unit (one that carries
// nothing but `family inet`) is released together with the VPN.

use std::sync::LazyLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::allocator::{SlotMap, TUNNEL_SCAN, TunnelUnit, next_tunnel_unit, tunnel_unit_of};
use crate::context::DeviceContext;
use crate::directive::DirectiveBatch;
use crate::error::CoreError;
use crate::parse::{
    Action, LineError, LineTable, find_or_push, parse_dump, split_first, strip_envelope,
    strip_token_prefix, unquote,
};
use crate::resource::{Phase, Resolved, Resource};
use crate::session::Reader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpsecVpn {
    pub name: String,
    pub bind_interface: String,
    pub bind_interface_auto: bool,
    pub df_bit: String,
    pub establish_tunnels: String,
    pub ike: Option<IpsecIke>,
    pub vpn_monitor: Option<VpnMonitor>,
    pub traffic_selector: Vec<TrafficSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpsecIke {
    pub gateway: String,
    pub policy: String,
    pub identity_local: String,
    pub identity_remote: String,
    pub identity_service: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnMonitor {
    pub destination_ip: String,
    pub optimized: bool,
    pub source_interface: String,
    /// Use the VPN's own bind interface as the monitor source.
    pub source_interface_auto: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficSelector {
    pub name: String,
    pub local_ip: String,
    pub remote_ip: String,
}

impl IpsecVpn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn ike_mut(&mut self) -> &mut IpsecIke {
        self.ike.get_or_insert_with(IpsecIke::default)
    }

    fn monitor_mut(&mut self) -> &mut VpnMonitor {
        self.vpn_monitor.get_or_insert_with(VpnMonitor::default)
    }

    /// Interface the compiled VPN binds to.
    fn effective_bind(&self, resolved: &Resolved) -> Result<String, CoreError> {
        if !self.bind_interface_auto {
            return Ok(self.bind_interface.clone());
        }
        resolved
            .tunnel_unit
            .map(TunnelUnit::interface_name)
            .ok_or_else(|| {
                CoreError::Internal(format!("no st0 unit allocated for ipsec_vpn {}", self.name))
            })
    }
}

// ── Parser ───────────────────────────────────────────────────────────

static VPN_TABLE: LazyLock<LineTable<IpsecVpn>> = LazyLock::new(|| {
    LineTable::new(vec![
        ("bind-interface", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.bind_interface = unquote(rest);
            Ok(())
        })),
        ("df-bit", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.df_bit = unquote(rest);
            Ok(())
        })),
        ("establish-tunnels", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.establish_tunnels = unquote(rest);
            Ok(())
        })),
        ("ike gateway", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.ike_mut().gateway = unquote(rest);
            Ok(())
        })),
        ("ike ipsec-policy", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.ike_mut().policy = unquote(rest);
            Ok(())
        })),
        ("ike proxy-identity local", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.ike_mut().identity_local = unquote(rest);
            Ok(())
        })),
        ("ike proxy-identity remote", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.ike_mut().identity_remote = unquote(rest);
            Ok(())
        })),
        ("ike proxy-identity service", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.ike_mut().identity_service = unquote(rest);
            Ok(())
        })),
        ("vpn-monitor", Action::Apply(|v: &mut IpsecVpn, _: &str| {
            v.monitor_mut();
            Ok(())
        })),
        ("vpn-monitor destination-ip", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.monitor_mut().destination_ip = unquote(rest);
            Ok(())
        })),
        ("vpn-monitor optimized", Action::Apply(|v: &mut IpsecVpn, _: &str| {
            v.monitor_mut().optimized = true;
            Ok(())
        })),
        ("vpn-monitor source-interface", Action::Apply(|v: &mut IpsecVpn, rest: &str| {
            v.monitor_mut().source_interface = unquote(rest);
            Ok(())
        })),
        ("traffic-selector", Action::Apply(traffic_selector)),
    ])
});

fn traffic_selector(vpn: &mut IpsecVpn, rest: &str) -> Result<(), LineError> {
    let (name, tail) = split_first(rest);
    if name.is_empty() {
        return Err(LineError::new("missing traffic selector name"));
    }
    let selector = find_or_push(&mut vpn.traffic_selector, |t| t.name == name, || {
        TrafficSelector {
            name: name.clone(),
            ..TrafficSelector::default()
        }
    });
    if let Some(ip) = strip_token_prefix(tail, "local-ip") {
        selector.local_ip = unquote(ip);
    } else if let Some(ip) = strip_token_prefix(tail, "remote-ip") {
        selector.remote_ip = unquote(ip);
    }
    Ok(())
}

/// `true` if a relative dump of one `st0` unit is exactly what an automatic
/// binding creates.
fn is_auto_unit(dump: &str) -> bool {
    matches!(strip_envelope(dump).as_deref(), Some(["set family inet"]))
}

// ── Resource ─────────────────────────────────────────────────────────

#[async_trait]
impl Resource for IpsecVpn {
    const KIND: &'static str = "ipsec_vpn";

    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn scope(key: &String) -> String {
        format!("security ipsec vpn {key}")
    }

    fn parse(key: &String, dump: &str) -> Result<Self, CoreError> {
        let mut vpn = IpsecVpn::default();
        if parse_dump(&Self::label(key), dump, &VPN_TABLE, &mut vpn)? {
            vpn.name.clone_from(key);
        }
        Ok(vpn)
    }

    fn validate(&self) -> Result<(), CoreError> {
        let label = Self::label(&self.name);
        if self.name.is_empty() || self.name.contains(char::is_whitespace) {
            return Err(CoreError::violation(label, "name", "must be a single non-empty word"));
        }
        if self.ike.as_ref().is_none_or(|ike| ike.gateway.is_empty()) {
            return Err(CoreError::violation(label, "ike", "an IKE gateway is required"));
        }
        if self.bind_interface_auto && !self.bind_interface.is_empty() {
            return Err(CoreError::ConflictingOptions {
                resource: label,
                fields: "bind_interface and bind_interface_auto".into(),
            });
        }
        if !self.bind_interface.is_empty() && !self.bind_interface.starts_with("st0.") {
            return Err(CoreError::violation(label, "bind_interface", "must be an st0 unit"));
        }
        if !self.df_bit.is_empty() && !matches!(self.df_bit.as_str(), "clear" | "copy" | "set") {
            return Err(CoreError::violation(label, "df_bit", "must be clear, copy or set"));
        }
        if !self.establish_tunnels.is_empty()
            && !matches!(self.establish_tunnels.as_str(), "immediately" | "on-traffic")
        {
            return Err(CoreError::violation(
                label,
                "establish_tunnels",
                "must be immediately or on-traffic",
            ));
        }
        if let Some(monitor) = &self.vpn_monitor {
            if monitor.source_interface_auto && !monitor.source_interface.is_empty() {
                return Err(CoreError::ConflictingOptions {
                    resource: label,
                    fields: "vpn_monitor.source_interface and vpn_monitor.source_interface_auto"
                        .into(),
                });
            }
            if monitor.source_interface_auto
                && self.bind_interface.is_empty()
                && !self.bind_interface_auto
            {
                return Err(CoreError::violation(
                    label,
                    "vpn_monitor.source_interface_auto",
                    "requires a bind interface",
                ));
            }
        }
        if self.traffic_selector.iter().any(|t| {
            t.name.is_empty() || t.local_ip.is_empty() || t.remote_ip.is_empty()
        }) {
            return Err(CoreError::violation(
                label,
                "traffic_selector",
                "needs a name, a local-ip and a remote-ip",
            ));
        }
        Ok(())
    }

    fn compile(&self, _ctx: &DeviceContext, resolved: &Resolved) -> Result<DirectiveBatch, CoreError> {
        self.validate()?;
        let bind = self.effective_bind(resolved)?;
        let mut batch = DirectiveBatch::new();
        if let Some(unit) = resolved.tunnel_unit.filter(|_| self.bind_interface_auto) {
            if unit.reclaim {
                batch.delete(format!("interfaces st0 unit {}", unit.unit));
            }
            batch.set(format!("interfaces st0 unit {} family inet", unit.unit));
        }
        let mut s = batch.scoped(Self::scope(&self.name));
        s.set_str("bind-interface", &bind);
        s.set_str("df-bit", &self.df_bit);
        s.set_str("establish-tunnels", &self.establish_tunnels);
        if let Some(ike) = &self.ike {
            let mut i = s.nested("ike");
            i.set_str("gateway", &ike.gateway);
            i.set_str("ipsec-policy", &ike.policy);
            i.set_str("proxy-identity local", &ike.identity_local);
            i.set_str("proxy-identity remote", &ike.identity_remote);
            i.set_str("proxy-identity service", &ike.identity_service);
        }
        if let Some(monitor) = &self.vpn_monitor {
            let mut m = s.nested("vpn-monitor");
            m.set("");
            m.set_str("destination-ip", &monitor.destination_ip);
            m.set_flag("optimized", monitor.optimized);
            if monitor.source_interface_auto {
                m.set_str("source-interface", &bind);
            } else {
                m.set_str("source-interface", &monitor.source_interface);
            }
        }
        for selector in &self.traffic_selector {
            let mut t = s.nested(format!("traffic-selector {}", selector.name));
            t.set_value("local-ip", &selector.local_ip);
            t.set_value("remote-ip", &selector.remote_ip);
        }
        Ok(batch)
    }

    fn compile_delete(
        &self,
        _ctx: &DeviceContext,
        resolved: &Resolved,
    ) -> Result<DirectiveBatch, CoreError> {
        let mut batch = DirectiveBatch::new();
        batch.delete(Self::scope(&self.name));
        if let Some(unit) = resolved.release_tunnel_unit {
            batch.delete(format!("interfaces st0 unit {unit}"));
        }
        Ok(batch)
    }

    async fn resolve(&self, reader: &mut Reader<'_>, phase: Phase) -> Result<Resolved, CoreError> {
        let mut resolved = Resolved::for_phase(phase);
        match phase {
            Phase::Create | Phase::UpdateAdd if self.bind_interface_auto => {
                if phase == Phase::UpdateAdd {
                    let current = reader.dump(&Self::scope(&self.name)).await?;
                    let bound = Self::parse(&self.name, &current)?;
                    if let Some(unit) = tunnel_unit_of(&bound.bind_interface) {
                        resolved.tunnel_unit = Some(TunnelUnit { unit, reclaim: false });
                        return Ok(resolved);
                    }
                }
                let slots = SlotMap::from_dump(&reader.query(TUNNEL_SCAN).await?)?;
                resolved.tunnel_unit =
                    Some(next_tunnel_unit(&slots, reader.context().tunnel_unit_strategy)?);
            }
            Phase::Delete => {
                if let Some(unit) = tunnel_unit_of(&self.bind_interface) {
                    let dump = reader.dump(&format!("interfaces st0 unit {unit}")).await?;
                    if is_auto_unit(&dump) {
                        resolved.release_tunnel_unit = Some(unit);
                    }
                }
            }
            _ => {}
        }
        Ok(resolved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn vpn() -> IpsecVpn {
        let mut vpn = IpsecVpn::new("to-branch");
        vpn.ike = Some(IpsecIke {
            gateway: "gw-branch".into(),
            policy: "ipsec-pol".into(),
            ..IpsecIke::default()
        });
        vpn.establish_tunnels = "immediately".into();
        vpn
    }

    #[test]
    fn auto_binding_claims_the_resolved_unit() {
        let mut auto = vpn();
        auto.bind_interface_auto = true;
        auto.vpn_monitor = Some(VpnMonitor {
            source_interface_auto: true,
            ..VpnMonitor::default()
        });
        let resolved = Resolved {
            tunnel_unit: Some(TunnelUnit { unit: 1, reclaim: true }),
            ..Resolved::default()
        };
        let batch = auto.compile(&DeviceContext::default(), &resolved).unwrap();
        assert_eq!(
            batch.to_lines(),
            vec![
                "delete interfaces st0 unit 1",
                "set interfaces st0 unit 1 family inet",
                "set security ipsec vpn to-branch bind-interface st0.1",
                "set security ipsec vpn to-branch establish-tunnels immediately",
                "set security ipsec vpn to-branch ike gateway gw-branch",
                "set security ipsec vpn to-branch ike ipsec-policy ipsec-pol",
                "set security ipsec vpn to-branch vpn-monitor",
                "set security ipsec vpn to-branch vpn-monitor source-interface st0.1",
            ]
        );
    }

    #[test]
    fn auto_binding_without_allocation_is_internal_error() {
        let mut auto = vpn();
        auto.bind_interface_auto = true;
        let err = auto.compile(&DeviceContext::default(), &Resolved::default()).unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[test]
    fn conflicting_bindings() {
        let mut both = vpn();
        both.bind_interface = "st0.4".into();
        both.bind_interface_auto = true;
        assert!(matches!(both.validate().unwrap_err(), CoreError::ConflictingOptions { .. }));

        let no_gateway = IpsecVpn::new("x");
        assert!(matches!(
            no_gateway.validate().unwrap_err(),
            CoreError::StructuralConstraintViolation { field, .. } if field == "ike"
        ));
    }

    #[test]
    fn delete_releases_auto_unit() {
        let mut bound = vpn();
        bound.bind_interface = "st0.3".into();
        let resolved = Resolved {
            release_tunnel_unit: Some(3),
            ..Resolved::default()
        };
        assert_eq!(
            bound.compile_delete(&DeviceContext::default(), &resolved).unwrap().to_lines(),
            vec!["delete security ipsec vpn to-branch", "delete interfaces st0 unit 3"]
        );
        assert!(is_auto_unit("<configuration-output>\nset family inet\n</configuration-output>"));
        assert!(!is_auto_unit("set family inet\nset description tunnel"));
    }

    #[test]
    fn parse_round_trip() {
        let mut original = vpn();
        original.bind_interface = "st0.7".into();
        original.df_bit = "clear".into();
        original.traffic_selector = vec![TrafficSelector {
            name: "ts1".into(),
            local_ip: "10.0.0.0/24".into(),
            remote_ip: "10.9.0.0/24".into(),
        }];
        original.vpn_monitor = Some(VpnMonitor {
            destination_ip: "10.9.0.1".into(),
            optimized: true,
            ..VpnMonitor::default()
        });
        let batch = original.compile(&DeviceContext::default(), &Resolved::default()).unwrap();
        let dump: Vec<String> = batch
            .to_lines()
            .iter()
            .map(|l| l.replacen("set security ipsec vpn to-branch", "set", 1))
            .collect();
        assert_eq!(IpsecVpn::parse(&"to-branch".to_owned(), &dump.join("\n")).unwrap(), original);
    }
}
