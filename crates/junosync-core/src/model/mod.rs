// ── Resource descriptions ──
//
// Plain data for every resource family the engine manages. Fields left at
// their zero value (empty string, 0, false, empty list) are not
// configured. `AnyResource` is the tagged form used by file input.

pub mod address_book;
pub mod family;
pub mod interface;
pub mod ipsec_vpn;
pub mod logical_interface;
pub mod ospf_area;
pub mod security_zone;

// ── Re-exports ──────────────────────────────────────────────────────

pub use address_book::{AddressBook, BookAddress, BookAddressSet, RangeAddress};
pub use family::{
    Address, AddressFamily, FamilyOptions, TrackInterface, TrackRoute, VrrpFamily, VrrpGroup,
};
pub use interface::Interface;
pub use ipsec_vpn::{IpsecIke, IpsecVpn, TrafficSelector, VpnMonitor};
pub use logical_interface::LogicalInterface;
pub use ospf_area::{AreaType, OspfArea, OspfAreaKey, OspfInterface, OspfVersion};
pub use security_zone::{SecurityZone, ZoneAddress, ZoneAddressSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::resource::Resource;

/// The managed resource families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Interface,
    LogicalInterface,
    SecurityZone,
    AddressBook,
    OspfArea,
    IpsecVpn,
}

/// A description of any kind, tagged with its kind.
///
/// ```yaml
/// kind: security_zone
/// spec:
///   name: dmz
///   inbound_services: [ping]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "snake_case")]
pub enum AnyResource {
    Interface(Interface),
    LogicalInterface(LogicalInterface),
    SecurityZone(SecurityZone),
    AddressBook(AddressBook),
    OspfArea(OspfArea),
    IpsecVpn(IpsecVpn),
}

impl AnyResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Interface(_) => ResourceKind::Interface,
            Self::LogicalInterface(_) => ResourceKind::LogicalInterface,
            Self::SecurityZone(_) => ResourceKind::SecurityZone,
            Self::AddressBook(_) => ResourceKind::AddressBook,
            Self::OspfArea(_) => ResourceKind::OspfArea,
            Self::IpsecVpn(_) => ResourceKind::IpsecVpn,
        }
    }

    /// `<kind> <identifier>`, as used in logs and errors.
    pub fn label(&self) -> String {
        match self {
            Self::Interface(r) => Interface::label(&r.key()),
            Self::LogicalInterface(r) => LogicalInterface::label(&r.key()),
            Self::SecurityZone(r) => SecurityZone::label(&r.key()),
            Self::AddressBook(r) => AddressBook::label(&r.key()),
            Self::OspfArea(r) => OspfArea::label(&r.key()),
            Self::IpsecVpn(r) => IpsecVpn::label(&r.key()),
        }
    }
}

macro_rules! impl_from_resource {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for AnyResource {
                fn from(resource: $variant) -> Self {
                    Self::$variant(resource)
                }
            }
        )*
    };
}

impl_from_resource!(
    Interface,
    LogicalInterface,
    SecurityZone,
    AddressBook,
    OspfArea,
    IpsecVpn,
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tagged_yaml_input() {
        let yaml = "
kind: ipsec_vpn
spec:
  name: to-hq
  bind_interface_auto: true
  ike:
    gateway: gw-hq
";
        let resource: AnyResource = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(resource.kind(), ResourceKind::IpsecVpn);
        assert_eq!(resource.label(), "ipsec_vpn to-hq");
        let AnyResource::IpsecVpn(vpn) = resource else {
            panic!("wrong kind");
        };
        assert!(vpn.bind_interface_auto);
        assert_eq!(vpn.ike.unwrap().gateway, "gw-hq");
    }

    #[test]
    fn vrrp_family_defaults_to_inet() {
        let json = r#"{"kind":"interface","spec":{"name":"ge-0/0/0.0","inet":true,
            "inet_address":[{"cidr":"10.0.0.2/24","vrrp_group":[{"identifier":1,"priority":200}]}]}}"#;
        let AnyResource::Interface(iface) = serde_json::from_str(json).unwrap() else {
            panic!("wrong kind");
        };
        let group = &iface.inet_address[0].vrrp_group[0];
        assert_eq!(group.family, VrrpFamily::inet());
        assert_eq!(group.priority, 200);
    }

    #[test]
    fn kind_names() {
        assert_eq!(ResourceKind::OspfArea.to_string(), "ospf_area");
        assert_eq!("logical_interface".parse::<ResourceKind>().unwrap(), ResourceKind::LogicalInterface);
    }
}
