#![allow(clippy::unwrap_used)]

// End-to-end resource operations against the in-memory device.

use std::time::Duration;

use junosync_api::{FailPoint, MemoryChannel};
use junosync_core::model::{
    Address, AddressBook, BookAddress, BookAddressSet, FamilyOptions, IpsecIke, LogicalInterface,
    OspfInterface,
};
use junosync_core::{
    AuthCredentials, CoreError, Device, DeviceConfig, Interface, IpsecVpn, OspfArea, OspfAreaKey,
    PlanAction, SecurityZone,
};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use url::Url;

fn config() -> DeviceConfig {
    let mut config = DeviceConfig::new(
        Url::parse("https://fw1.example.net:3443").unwrap(),
        AuthCredentials {
            username: "netops".into(),
            password: SecretString::from("s3cret".to_owned()),
        },
    );
    config.command_delay = Duration::ZERO;
    config
}

fn device(channel: &MemoryChannel) -> Device {
    Device::in_memory(config(), channel.clone())
}

fn lan_unit() -> Interface {
    let mut unit = Interface::new("ge-0/0/1.0");
    unit.description = "lan".into();
    unit.inet = true;
    unit.inet_address = vec![Address::new("192.168.1.1/24")];
    unit.security_zone = "trust".into();
    unit
}

fn corp_book() -> AddressBook {
    let mut book = AddressBook::new("corp");
    book.description = "office ranges".into();
    book.network_address = vec![
        BookAddress {
            name: "web".into(),
            value: "10.0.0.5/32".into(),
            ..BookAddress::default()
        },
        BookAddress {
            name: "db".into(),
            value: "10.0.0.6/32".into(),
            description: "primary".into(),
        },
    ];
    book.address_set = vec![BookAddressSet {
        name: "servers".into(),
        address: vec!["web".into(), "db".into()],
        ..BookAddressSet::default()
    }];
    book
}

// ── Create ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_commits_and_reads_back() {
    let dev = MemoryChannel::default()
        .with_physical_interfaces(["ge-0/0/1"])
        .with_active(["set security zones security-zone trust"]);
    let created = device(&dev).create(&lan_unit()).await.unwrap();

    assert_eq!(created, lan_unit());
    assert_eq!(dev.commit_count(), 1);
    assert_eq!(dev.unlock_count(), 1);
    assert!(!dev.is_locked());
    assert!(
        dev.active()
            .contains(&"set security zones security-zone trust interfaces ge-0/0/1.0".to_owned())
    );
}

#[tokio::test]
async fn create_over_configured_object_fails_and_releases_lock() {
    let dev = MemoryChannel::default().with_active(["set interfaces ge-0/0/1 unit 0 description taken"]);
    let err = device(&dev).create(&lan_unit()).await.unwrap_err();

    assert!(matches!(err, CoreError::AlreadyExists { .. }));
    assert_eq!(dev.commit_count(), 0);
    assert_eq!(dev.unlock_count(), 1);
    assert_eq!(dev.discard_count(), 1);
}

#[tokio::test]
async fn create_clears_placeholder_first() {
    let dev = MemoryChannel::default()
        .with_physical_interfaces(["ge-0/0/2"])
        .with_active([
            "set interfaces ge-0/0/2 description NC",
            "set interfaces ge-0/0/2 disable",
        ]);
    let mut port = Interface::new("ge-0/0/2");
    port.description = "server".into();
    port.mtu = 9000;
    device(&dev).create(&port).await.unwrap();

    assert_eq!(dev.applied()[0], "delete interfaces ge-0/0/2");
    assert_eq!(
        dev.active(),
        vec![
            "set interfaces ge-0/0/2 description server",
            "set interfaces ge-0/0/2 mtu 9000",
        ]
    );
}

#[tokio::test]
async fn bare_port_replaces_the_placeholder_and_stays_configured() {
    let dev = MemoryChannel::default()
        .with_physical_interfaces(["ge-0/0/5"])
        .with_active([
            "set interfaces ge-0/0/5 description NC",
            "set interfaces ge-0/0/5 disable",
        ]);
    let device = device(&dev);
    let created = device.create(&Interface::new("ge-0/0/5")).await.unwrap();

    assert_eq!(created, Interface::new("ge-0/0/5"));
    assert_eq!(dev.active(), vec!["set interfaces ge-0/0/5"]);
    assert!(device.exists::<Interface>(&"ge-0/0/5".to_owned()).await.unwrap());
}

#[tokio::test]
async fn placeholder_shaped_create_is_a_divergence() {
    let dev = MemoryChannel::default().with_physical_interfaces(["ge-0/0/6"]);
    let mut port = Interface::new("ge-0/0/6");
    port.description = "NC".into();
    port.disable = true;
    let err = device(&dev).create(&port).await.unwrap_err();

    assert!(
        matches!(err, CoreError::PostCommitDivergence { ref resource, .. } if resource == "interface ge-0/0/6"),
        "{err:?}"
    );
    assert_eq!(dev.commit_count(), 1);
    assert!(!dev.is_locked());
}

#[tokio::test]
async fn recreate_after_delete_matches_a_single_create() {
    let once = MemoryChannel::default().with_active(["set security zones security-zone trust"]);
    device(&once).create(&corp_book()).await.unwrap();

    let twice = MemoryChannel::default().with_active(["set security zones security-zone trust"]);
    let device = device(&twice);
    device.create(&corp_book()).await.unwrap();
    device.delete::<AddressBook>(&"corp".to_owned()).await.unwrap();
    assert_eq!(twice.active(), vec!["set security zones security-zone trust"]);
    let recreated = device.create(&corp_book()).await.unwrap();

    assert_eq!(recreated, corp_book());
    assert_eq!(twice.active(), once.active());
    assert_eq!(
        device.read::<AddressBook>(&"corp".to_owned()).await.unwrap(),
        Device::in_memory(config(), once.clone())
            .read::<AddressBook>(&"corp".to_owned())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn facts_failure_closes_the_session() {
    let dev = MemoryChannel::default();
    dev.fail_at(FailPoint::Facts);
    let err = device(&dev)
        .read::<SecurityZone>(&"trust".to_owned())
        .await
        .unwrap_err();

    assert!(!err.is_input_error());
    assert_eq!(dev.close_count(), 1);
    assert_eq!(dev.unlock_count(), 0);
}

#[tokio::test]
async fn input_errors_never_take_the_lock() {
    let dev = MemoryChannel::default();
    let mut bad = Interface::new("ge-0/0/0");
    bad.vlan_id = 12;
    let err = device(&dev).create(&bad).await.unwrap_err();

    assert!(err.is_input_error());
    assert_eq!(dev.unlock_count(), 0);
    assert!(dev.applied().is_empty());
}

#[tokio::test]
async fn failed_validation_rolls_back() {
    let dev = MemoryChannel::default().with_active(["set security zones security-zone trust"]);
    dev.fail_at(FailPoint::Validate);
    let err = device(&dev).create(&SecurityZone::new("dmz")).await.unwrap_err();

    assert!(matches!(err, CoreError::ValidationFailed { .. }));
    assert_eq!(dev.active(), vec!["set security zones security-zone trust"]);
    assert_eq!(dev.candidate(), dev.active());
    assert_eq!(dev.unlock_count(), 1);
    assert_eq!(dev.discard_count(), 1);
}

#[tokio::test]
async fn commit_comment_is_attached() {
    let dev = MemoryChannel::default();
    let mut config = config();
    config.commit_comment = Some("managed by junosync".into());
    Device::in_memory(config, dev.clone())
        .create(&SecurityZone::new("guest"))
        .await
        .unwrap();
    assert_eq!(dev.last_commit_comment().as_deref(), Some("managed by junosync"));
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn address_book_lifecycle() {
    let dev = MemoryChannel::default();
    let device = device(&dev);
    let key = "corp".to_owned();

    let created = device.create(&corp_book()).await.unwrap();
    assert_eq!(created, corp_book());
    assert!(
        dev.active()
            .contains(&"set security address-book corp address-set servers address db".to_owned())
    );
    assert_eq!(device.read::<AddressBook>(&key).await.unwrap(), Some(corp_book()));

    let mut desired = corp_book();
    desired.network_address.truncate(1);
    desired.address_set[0].address = vec!["web".into()];
    let updated = device.update(&desired).await.unwrap();
    assert_eq!(updated, desired);
    assert!(!dev.active().iter().any(|l| l.contains("10.0.0.6/32")));

    device.delete::<AddressBook>(&key).await.unwrap();
    assert!(dev.active().is_empty());
    assert_eq!(device.read::<AddressBook>(&key).await.unwrap(), None);
    assert_eq!(dev.commit_count(), 3);
}

#[tokio::test]
async fn logical_interface_lifecycle() {
    let dev = MemoryChannel::default().with_active(["set routing-instances guest instance-type virtual-router"]);
    let device = device(&dev);
    let key = "ge-0/0/4.10".to_owned();
    let mut unit = LogicalInterface::new(key.clone());
    unit.vlan_id = 10;
    unit.family_inet = Some(FamilyOptions {
        address: vec![Address::new("172.16.10.1/24")],
        ..FamilyOptions::default()
    });
    unit.routing_instance = "guest".into();

    let created = device.create(&unit).await.unwrap();
    assert_eq!(created, unit);
    assert!(
        dev.active()
            .contains(&"set routing-instances guest interface ge-0/0/4.10".to_owned())
    );

    let mut desired = unit.clone();
    desired.description = "guest wifi".into();
    desired.family_inet = Some(FamilyOptions {
        address: vec![Address::new("172.16.20.1/24")],
        ..FamilyOptions::default()
    });
    let updated = device.update(&desired).await.unwrap();
    assert_eq!(updated, desired);
    assert!(!dev.active().iter().any(|l| l.contains("172.16.10.1/24")));

    device.delete::<LogicalInterface>(&key).await.unwrap();
    assert_eq!(dev.active(), vec!["set routing-instances guest instance-type virtual-router"]);
    assert!(!device.exists::<LogicalInterface>(&key).await.unwrap());
}

// ── Delete ──────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_hardware_port_leaves_a_placeholder() {
    let dev = MemoryChannel::default()
        .with_physical_interfaces(["ge-0/0/3"])
        .with_active([
            "set interfaces ge-0/0/3 description db",
            "set interfaces ge-0/0/3 mtu 9000",
        ]);
    let device = device(&dev);
    device.delete::<Interface>(&"ge-0/0/3".to_owned()).await.unwrap();

    assert_eq!(
        dev.active(),
        vec![
            "set interfaces ge-0/0/3 description NC",
            "set interfaces ge-0/0/3 disable",
        ]
    );
    assert!(!device.exists::<Interface>(&"ge-0/0/3".to_owned()).await.unwrap());
    assert_eq!(device.read::<Interface>(&"ge-0/0/3".to_owned()).await.unwrap(), None);
}

#[tokio::test]
async fn delete_group_replaces_the_placeholder_pair() {
    let dev = MemoryChannel::default()
        .with_physical_interfaces(["ge-0/0/3"])
        .with_active(["set interfaces ge-0/0/3 description db"]);
    let mut config = config();
    config.group_interface_delete = Some("disabled-ports".into());
    let device = Device::in_memory(config, dev.clone());
    device.delete::<Interface>(&"ge-0/0/3".to_owned()).await.unwrap();

    assert_eq!(dev.active(), vec!["set interfaces ge-0/0/3 apply-groups disabled-ports"]);
    assert!(!device.exists::<Interface>(&"ge-0/0/3".to_owned()).await.unwrap());
}

#[tokio::test]
async fn deleting_a_missing_object_is_not_found() {
    let dev = MemoryChannel::default();
    let err = device(&dev)
        .delete::<SecurityZone>(&"nowhere".to_owned())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::NotFound { .. }));
    assert_eq!(dev.commit_count(), 0);
    assert_eq!(dev.unlock_count(), 1);
}

#[tokio::test]
async fn import_of_missing_object_is_not_found() {
    let dev = MemoryChannel::default();
    let err = device(&dev)
        .import::<IpsecVpn>(&"to-hq".to_owned())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { resource } if resource == "ipsec_vpn to-hq"));
}

// ── Allocation ──────────────────────────────────────────────────────

#[tokio::test]
async fn lag_membership_tracks_the_device_count() {
    let dev = MemoryChannel::default().with_active([
        "set interfaces ge-0/0/0 ether-options 802.3ad ae0",
        "set interfaces ae0 aggregated-ether-options lacp active",
        "set chassis aggregated-devices ethernet device-count 1",
    ]);
    let device = device(&dev);
    let mut member = Interface::new("ge-0/0/5");
    member.ether802_3ad = "ae3".into();
    device.create(&member).await.unwrap();
    assert!(
        dev.active()
            .contains(&"set chassis aggregated-devices ethernet device-count 4".to_owned())
    );

    device.delete::<Interface>(&"ge-0/0/5".to_owned()).await.unwrap();
    let active = dev.active();
    assert!(active.contains(&"set chassis aggregated-devices ethernet device-count 1".to_owned()));
    assert!(!active.iter().any(|l| l.starts_with("set interfaces ge-0/0/5")));
}

#[tokio::test]
async fn auto_bound_vpn_reclaims_a_placeholder_unit_and_releases_it() {
    let dev = MemoryChannel::default().with_active([
        "set interfaces st0 unit 0 family inet",
        "set interfaces st0 unit 0 description hq",
        "set interfaces st0 unit 1 description NC",
        "set interfaces st0 unit 1 disable",
    ]);
    let device = device(&dev);
    let mut vpn = IpsecVpn::new("to-branch");
    vpn.bind_interface_auto = true;
    vpn.ike = Some(IpsecIke {
        gateway: "gw-branch".into(),
        ..IpsecIke::default()
    });

    let created = device.create(&vpn).await.unwrap();
    assert_eq!(created.bind_interface, "st0.1");
    assert_eq!(
        dev.applied()[..2],
        ["delete interfaces st0 unit 1", "set interfaces st0 unit 1 family inet"]
    );

    device.delete::<IpsecVpn>(&"to-branch".to_owned()).await.unwrap();
    let active = dev.active();
    assert!(!active.iter().any(|l| l.starts_with("set interfaces st0 unit 1")));
    assert!(active.contains(&"set interfaces st0 unit 0 description hq".to_owned()));
}

// ── Update / plan ───────────────────────────────────────────────────

#[tokio::test]
async fn zone_update_keeps_interface_bindings() {
    let dev = MemoryChannel::default().with_active([
        "set security zones security-zone dmz host-inbound-traffic system-services ping",
        "set security zones security-zone dmz interfaces ge-0/0/1.0",
    ]);
    let mut desired = SecurityZone::new("dmz");
    desired.inbound_services = vec!["ssh".into()];
    let updated = device(&dev).update(&desired).await.unwrap();

    assert_eq!(updated, desired);
    let active = dev.active();
    assert!(active.contains(&"set security zones security-zone dmz interfaces ge-0/0/1.0".to_owned()));
    assert!(!active.iter().any(|l| l.ends_with("system-services ping")));
}

#[tokio::test]
async fn update_of_missing_object_is_not_found() {
    let dev = MemoryChannel::default();
    let err = device(&dev).update(&SecurityZone::new("dmz")).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn plan_reads_without_locking() {
    let dev = MemoryChannel::default().with_active(["set protocols ospf area 0.0.0.0 interface lo0.0 passive"]);
    let device = device(&dev);
    let area = OspfArea {
        area_id: "0".into(),
        interface: vec![OspfInterface {
            name: "ge-0/0/0.0".into(),
            ..OspfInterface::default()
        }],
        ..OspfArea::default()
    };
    let plan = device.plan(&area).await.unwrap();

    assert_eq!(plan.action, PlanAction::Update);
    assert_eq!(
        plan.batch.to_lines(),
        vec![
            "delete protocols ospf area 0.0.0.0",
            "set protocols ospf area 0.0.0.0",
            "set protocols ospf area 0.0.0.0 interface ge-0/0/0.0",
        ]
    );
    assert_eq!(dev.unlock_count(), 0);
    assert!(dev.applied().is_empty());
}

#[tokio::test]
async fn ospf_area_in_routing_instance_round_trips() {
    let dev = MemoryChannel::default();
    let device = device(&dev);
    let area = OspfArea {
        area_id: "0.0.0.1".into(),
        routing_instance: "blue".into(),
        interface: vec![OspfInterface {
            name: "ge-0/0/4.0".into(),
            metric: 20,
            ..OspfInterface::default()
        }],
        ..OspfArea::default()
    };
    device.create(&area).await.unwrap();
    let key: OspfAreaKey = "0.0.0.1_-_v2_-_blue".parse().unwrap();
    let imported = device.import::<OspfArea>(&key).await.unwrap();
    assert_eq!(imported, area);
}

// ── Concurrency ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_operations_serialize_on_the_lock() {
    let dev = MemoryChannel::default();
    let a = device(&dev);
    let b = a.clone();
    let left_zone = SecurityZone::new("left");
    let right_zone = SecurityZone::new("right");
    let (left, right) = tokio::join!(a.create(&left_zone), b.create(&right_zone));
    left.unwrap();
    right.unwrap();
    assert_eq!(dev.commit_count(), 2);
    assert_eq!(dev.unlock_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_waiting_for_the_lock() {
    let dev = MemoryChannel::default();
    dev.hold_lock_for(u32::MAX);
    let device = device(&dev);
    let waiter = {
        let device = device.clone();
        tokio::spawn(async move { device.create(&SecurityZone::new("late")).await })
    };
    tokio::time::sleep(Duration::from_secs(35)).await;
    device.cancel();
    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));
}
