#![allow(clippy::unwrap_used)]

// Device operations over the REST transport against a scripted device.

use std::sync::Mutex;
use std::time::Duration;

use junosync_core::{AuthCredentials, Device, DeviceConfig, SecurityZone};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const FACTS: &str = "<software-information><host-name>fw1</host-name><product-model>srx345</product-model><junos-version>23.4R1.9</junos-version></software-information>";
const OK: &str = "<rpc-reply><ok/></rpc-reply>";

/// Answers facts, remembers committed zones and shows them back.
#[derive(Default)]
struct Firewall {
    zones: Mutex<Vec<String>>,
}

impl Respond for Firewall {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        let reply = if body.contains("<get-software-information/>") {
            FACTS.to_owned()
        } else if body.contains("<commit-configuration/>") {
            if let Some(zone) = zone_named(&body) {
                self.zones.lock().unwrap().push(zone);
            }
            OK.to_owned()
        } else if body.contains("<command") {
            match zone_named(&body) {
                Some(zone) if self.zones.lock().unwrap().contains(&zone) => format!(
                    "<rpc-reply><configuration-output>\nset description {zone}\n</configuration-output></rpc-reply>"
                ),
                _ => OK.to_owned(),
            }
        } else {
            OK.to_owned()
        };
        ResponseTemplate::new(200).set_body_string(reply)
    }
}

fn zone_named(body: &str) -> Option<String> {
    let rest = body.split("security-zone ").nth(1)?;
    rest.split(|c: char| c.is_whitespace() || c == '<')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}

async fn setup() -> (MockServer, Device) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(Firewall::default())
        .mount(&server)
        .await;

    let mut config = DeviceConfig::new(
        Url::parse(&server.uri()).unwrap(),
        AuthCredentials {
            username: "netops".into(),
            password: SecretString::from("s3cret".to_owned()),
        },
    );
    config.command_delay = Duration::ZERO;
    config.timeout = Duration::from_secs(5);
    (server, Device::new(config))
}

fn zone(name: &str) -> SecurityZone {
    let mut zone = SecurityZone::new(name);
    zone.description = name.into();
    zone
}

#[tokio::test]
async fn create_round_trips_over_rest() {
    let (_server, device) = setup().await;
    let created = device.create(&zone("dmz")).await.unwrap();
    assert_eq!(created, zone("dmz"));
    assert!(device.exists::<SecurityZone>(&"dmz".to_owned()).await.unwrap());
}

#[tokio::test]
async fn transactions_on_one_device_never_overlap() {
    let (server, a) = setup().await;
    let b = a.clone();
    let left_zone = zone("left");
    let right_zone = zone("right");
    let (left, right) = tokio::join!(a.create(&left_zone), b.create(&right_zone));
    assert_eq!(left.unwrap(), left_zone);
    assert_eq!(right.unwrap(), right_zone);

    // The lock step only checks availability, so the order of lock checks
    // and commits is what shows the two writes did not interleave.
    let steps: Vec<&str> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|request| {
            let body = String::from_utf8_lossy(&request.body);
            if body.contains("<lock-configuration/><unlock-configuration/>") {
                Some("lock")
            } else if body.contains("<commit-configuration/>") {
                Some("commit")
            } else {
                None
            }
        })
        .collect();
    assert_eq!(steps, vec!["lock", "commit", "lock", "commit"]);
}
