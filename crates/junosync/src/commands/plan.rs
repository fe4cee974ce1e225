//! `plan`: show the directives an apply would send.
//!
//! Online plans read the live device without taking the configuration
//! lock. With `--dump`, the device is an in-memory copy seeded from a
//! saved `show configuration | display set`, so nothing is contacted.

use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use junosync_api::{DeviceFacts, MemoryChannel};
use junosync_core::{AnyResource, AuthCredentials, Device, DeviceConfig};

use crate::cli::{GlobalOpts, PlanArgs};
use crate::commands::resource::with_resource;
use crate::commands::util;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct PlanView {
    resource: String,
    action: String,
    directives: Vec<String>,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Directives")]
    directives: String,
}

fn row(v: &PlanView) -> PlanRow {
    PlanRow {
        resource: v.resource.clone(),
        action: v.action.clone(),
        directives: v.directives.join("\n"),
    }
}

fn plain(view: &PlanView) -> String {
    let mut out = format!("# {} {}", view.action, view.resource);
    for line in &view.directives {
        out.push('\n');
        out.push_str(line);
    }
    out
}

/// Device backed by a saved configuration dump.
pub fn offline_device(dump: &str, model: &str, physical: &[String]) -> Result<Device, CliError> {
    let url: url::Url = "memory://offline".parse().map_err(|_| CliError::Validation {
        field: "dump".into(),
        reason: "cannot build offline device address".into(),
    })?;
    let mut cfg = DeviceConfig::new(
        url,
        AuthCredentials {
            username: "offline".into(),
            password: SecretString::from(String::new()),
        },
    );
    cfg.command_delay = Duration::ZERO;

    let channel = MemoryChannel::new(DeviceFacts::new("offline", model, ""))
        .with_physical_interfaces(physical.iter().cloned())
        .with_display_set(dump);
    Ok(Device::in_memory(cfg, channel))
}

pub async fn handle(args: PlanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let text = util::read_input(&args.file)?;
    let descriptions = util::parse_descriptions(&text)?;

    let device = match args.dump {
        Some(ref path) => {
            let dump = util::read_input(path)?;
            offline_device(&dump, &args.model, &args.physical)?
        }
        None => Device::new(config::resolve_device_config(global)?),
    };

    let mut views = Vec::with_capacity(descriptions.len());
    for description in descriptions {
        let resource = description.label();
        let plan = with_resource!(description, r => device.plan(&r).await?);
        views.push(PlanView {
            resource,
            action: plan.action.to_string(),
            directives: plan.batch.to_lines(),
        });
    }

    let out = output::render_list(&global.output, &views, row, plain)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use junosync_core::SecurityZone;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn offline_plan_sees_the_dump() {
        let dump = "<configuration-output>\n\
                    set security zones security-zone dmz host-inbound-traffic system-services ping\n\
                    </configuration-output>";
        let device = offline_device(dump, "vsrx", &[]).unwrap();

        let mut zone = SecurityZone::new("dmz");
        zone.inbound_services = vec!["ssh".into()];
        let plan = device.plan(&zone).await.unwrap();

        assert_eq!(plan.action.to_string(), "update");
        assert_eq!(
            plan.batch.to_lines(),
            [
                "delete security zones security-zone dmz host-inbound-traffic",
                "set security zones security-zone dmz",
                "set security zones security-zone dmz host-inbound-traffic system-services ssh",
            ]
        );
    }

    #[test]
    fn plain_output_is_commented_by_resource() {
        let view = PlanView {
            resource: "security_zone dmz".into(),
            action: "create".into(),
            directives: vec!["set security zones security-zone dmz".into()],
        };
        assert_eq!(
            plain(&view),
            "# create security_zone dmz\nset security zones security-zone dmz"
        );
    }
}
