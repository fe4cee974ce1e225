//! `kinds`: the managed resource families and how to address them.

use serde::Serialize;
use strum::IntoEnumIterator;
use tabled::Tabled;

use junosync_core::ResourceKind;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize, Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Identifier")]
    identifier: &'static str,
    #[tabled(rename = "Configuration scope")]
    scope: &'static str,
}

fn describe(kind: ResourceKind) -> (&'static str, &'static str) {
    match kind {
        ResourceKind::Interface => ("ge-0/0/1, ae0, ge-0/0/1.0", "interfaces <name> [unit <n>]"),
        ResourceKind::LogicalInterface => ("ge-0/0/1.100", "interfaces <port> unit <n>"),
        ResourceKind::SecurityZone => ("trust", "security zones security-zone <name>"),
        ResourceKind::AddressBook => ("global", "security address-book <name>"),
        ResourceKind::OspfArea => (
            "0.0.0.0_-_v2_-_default",
            "[routing-instances <ri>] protocols ospf|ospf3 area <id>",
        ),
        ResourceKind::IpsecVpn => ("to-hq", "security ipsec vpn <name>"),
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let rows: Vec<KindRow> = ResourceKind::iter()
        .map(|kind| {
            let (identifier, scope) = describe(kind);
            KindRow {
                kind: kind.to_string(),
                identifier,
                scope,
            }
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &rows,
        |r| KindRow {
            kind: r.kind.clone(),
            identifier: r.identifier,
            scope: r.scope,
        },
        |r| r.kind.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
