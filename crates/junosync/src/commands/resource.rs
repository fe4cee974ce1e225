//! Resource handlers: read, import, exists, apply, delete.
//!
//! The CLI takes the kind at runtime; `with_kind!` and `with_resource!`
//! turn it back into the statically typed `Device` calls.

use std::fmt;
use std::str::FromStr;

use junosync_core::{
    AddressBook, AnyResource, Device, Interface, IpsecVpn, LogicalInterface, OspfArea, Resource,
    ResourceKind, SecurityZone,
};

use crate::cli::{ApplyArgs, GlobalOpts, TargetArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

/// Run `$body` with `$R` aliased to the resource type of `$kind`.
macro_rules! with_kind {
    ($kind:expr, $R:ident => $body:expr) => {
        match $kind {
            ResourceKind::Interface => {
                type $R = Interface;
                $body
            }
            ResourceKind::LogicalInterface => {
                type $R = LogicalInterface;
                $body
            }
            ResourceKind::SecurityZone => {
                type $R = SecurityZone;
                $body
            }
            ResourceKind::AddressBook => {
                type $R = AddressBook;
                $body
            }
            ResourceKind::OspfArea => {
                type $R = OspfArea;
                $body
            }
            ResourceKind::IpsecVpn => {
                type $R = IpsecVpn;
                $body
            }
        }
    };
}

/// Run `$body` with `$r` bound to the typed description inside `$any`.
macro_rules! with_resource {
    ($any:expr, $r:ident => $body:expr) => {
        match $any {
            AnyResource::Interface($r) => $body,
            AnyResource::LogicalInterface($r) => $body,
            AnyResource::SecurityZone($r) => $body,
            AnyResource::AddressBook($r) => $body,
            AnyResource::OspfArea($r) => $body,
            AnyResource::IpsecVpn($r) => $body,
        }
    };
}

pub(crate) use with_resource;

fn parse_key<R>(id: &str) -> Result<R::Key, CliError>
where
    R: Resource,
    R::Key: FromStr,
    <R::Key as FromStr>::Err: fmt::Display,
{
    R::Key::from_str(id).map_err(|e| CliError::Validation {
        field: "id".into(),
        reason: e.to_string(),
    })
}

async fn read_as<R>(device: &Device, id: &str) -> Result<Option<AnyResource>, CliError>
where
    R: Resource + Into<AnyResource>,
    R::Key: FromStr,
    <R::Key as FromStr>::Err: fmt::Display,
{
    let key = parse_key::<R>(id)?;
    Ok(device.read::<R>(&key).await?.map(Into::into))
}

async fn import_as<R>(device: &Device, id: &str) -> Result<AnyResource, CliError>
where
    R: Resource + Into<AnyResource>,
    R::Key: FromStr,
    <R::Key as FromStr>::Err: fmt::Display,
{
    let key = parse_key::<R>(id)?;
    Ok(device.import::<R>(&key).await?.into())
}

async fn exists_as<R>(device: &Device, id: &str) -> Result<bool, CliError>
where
    R: Resource,
    R::Key: FromStr,
    <R::Key as FromStr>::Err: fmt::Display,
{
    let key = parse_key::<R>(id)?;
    Ok(device.exists::<R>(&key).await?)
}

async fn delete_as<R>(device: &Device, id: &str) -> Result<String, CliError>
where
    R: Resource,
    R::Key: FromStr,
    <R::Key as FromStr>::Err: fmt::Display,
{
    let key = parse_key::<R>(id)?;
    device.delete::<R>(&key).await?;
    Ok(R::label(&key))
}

fn render(resource: &AnyResource, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(&global.output, resource, AnyResource::label)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn read(args: TargetArgs, device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    let found = with_kind!(args.kind, R => read_as::<R>(device, &args.id).await?);
    match found {
        Some(resource) => render(&resource, global),
        None => {
            if !global.quiet {
                eprintln!("{} {} is not configured", args.kind, args.id);
            }
            Ok(())
        }
    }
}

pub async fn import(args: TargetArgs, device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    let resource = with_kind!(args.kind, R => import_as::<R>(device, &args.id).await?);
    render(&resource, global)
}

pub async fn exists(args: TargetArgs, device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    let present = with_kind!(args.kind, R => exists_as::<R>(device, &args.id).await?);
    output::print_output(&present.to_string(), global.quiet);
    Ok(())
}

pub async fn delete(args: TargetArgs, device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    let prompt = format!("Delete {} {} and commit?", args.kind, args.id);
    if !util::confirm(&prompt, "delete", global.yes)? {
        return Ok(());
    }
    let label = with_kind!(args.kind, R => delete_as::<R>(device, &args.id).await?);
    if !global.quiet {
        eprintln!("✓ Deleted {label}");
    }
    Ok(())
}

pub async fn apply(args: ApplyArgs, device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    let text = util::read_input(&args.file)?;
    let descriptions = util::parse_descriptions(&text)?;

    let mut applied = Vec::with_capacity(descriptions.len());
    for description in descriptions {
        let label = description.label();
        tracing::debug!(resource = %label, "applying description");
        let result: AnyResource = with_resource!(description, r => {
            let done = if args.mode.create {
                device.create(&r).await?
            } else if args.mode.update {
                device.update(&r).await?
            } else {
                device.apply(&r).await?
            };
            done.into()
        });
        if !global.quiet {
            eprintln!("✓ Applied {label}");
        }
        applied.push(result);
    }

    let out = output::render_single(&global.output, &applied, |list| {
        list.iter()
            .map(AnyResource::label)
            .collect::<Vec<_>>()
            .join("\n")
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
