// ── Resource contract ──
//
// A resource kind knows its configuration scope, how to compile a
// description into directives, how to parse a dump back, and which
// device lookups it needs before compiling. `Device` drives the rest.

use std::fmt;

use async_trait::async_trait;
use strum::Display;

use crate::allocator::{DeviceCount, TunnelUnit};
use crate::classify::{Presence, classify};
use crate::context::DeviceContext;
use crate::directive::DirectiveBatch;
use crate::error::CoreError;
use crate::session::Reader;

/// Which half of which operation a batch is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Create,
    Delete,
    /// Removal of the current state inside an update.
    UpdateRemove,
    /// Addition of the desired state inside an update.
    UpdateAdd,
}

/// Device facts looked up under the read guard before compiling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    /// Phase the lookups were made for.
    pub phase: Option<Phase>,
    /// The physical port exists in hardware.
    pub hardware_present: bool,
    /// Recomputed chassis aggregated-device count.
    pub aggregated_count: Option<DeviceCount>,
    /// `st0` unit assigned to an auto-bound tunnel.
    pub tunnel_unit: Option<TunnelUnit>,
    /// `st0` unit to release together with the object.
    pub release_tunnel_unit: Option<u32>,
}

impl Resolved {
    pub fn for_phase(phase: Phase) -> Self {
        Self {
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// `true` while removing the current state ahead of its replacement.
    pub fn is_update_remove(&self) -> bool {
        self.phase == Some(Phase::UpdateRemove)
    }
}

#[async_trait]
pub trait Resource: Clone + fmt::Debug + Send + Sync + Sized {
    /// Kind name used in labels and logs (`interface`, `ipsec_vpn`).
    const KIND: &'static str;

    type Key: Clone + fmt::Display + fmt::Debug + Send + Sync;

    fn key(&self) -> Self::Key;

    /// Hierarchy path owning the object, without a verb.
    fn scope(key: &Self::Key) -> String;

    /// Human label for logs and errors.
    fn label(key: &Self::Key) -> String {
        format!("{} {key}", Self::KIND)
    }

    /// Presence of the object in a relative dump of its scope.
    fn presence(_ctx: &DeviceContext, dump: &str) -> Presence {
        classify(dump)
    }

    /// Rebuild a description from a relative dump of its scope.
    fn parse(key: &Self::Key, dump: &str) -> Result<Self, CoreError>;

    /// Structural checks that need no device state.
    fn validate(&self) -> Result<(), CoreError>;

    fn compile(&self, ctx: &DeviceContext, resolved: &Resolved)
    -> Result<DirectiveBatch, CoreError>;

    fn compile_delete(
        &self,
        ctx: &DeviceContext,
        resolved: &Resolved,
    ) -> Result<DirectiveBatch, CoreError>;

    /// Side lookups outside the object's own scope, run after `parse`.
    async fn enrich(&mut self, _reader: &mut Reader<'_>) -> Result<(), CoreError> {
        Ok(())
    }

    /// Device lookups the compiler needs for `phase`.
    async fn resolve(
        &self,
        _reader: &mut Reader<'_>,
        phase: Phase,
    ) -> Result<Resolved, CoreError> {
        Ok(Resolved::for_phase(phase))
    }
}
