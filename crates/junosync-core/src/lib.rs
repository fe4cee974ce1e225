// junosync-core: Configuration synchronization engine between resource
// descriptions and a Junos device's set-form configuration.

pub mod allocator;
pub mod classify;
pub mod config;
pub mod context;
pub mod device;
pub mod directive;
pub mod error;
pub mod guard;
pub mod model;
pub mod parse;
pub mod resource;
pub mod session;
pub mod transaction;

// ── Primary re-exports ──────────────────────────────────────────────
pub use allocator::TunnelUnitStrategy;
pub use classify::Presence;
pub use config::{AuthCredentials, DeviceConfig, TlsVerification};
pub use context::DeviceContext;
pub use device::{Device, Plan, PlanAction};
pub use directive::{Directive, DirectiveBatch, Verb};
pub use error::CoreError;
pub use guard::{ReadGuard, WriteGuard};
pub use resource::{Phase, Resolved, Resource};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AddressBook, AnyResource, Interface, IpsecVpn, LogicalInterface, OspfArea, OspfAreaKey,
    ResourceKind, SecurityZone,
};
