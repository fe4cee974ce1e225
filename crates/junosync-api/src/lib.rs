// junosync-api: remote command channel for Junos devices
//
// Two implementations of the same `CommandChannel` contract: a REST RPC
// client for real devices and an in-memory device for offline planning
// and tests.

pub mod auth;
pub mod channel;
pub mod error;
pub mod memory;
pub mod rest;
pub mod transport;

pub use auth::{ApiFlavor, Credentials};
pub use channel::{CommandChannel, Connector, DeviceFacts, PlatformFamily};
pub use error::Error;
pub use memory::{FailPoint, MemoryChannel};
pub use rest::{RestClient, RestConnector};
pub use transport::{TlsMode, TransportConfig};
