// Junos REST RPC transport

mod channel;
mod client;
pub mod reply;

pub use channel::RestConnector;
pub use client::RestClient;
