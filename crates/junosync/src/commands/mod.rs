//! Command handlers, one module per command family.

pub mod config_cmd;
pub mod kinds;
pub mod plan;
pub mod resource;
pub mod util;
