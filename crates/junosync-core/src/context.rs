// ── Per-session device context ──

use junosync_api::{DeviceFacts, PlatformFamily};

use crate::allocator::TunnelUnitStrategy;
use crate::config::DeviceConfig;

/// Capabilities and policy the compiler consults, derived once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContext {
    pub platform: PlatformFamily,
    pub model: String,
    pub version: String,
    pub group_interface_delete: Option<String>,
    pub tunnel_unit_strategy: TunnelUnitStrategy,
}

impl DeviceContext {
    pub fn new(facts: &DeviceFacts, config: &DeviceConfig) -> Self {
        Self {
            platform: facts.platform,
            model: facts.model.clone(),
            version: facts.version.clone(),
            group_interface_delete: config.group_interface_delete.clone(),
            tunnel_unit_strategy: config.tunnel_unit_strategy,
        }
    }

    /// Context for a platform with default policy.
    pub fn for_platform(platform: PlatformFamily) -> Self {
        Self {
            platform,
            model: String::new(),
            version: String::new(),
            group_interface_delete: None,
            tunnel_unit_strategy: TunnelUnitStrategy::default(),
        }
    }

    pub fn with_delete_group(mut self, group: impl Into<String>) -> Self {
        self.group_interface_delete = Some(group.into());
        self
    }

    pub fn with_tunnel_unit_strategy(mut self, strategy: TunnelUnitStrategy) -> Self {
        self.tunnel_unit_strategy = strategy;
        self
    }

    /// Statement carrying LAG membership on a member port.
    pub fn lag_member_options(&self) -> &'static str {
        match self.platform {
            PlatformFamily::Mx => "gigether-options",
            _ => "ether-options",
        }
    }
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self::for_platform(PlatformFamily::Srx)
    }
}
