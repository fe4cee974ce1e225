// ── Device session ──
//
// One session per operation: a connected channel, the context derived
// from the device's facts, and a handle on the device's read guard. The
// channel is not reentrant, so every command goes through `&self` methods
// that also apply the settle delay.

use std::sync::Arc;
use std::time::Duration;

use junosync_api::CommandChannel;
use tokio::sync::MutexGuard;
use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::context::DeviceContext;
use crate::error::CoreError;
use crate::guard::ReadGuard;

pub struct Session {
    channel: Arc<dyn CommandChannel>,
    context: DeviceContext,
    guard: ReadGuard,
    command_delay: Duration,
}

impl Session {
    /// Wrap a connected channel, fetching the device's facts. The channel
    /// is closed if that fails.
    pub async fn open(
        channel: Arc<dyn CommandChannel>,
        config: &DeviceConfig,
        guard: ReadGuard,
    ) -> Result<Self, CoreError> {
        let facts = match channel.facts().await {
            Ok(facts) => facts,
            Err(e) => {
                if let Err(close) = channel.close().await {
                    warn!(error = %close, "failed to close session");
                }
                return Err(e.into());
            }
        };
        let context = DeviceContext::new(&facts, config);
        debug!(
            host = %facts.hostname,
            platform = %context.platform,
            "session opened"
        );
        Ok(Self {
            channel,
            context,
            guard,
            command_delay: config.command_delay,
        })
    }

    /// Session over a channel with an explicit context (no facts round-trip).
    pub fn with_context(
        channel: Arc<dyn CommandChannel>,
        context: DeviceContext,
        guard: ReadGuard,
        command_delay: Duration,
    ) -> Self {
        Self {
            channel,
            context,
            guard,
            command_delay,
        }
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    pub(crate) fn channel(&self) -> &dyn CommandChannel {
        self.channel.as_ref()
    }

    /// Enter the read guard.
    pub async fn reader(&self) -> Reader<'_> {
        Reader {
            session: self,
            _permit: self.guard.acquire().await,
        }
    }

    /// Device-side pacing after each remote command.
    pub(crate) async fn settle(&self) {
        if !self.command_delay.is_zero() {
            tokio::time::sleep(self.command_delay).await;
        }
    }

    /// Tear down the channel. Errors are logged, never surfaced.
    pub async fn close(self) {
        if let Err(e) = self.channel.close().await {
            warn!(error = %e, "failed to close session");
        }
        debug!("session closed");
    }
}

/// Read access to the device while holding the read guard.
pub struct Reader<'a> {
    session: &'a Session,
    _permit: MutexGuard<'a, ()>,
}

impl Reader<'_> {
    pub fn context(&self) -> &DeviceContext {
        &self.session.context
    }

    /// Run an inspection command.
    pub async fn query(&mut self, command: &str) -> Result<String, CoreError> {
        debug!(command, "query");
        let out = self.session.channel.query(command).await;
        self.session.settle().await;
        Ok(out?)
    }

    /// Relative set-form dump of a scope.
    pub async fn dump(&mut self, scope: &str) -> Result<String, CoreError> {
        self.query(&format!("show configuration {scope} | display set relative"))
            .await
    }

    /// `true` if the physical port behind `interface` exists in hardware.
    pub async fn interface_present(&mut self, interface: &str) -> Result<bool, CoreError> {
        let physical = interface.split('.').next().unwrap_or(interface);
        let rpc = format!(
            "<get-interface-information><interface-name>{physical}</interface-name><terse/></get-interface-information>"
        );
        debug!(interface = physical, "probe hardware");
        let reply = self.session.channel.query_structured(&rpc).await;
        self.session.settle().await;
        Ok(reply?.contains("<physical-interface"))
    }
}
