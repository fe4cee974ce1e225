// In-memory device
//
// A `CommandChannel` backed by two line sets (active and candidate) held in
// set-form. It understands the inspection commands the engine issues, the
// interface presence RPC, and the lock/load/validate/commit cycle, with
// optional fault injection at each write step. Used by the offline `plan`
// command and by the test suites.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::channel::{CommandChannel, Connector, DeviceFacts, frame_output};
use crate::error::Error;
use crate::rest::reply;

/// Leaves that hold a single value: setting them replaces the old value.
const SINGLE_VALUED: &[&str] = &[
    "description",
    "mtu",
    "device-count",
    "native-vlan-id",
    "vlan-id",
    "priority",
    "advertise-interval",
    "inet6-advertise-interval",
    "advertisements-threshold",
    "authentication-key",
    "authentication-type",
    "link-speed",
    "minimum-links",
    "interface-mode",
    "port-mode",
    "bind-interface",
    "gateway",
    "ipsec-policy",
    "establish-tunnels",
    "interface-type",
    "metric",
    "hello-interval",
    "dead-interval",
];

/// Step at which an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// The facts round-trip that opens a session.
    Facts,
    Apply,
    Validate,
    Commit,
}

#[derive(Debug, Default)]
struct DeviceState {
    active: Vec<String>,
    candidate: Vec<String>,
    physical: BTreeSet<String>,
    locked: bool,
    busy_polls: u32,
    fail: Option<FailPoint>,
    applied: Vec<String>,
    commits: u32,
    unlocks: u32,
    discards: u32,
    closes: u32,
    last_comment: Option<String>,
}

/// Simulated device. Clones share the same device state.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    facts: DeviceFacts,
    state: Arc<Mutex<DeviceState>>,
    closed: Arc<AtomicBool>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(DeviceFacts::new("memory", "vsrx", "23.4R1"))
    }
}

impl MemoryChannel {
    pub fn new(facts: DeviceFacts) -> Self {
        Self {
            facts,
            state: Arc::new(Mutex::new(DeviceState::default())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register physical ports that exist on the chassis.
    pub fn with_physical_interfaces<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().physical.extend(names.into_iter().map(Into::into));
        self
    }

    /// Seed the active configuration from `set ...` lines.
    pub fn with_active<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        {
            let mut state = self.state();
            for line in lines {
                if let Some(path) = line.as_ref().trim().strip_prefix("set ") {
                    set_path(&mut state.active, path);
                }
            }
            state.candidate = state.active.clone();
        }
        self
    }

    /// Seed the active configuration from a `display set` dump.
    /// Framing markers and anything that is not a `set` line are ignored.
    pub fn with_display_set(self, dump: &str) -> Self {
        self.with_active(dump.lines())
    }

    /// Report the lock as held by someone else for the next `polls` attempts.
    pub fn hold_lock_for(&self, polls: u32) {
        self.state().busy_polls = polls;
    }

    pub fn fail_at(&self, point: FailPoint) {
        self.state().fail = Some(point);
    }

    pub fn clear_failure(&self) {
        self.state().fail = None;
    }

    /// Active configuration as `set ...` lines.
    pub fn active(&self) -> Vec<String> {
        with_verb(&self.state().active)
    }

    /// Candidate configuration as `set ...` lines.
    pub fn candidate(&self) -> Vec<String> {
        with_verb(&self.state().candidate)
    }

    /// Every directive staged so far, in order.
    pub fn applied(&self) -> Vec<String> {
        self.state().applied.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    pub fn commit_count(&self) -> u32 {
        self.state().commits
    }

    pub fn unlock_count(&self) -> u32 {
        self.state().unlocks
    }

    pub fn discard_count(&self) -> u32 {
        self.state().discards
    }

    /// Handles closed so far, across every connection.
    pub fn close_count(&self) -> u32 {
        self.state().closes
    }

    pub fn last_commit_comment(&self) -> Option<String> {
        self.state().last_comment.clone()
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn show_configuration(&self, args: &str) -> String {
        let (scope, relative) = match args.split_once('|') {
            Some((scope, pipe)) => (scope.trim(), pipe.trim() == "display set relative"),
            None => (args.trim(), false),
        };
        let state = self.state();
        let mut lines = Vec::new();
        for path in &state.active {
            if scope.is_empty() {
                lines.push(format!("set {path}"));
            } else if path == scope {
                lines.push(if relative {
                    "set".to_owned()
                } else {
                    format!("set {path}")
                });
            } else if let Some(rest) = path.strip_prefix(scope).and_then(|r| r.strip_prefix(' ')) {
                lines.push(if relative {
                    format!("set {rest}")
                } else {
                    format!("set {path}")
                });
            }
        }
        frame_output(&lines)
    }

    fn injected(&self, point: FailPoint, rpc: &str, message: &str) -> Result<(), Error> {
        if self.state().fail == Some(point) {
            return Err(Error::Rpc {
                rpc: rpc.to_owned(),
                message: message.to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CommandChannel for MemoryChannel {
    async fn facts(&self) -> Result<DeviceFacts, Error> {
        self.ensure_open()?;
        self.injected(FailPoint::Facts, "get-software-information", "device busy")?;
        Ok(self.facts.clone())
    }

    async fn query(&self, command: &str) -> Result<String, Error> {
        self.ensure_open()?;
        match command.trim().strip_prefix("show configuration") {
            Some(args) => Ok(self.show_configuration(args)),
            None => Err(Error::Rpc {
                rpc: "command".into(),
                message: format!("syntax error: {command}"),
            }),
        }
    }

    async fn query_structured(&self, rpc: &str) -> Result<String, Error> {
        self.ensure_open()?;
        if !rpc.contains("get-interface-information") {
            return Ok(rpc_error(&format!("unsupported rpc: {rpc}")));
        }
        let name = reply::element_text(rpc, "interface-name")?.unwrap_or_default();
        let name = name.trim();
        let base = name.split('.').next().unwrap_or(name);
        if self.state().physical.contains(base) {
            Ok(format!(
                "<interface-information><physical-interface><name>{base}</name><oper-status>up</oper-status></physical-interface></interface-information>"
            ))
        } else {
            Ok(rpc_error(&format!("device {name} not found")))
        }
    }

    async fn apply(&self, lines: &[String]) -> Result<Vec<String>, Error> {
        self.ensure_open()?;
        self.injected(FailPoint::Apply, "load-configuration", "syntax error")?;

        let mut state = self.state();
        if !state.locked {
            return Err(Error::Rpc {
                rpc: "load-configuration".into(),
                message: "candidate configuration is not locked".into(),
            });
        }
        let mut warnings = Vec::new();
        for line in lines {
            if let Some(path) = line.strip_prefix("set ") {
                set_path(&mut state.candidate, path);
            } else if let Some(path) = line.strip_prefix("delete ") {
                if !delete_path(&mut state.candidate, path) {
                    warnings.push(format!("statement not found: {path}"));
                }
            } else {
                return Err(Error::UnsupportedDirective(line.clone()));
            }
            state.applied.push(line.clone());
        }
        Ok(warnings)
    }

    async fn lock(&self) -> Result<bool, Error> {
        self.ensure_open()?;
        let mut state = self.state();
        if state.busy_polls > 0 {
            state.busy_polls -= 1;
            return Ok(false);
        }
        if state.locked {
            return Ok(false);
        }
        state.locked = true;
        Ok(true)
    }

    async fn unlock(&self) -> Result<(), Error> {
        self.ensure_open()?;
        let mut state = self.state();
        state.locked = false;
        state.unlocks += 1;
        state.candidate = state.active.clone();
        Ok(())
    }

    async fn validate(&self) -> Result<(), Error> {
        self.ensure_open()?;
        self.injected(
            FailPoint::Validate,
            "commit-configuration",
            "configuration check-out failed",
        )
    }

    async fn commit(&self, comment: Option<&str>) -> Result<Vec<String>, Error> {
        self.ensure_open()?;
        self.injected(FailPoint::Commit, "commit-configuration", "commit failed")?;
        let mut state = self.state();
        state.active = state.candidate.clone();
        state.commits += 1;
        state.last_comment = comment.map(str::to_owned);
        Ok(Vec::new())
    }

    async fn discard_candidate(&self) -> Result<(), Error> {
        self.ensure_open()?;
        let mut state = self.state();
        state.candidate = state.active.clone();
        state.discards += 1;
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.closed.store(true, Ordering::SeqCst);
        self.state().closes += 1;
        Ok(())
    }
}

#[async_trait]
impl Connector for MemoryChannel {
    async fn connect(&self) -> Result<Arc<dyn CommandChannel>, Error> {
        Ok(Arc::new(Self {
            facts: self.facts.clone(),
            state: Arc::clone(&self.state),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

// ── Line set helpers ────────────────────────────────────────────────

fn set_path(lines: &mut Vec<String>, path: &str) {
    if let Some(prefix) = single_valued_prefix(path) {
        let prefix = format!("{prefix} ");
        lines.retain(|l| !l.starts_with(&prefix));
    }
    if !lines.iter().any(|l| l == path) {
        lines.push(path.to_owned());
    }
}

fn delete_path(lines: &mut Vec<String>, path: &str) -> bool {
    let before = lines.len();
    let prefix = format!("{path} ");
    lines.retain(|l| l != path && !l.starts_with(&prefix));
    lines.len() != before
}

/// The path up to and including the leftmost single-valued keyword that is
/// followed by a value.
fn single_valued_prefix(path: &str) -> Option<&str> {
    SINGLE_VALUED
        .iter()
        .filter_map(|kw| {
            let needle = format!(" {kw} ");
            path.find(&needle).map(|idx| idx + needle.len() - 1)
        })
        .min()
        .map(|end| &path[..end])
}

fn with_verb(paths: &[String]) -> Vec<String> {
    paths.iter().map(|p| format!("set {p}")).collect()
}

fn rpc_error(message: &str) -> String {
    format!(
        "<rpc-reply><rpc-error><error-severity>error</error-severity><error-message>{message}</error-message></rpc-error></rpc-reply>"
    )
}
