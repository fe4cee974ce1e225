// ── Serialization guards ──
//
// Two mutual-exclusion domains per `Device`. The read guard covers every
// read-then-decide sequence (dump a scope, classify it, scan an allocator
// namespace) so two operations never interleave their snapshots. The write
// guard is held by a transaction from lock to close, so at most one
// in-process session edits the device at a time whatever the transport's
// own locking provides.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

/// Cloneable handle to a device's read guard; clones share the same lock.
#[derive(Debug, Clone, Default)]
pub struct ReadGuard(Arc<Mutex<()>>);

impl ReadGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

/// Cloneable handle to a device's writer lock.
#[derive(Debug, Clone, Default)]
pub struct WriteGuard(Arc<Mutex<()>>);

impl WriteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait to become the only writer. The permit is released on drop.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.0).lock_owned().await
    }
}
