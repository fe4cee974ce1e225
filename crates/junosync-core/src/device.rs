// ── Device facade ──
//
// Entry point for consumers. Every operation opens its own session,
// serializes its reads through the device's read guard, mutates through
// one locked transaction, and closes the session on every path.

use std::sync::Arc;

use junosync_api::{Connector, MemoryChannel};
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::classify::Presence;
use crate::config::DeviceConfig;
use crate::directive::{Directive, DirectiveBatch};
use crate::error::CoreError;
use crate::guard::{ReadGuard, WriteGuard};
use crate::resource::{Phase, Resource};
use crate::session::Session;
use crate::transaction::Transaction;

/// What `plan` found on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PlanAction {
    Create,
    Update,
}

/// Directives an apply would send, computed without locking or editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub action: PlanAction,
    pub batch: DirectiveBatch,
}

/// One managed device.
///
/// Cheaply cloneable via `Arc<DeviceInner>`; clones share the read and
/// write guards, so concurrent operations from clones never interleave
/// their reads and never hold a transaction at the same time.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    config: DeviceConfig,
    connector: Arc<dyn Connector>,
    guard: ReadGuard,
    writer: WriteGuard,
    cancel: CancellationToken,
}

impl Device {
    /// Device reached over the REST RPC endpoint in `config`.
    pub fn new(config: DeviceConfig) -> Self {
        let connector = Arc::new(config.connector());
        Self::with_connector(config, connector)
    }

    /// Device reached through any connector (the in-memory device in tests).
    pub fn with_connector(config: DeviceConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                config,
                connector,
                guard: ReadGuard::new(),
                writer: WriteGuard::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Device backed by an in-memory channel.
    pub fn in_memory(config: DeviceConfig, channel: MemoryChannel) -> Self {
        Self::with_connector(config, Arc::new(channel))
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    /// Stop any operation waiting for the writer or configuration lock.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    async fn open_session(&self) -> Result<Session, CoreError> {
        let channel = self.inner.connector.connect().await?;
        Session::open(channel, &self.inner.config, self.inner.guard.clone()).await
    }

    async fn begin<'s>(&self, session: &'s Session, label: &str) -> Result<Transaction<'s>, CoreError> {
        Transaction::begin(
            session,
            label,
            self.inner.config.lock_poll_interval,
            &self.inner.writer,
            &self.inner.cancel,
        )
        .await
    }

    fn comment(&self) -> Option<&str> {
        self.inner.config.commit_comment.as_deref()
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Create `desired`. Fails with `AlreadyExists` when the object is
    /// configured; a disabled placeholder is cleared first.
    #[instrument(skip_all, fields(resource = %R::label(&desired.key())))]
    pub async fn create<R: Resource>(&self, desired: &R) -> Result<R, CoreError> {
        desired.validate()?;
        let session = self.open_session().await?;
        let result = self.create_in(&session, desired).await;
        session.close().await;
        result
    }

    /// Current state, or `None` when the object is not configured.
    #[instrument(skip_all, fields(resource = %R::label(key)))]
    pub async fn read<R: Resource>(&self, key: &R::Key) -> Result<Option<R>, CoreError> {
        let session = self.open_session().await?;
        let result = read_in::<R>(&session, key).await;
        session.close().await;
        result
    }

    /// Replace the current state with `desired` in one transaction.
    #[instrument(skip_all, fields(resource = %R::label(&desired.key())))]
    pub async fn update<R: Resource>(&self, desired: &R) -> Result<R, CoreError> {
        desired.validate()?;
        let session = self.open_session().await?;
        let result = self.update_in(&session, desired).await;
        session.close().await;
        result
    }

    /// Remove the object, leaving a placeholder where hardware requires one.
    #[instrument(skip_all, fields(resource = %R::label(key)))]
    pub async fn delete<R: Resource>(&self, key: &R::Key) -> Result<(), CoreError> {
        let session = self.open_session().await?;
        let result = self.delete_in::<R>(&session, key).await;
        session.close().await;
        result
    }

    /// Read by identifier, failing with `NotFound` when unconfigured.
    pub async fn import<R: Resource>(&self, key: &R::Key) -> Result<R, CoreError> {
        self.read::<R>(key).await?.ok_or_else(|| CoreError::NotFound {
            resource: R::label(key),
        })
    }

    /// `true` if the object is configured (placeholders do not count).
    #[instrument(skip_all, fields(resource = %R::label(key)))]
    pub async fn exists<R: Resource>(&self, key: &R::Key) -> Result<bool, CoreError> {
        let session = self.open_session().await?;
        let result: Result<bool, CoreError> = async {
            let mut reader = session.reader().await;
            let dump = reader.dump(&R::scope(key)).await?;
            Ok(R::presence(session.context(), &dump).is_configured())
        }
        .await;
        session.close().await;
        result
    }

    /// Compute what applying `desired` would send, without locking.
    #[instrument(skip_all, fields(resource = %R::label(&desired.key())))]
    pub async fn plan<R: Resource>(&self, desired: &R) -> Result<Plan, CoreError> {
        desired.validate()?;
        let session = self.open_session().await?;
        let result: Result<Plan, CoreError> = async {
            let mut reader = session.reader().await;
            let ctx = session.context();
            let key = desired.key();
            let scope = R::scope(&key);
            let dump = reader.dump(&scope).await?;
            match R::presence(ctx, &dump) {
                Presence::Configured => {
                    let mut current = R::parse(&key, &dump)?;
                    current.enrich(&mut reader).await?;
                    let removed = current.resolve(&mut reader, Phase::UpdateRemove).await?;
                    let added = desired.resolve(&mut reader, Phase::UpdateAdd).await?;
                    let mut batch = current.compile_delete(ctx, &removed)?;
                    batch.extend(desired.compile(ctx, &added)?);
                    Ok(Plan {
                        action: PlanAction::Update,
                        batch,
                    })
                }
                presence => {
                    let resolved = desired.resolve(&mut reader, Phase::Create).await?;
                    let mut batch = desired.compile(ctx, &resolved)?;
                    if presence == Presence::AdministrativelyDisabled {
                        batch.prepend(Directive::delete(scope));
                    }
                    Ok(Plan {
                        action: PlanAction::Create,
                        batch,
                    })
                }
            }
        }
        .await;
        session.close().await;
        result
    }

    /// Create or update, whichever the device state calls for.
    pub async fn apply<R: Resource>(&self, desired: &R) -> Result<R, CoreError> {
        if self.exists::<R>(&desired.key()).await? {
            self.update(desired).await
        } else {
            self.create(desired).await
        }
    }

    // ── Flows ────────────────────────────────────────────────────────

    async fn create_in<R: Resource>(&self, session: &Session, desired: &R) -> Result<R, CoreError> {
        let key = desired.key();
        let label = R::label(&key);
        let scope = R::scope(&key);
        let tx = self.begin(session, &label).await?;

        let prepared: Result<DirectiveBatch, CoreError> = async {
            let mut reader = session.reader().await;
            let dump = reader.dump(&scope).await?;
            let presence = R::presence(session.context(), &dump);
            if presence.is_configured() {
                return Err(CoreError::AlreadyExists {
                    resource: label.clone(),
                });
            }
            let resolved = desired.resolve(&mut reader, Phase::Create).await?;
            let mut batch = desired.compile(session.context(), &resolved)?;
            if presence == Presence::AdministrativelyDisabled {
                debug!("clearing placeholder");
                batch.prepend(Directive::delete(scope.clone()));
            }
            Ok(batch)
        }
        .await;

        let batch = match prepared {
            Ok(batch) => batch,
            Err(e) => return Err(tx.abort(e).await),
        };
        tx.run(&batch, self.comment()).await?;
        info!(directives = batch.len(), "created");
        confirm_present::<R>(session, &key).await
    }

    async fn update_in<R: Resource>(&self, session: &Session, desired: &R) -> Result<R, CoreError> {
        let key = desired.key();
        let label = R::label(&key);
        let tx = self.begin(session, &label).await?;

        let prepared: Result<DirectiveBatch, CoreError> = async {
            let mut reader = session.reader().await;
            let ctx = session.context();
            let dump = reader.dump(&R::scope(&key)).await?;
            if !R::presence(ctx, &dump).is_configured() {
                return Err(CoreError::NotFound {
                    resource: label.clone(),
                });
            }
            let mut current = R::parse(&key, &dump)?;
            current.enrich(&mut reader).await?;
            let removed = current.resolve(&mut reader, Phase::UpdateRemove).await?;
            let added = desired.resolve(&mut reader, Phase::UpdateAdd).await?;
            let mut batch = current.compile_delete(ctx, &removed)?;
            batch.extend(desired.compile(ctx, &added)?);
            Ok(batch)
        }
        .await;

        let batch = match prepared {
            Ok(batch) => batch,
            Err(e) => return Err(tx.abort(e).await),
        };
        tx.run(&batch, self.comment()).await?;
        info!(directives = batch.len(), "updated");
        confirm_present::<R>(session, &key).await
    }

    async fn delete_in<R: Resource>(&self, session: &Session, key: &R::Key) -> Result<(), CoreError> {
        let label = R::label(key);
        let tx = self.begin(session, &label).await?;

        let prepared: Result<DirectiveBatch, CoreError> = async {
            let mut reader = session.reader().await;
            let ctx = session.context();
            let dump = reader.dump(&R::scope(key)).await?;
            if !R::presence(ctx, &dump).is_configured() {
                return Err(CoreError::NotFound {
                    resource: label.clone(),
                });
            }
            let mut current = R::parse(key, &dump)?;
            current.enrich(&mut reader).await?;
            let resolved = current.resolve(&mut reader, Phase::Delete).await?;
            current.compile_delete(ctx, &resolved)
        }
        .await;

        let batch = match prepared {
            Ok(batch) => batch,
            Err(e) => return Err(tx.abort(e).await),
        };
        tx.run(&batch, self.comment()).await?;
        info!(directives = batch.len(), "deleted");

        let mut reader = session.reader().await;
        let dump = reader.dump(&R::scope(key)).await?;
        if R::presence(session.context(), &dump).is_configured() {
            return Err(CoreError::PostCommitDivergence {
                resource: label,
                reason: "object is still configured after delete".into(),
            });
        }
        Ok(())
    }
}

async fn read_in<R: Resource>(session: &Session, key: &R::Key) -> Result<Option<R>, CoreError> {
    let mut reader = session.reader().await;
    let dump = reader.dump(&R::scope(key)).await?;
    if !R::presence(session.context(), &dump).is_configured() {
        return Ok(None);
    }
    let mut resource = R::parse(key, &dump)?;
    resource.enrich(&mut reader).await?;
    Ok(Some(resource))
}

/// Re-read after commit; anything but a configured object is divergence.
async fn confirm_present<R: Resource>(session: &Session, key: &R::Key) -> Result<R, CoreError> {
    match read_in::<R>(session, key).await? {
        Some(resource) => Ok(resource),
        None => Err(CoreError::PostCommitDivergence {
            resource: R::label(key),
            reason: "object is absent or disabled after commit".into(),
        }),
    }
}
