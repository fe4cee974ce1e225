// ── Transaction manager ──
//
// Every mutation follows lock -> apply -> validate -> commit -> unlock. Any
// failure after the lock is taken discards the candidate and releases the
// lock exactly once before the error is returned.

use std::time::Duration;

use strum::Display;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::directive::DirectiveBatch;
use crate::error::{CoreError, rejection_message};
use crate::guard::WriteGuard;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TxState {
    Idle,
    Locked,
    Edited,
    Validated,
    Committed,
    RolledBack,
    Closed,
}

/// One locked edit of the candidate configuration.
pub struct Transaction<'a> {
    session: &'a Session,
    resource: String,
    state: TxState,
    /// Held from `Locked` until `Closed`.
    writer: Option<OwnedMutexGuard<()>>,
}

impl<'a> Transaction<'a> {
    /// Become the device's only in-process writer, then take the
    /// configuration lock, polling every `poll_interval` while another
    /// client holds it. Only `cancel` ends either wait early.
    pub async fn begin(
        session: &'a Session,
        resource: impl Into<String>,
        poll_interval: Duration,
        writer: &WriteGuard,
        cancel: &CancellationToken,
    ) -> Result<Self, CoreError> {
        let resource = resource.into();
        let permit = tokio::select! {
            () = cancel.cancelled() => return Err(CoreError::Cancelled),
            permit = writer.acquire() => permit,
        };
        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let granted = session.channel().lock().await;
            session.settle().await;
            if granted? {
                break;
            }
            warn!(
                resource = %resource,
                retry_in = ?poll_interval,
                "configuration database locked by another session"
            );
            tokio::select! {
                () = cancel.cancelled() => return Err(CoreError::Cancelled),
                () = tokio::time::sleep(poll_interval) => {}
            }
        }
        debug!(resource = %resource, "configuration locked");
        Ok(Self {
            session,
            resource,
            state: TxState::Locked,
            writer: Some(permit),
        })
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Stage the batch into the candidate configuration.
    pub async fn apply(&mut self, batch: &DirectiveBatch) -> Result<Vec<String>, CoreError> {
        self.require_state(TxState::Locked, "apply")?;
        let lines = batch.to_lines();
        for line in &lines {
            debug!(resource = %self.resource, "{line}");
        }
        let result = self.session.channel().apply(&lines).await;
        self.session.settle().await;
        match result {
            Ok(warnings) => {
                for w in &warnings {
                    warn!(resource = %self.resource, warning = %w, "device warning");
                }
                self.state = TxState::Edited;
                Ok(warnings)
            }
            Err(e) => {
                let err = match rejection_message(&e) {
                    Some(message) => CoreError::ApplyRejected {
                        resource: self.resource.clone(),
                        message,
                    },
                    None => e.into(),
                };
                Err(self.rollback(err).await)
            }
        }
    }

    /// Dry-run commit check.
    pub async fn validate(&mut self) -> Result<(), CoreError> {
        self.require_state(TxState::Edited, "validate")?;
        let result = self.session.channel().validate().await;
        self.session.settle().await;
        match result {
            Ok(()) => {
                self.state = TxState::Validated;
                Ok(())
            }
            Err(e) => {
                let err = match rejection_message(&e) {
                    Some(message) => CoreError::ValidationFailed {
                        resource: self.resource.clone(),
                        message,
                    },
                    None => e.into(),
                };
                Err(self.rollback(err).await)
            }
        }
    }

    /// Commit and release the lock.
    pub async fn commit(mut self, comment: Option<&str>) -> Result<Vec<String>, CoreError> {
        self.require_state(TxState::Validated, "commit")?;
        let result = self.session.channel().commit(comment).await;
        self.session.settle().await;
        match result {
            Ok(warnings) => {
                self.state = TxState::Committed;
                info!(resource = %self.resource, "configuration committed");
                self.unlock().await;
                self.close();
                Ok(warnings)
            }
            Err(e) => {
                let err = match rejection_message(&e) {
                    Some(message) => CoreError::CommitFailed {
                        resource: self.resource.clone(),
                        message,
                    },
                    None => e.into(),
                };
                Err(self.rollback(err).await)
            }
        }
    }

    /// Roll back because of an error raised outside the transaction
    /// (compile failure, allocation failure) and hand the error back.
    pub async fn abort(mut self, err: CoreError) -> CoreError {
        self.rollback(err).await
    }

    /// Apply, validate and commit in one go.
    pub async fn run(
        mut self,
        batch: &DirectiveBatch,
        comment: Option<&str>,
    ) -> Result<Vec<String>, CoreError> {
        let mut warnings = self.apply(batch).await?;
        self.validate().await?;
        warnings.extend(self.commit(comment).await?);
        Ok(warnings)
    }

    async fn rollback(&mut self, err: CoreError) -> CoreError {
        if matches!(self.state, TxState::Closed | TxState::RolledBack) {
            return err;
        }
        warn!(resource = %self.resource, error = %err, "rolling back");
        if let Err(e) = self.session.channel().discard_candidate().await {
            warn!(resource = %self.resource, error = %e, "failed to discard candidate");
        }
        self.session.settle().await;
        self.state = TxState::RolledBack;
        self.unlock().await;
        self.close();
        err
    }

    fn close(&mut self) {
        self.state = TxState::Closed;
        self.writer = None;
    }

    async fn unlock(&self) {
        if let Err(e) = self.session.channel().unlock().await {
            warn!(resource = %self.resource, error = %e, "failed to release configuration lock");
        }
        self.session.settle().await;
        debug!(resource = %self.resource, "configuration unlocked");
    }

    fn require_state(&self, state: TxState, action: &str) -> Result<(), CoreError> {
        if self.state == state {
            Ok(())
        } else {
            Err(CoreError::Internal(format!(
                "cannot {action} a transaction in state {}",
                self.state
            )))
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state != TxState::Closed {
            warn!(
                resource = %self.resource,
                state = %self.state,
                "transaction dropped without commit or rollback"
            );
        }
    }
}
