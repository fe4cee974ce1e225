// `CommandChannel` over the REST RPC service
//
// Lock, load and commit are replayed inside one multi-RPC request, since a
// device-side lock does not outlive a single request. Ending that request
// without a commit releases the lock and drops the uncommitted edits.

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use quick_xml::escape::escape;
use tracing::{debug, info};
use url::Url;

use crate::auth::{ApiFlavor, Credentials};
use crate::channel::{CommandChannel, Connector, DeviceFacts, EMPTY_OUTPUT, frame_output};
use crate::error::Error;
use crate::rest::client::RestClient;
use crate::rest::reply;
use crate::transport::TransportConfig;

const LOCK: &str = "<lock-configuration/>";
const UNLOCK: &str = "<unlock-configuration/>";
const ROLLBACK: &str = "<load-configuration rollback=\"0\"/>";
const CHECK: &str = "<commit-configuration><check/></commit-configuration>";

#[async_trait]
impl CommandChannel for RestClient {
    async fn facts(&self) -> Result<DeviceFacts, Error> {
        let reply = self
            .call("get-software-information", "<get-software-information/>".into())
            .await?;
        let hostname = reply::element_text(&reply.body, "host-name")?.unwrap_or_default();
        let model = reply::element_text(&reply.body, "product-model")?.unwrap_or_default();
        let version = reply::element_text(&reply.body, "junos-version")?.unwrap_or_default();
        let facts = DeviceFacts::new(hostname.trim(), model.trim(), version.trim());
        info!(
            hostname = %facts.hostname,
            model = %facts.model,
            platform = %facts.platform,
            "connected"
        );
        Ok(facts)
    }

    async fn query(&self, command: &str) -> Result<String, Error> {
        let body = format!("<command format=\"text\">{}</command>", escape(command));
        let reply = self.call("command", body).await?;

        if let Some(text) = reply::element_text(&reply.body, "configuration-output")? {
            let lines: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_owned)
                .collect();
            return Ok(frame_output(&lines));
        }

        match reply::element_text(&reply.body, "output")? {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Ok(EMPTY_OUTPUT.to_owned()),
        }
    }

    async fn query_structured(&self, rpc: &str) -> Result<String, Error> {
        self.post_raw("structured", rpc.to_owned()).await
    }

    async fn apply(&self, lines: &[String]) -> Result<Vec<String>, Error> {
        if !self.locked.load(Ordering::SeqCst) {
            return Err(Error::Rpc {
                rpc: "load-configuration".into(),
                message: "candidate configuration is not locked".into(),
            });
        }
        for line in lines {
            if !(line.starts_with("set ") || line.starts_with("delete ")) {
                return Err(Error::UnsupportedDirective(line.clone()));
            }
        }
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(lines);
        debug!(count = lines.len(), "staged directives");
        Ok(Vec::new())
    }

    async fn lock(&self) -> Result<bool, Error> {
        // Probe: take and release the lock in one request.
        match self.call("lock-configuration", format!("{LOCK}{UNLOCK}")).await {
            Ok(_) => {
                self.locked.store(true, Ordering::SeqCst);
                Ok(true)
            }
            Err(e) if e.is_lock_contention() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn unlock(&self) -> Result<(), Error> {
        self.locked.store(false, Ordering::SeqCst);
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    async fn validate(&self) -> Result<(), Error> {
        let load = self.load_staged();
        self.call(
            "commit-configuration",
            format!("{LOCK}{load}{CHECK}{ROLLBACK}{UNLOCK}"),
        )
        .await?;
        Ok(())
    }

    async fn commit(&self, comment: Option<&str>) -> Result<Vec<String>, Error> {
        let load = self.load_staged();
        let commit = match comment {
            Some(c) => format!(
                "<commit-configuration><log>{}</log></commit-configuration>",
                escape(c)
            ),
            None => "<commit-configuration/>".to_owned(),
        };
        let reply = self
            .call(
                "commit-configuration",
                format!("{LOCK}{load}{commit}{UNLOCK}"),
            )
            .await?;
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(reply.warnings)
    }

    async fn discard_candidate(&self) -> Result<(), Error> {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.mark_closed();
        Ok(())
    }
}

impl RestClient {
    /// `<load-configuration>` element carrying every staged directive.
    fn load_staged(&self) -> String {
        let staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        let payload = staged.join("\n");
        format!(
            "<load-configuration action=\"set\" format=\"text\"><configuration-set>{}</configuration-set></load-configuration>",
            escape(payload.as_str())
        )
    }
}

// ── Connector ───────────────────────────────────────────────────────

/// Opens a fresh [`RestClient`] per operation.
#[derive(Debug, Clone)]
pub struct RestConnector {
    base_url: Url,
    credentials: Credentials,
    transport: TransportConfig,
    flavor: ApiFlavor,
}

impl RestConnector {
    pub fn new(base_url: Url, credentials: Credentials, transport: TransportConfig) -> Self {
        Self {
            base_url,
            credentials,
            transport,
            flavor: ApiFlavor::default(),
        }
    }

    pub fn with_flavor(mut self, flavor: ApiFlavor) -> Self {
        self.flavor = flavor;
        self
    }
}

#[async_trait]
impl Connector for RestConnector {
    async fn connect(&self) -> Result<Arc<dyn CommandChannel>, Error> {
        let client = RestClient::new(
            self.base_url.clone(),
            self.credentials.clone(),
            &self.transport,
        )?
        .with_flavor(self.flavor);
        Ok(Arc::new(client))
    }
}
