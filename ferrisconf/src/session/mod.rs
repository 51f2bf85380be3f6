//! NETCONF configuration sessions.
//!
//! A [`Session`] owns one connection to a device. Every RPC goes through
//! [`Session::execute`], which checks the connection, takes the running
//! datastore lock, dispatches, releases the lock on every exit path and
//! classifies failures. Operations can also be staged and committed later
//! in submission order with [`Session::execute_staged`].

mod builder;
pub mod lock;
pub mod staging;

pub use builder::SessionBuilder;
pub use lock::LockCoordinator;
pub use staging::{OperationKind, StagedOperation, StagingQueue};

use std::fmt;

use log::{debug, warn};

use crate::error::{ConnectionError, Error, Result, RpcError, classify, classify_connect};
use crate::rpc::{Datastore, Filter, Operation, Payload, RpcReply};
use crate::transport::{Connector, RpcTransport, SessionConfig, SshConnector};

/// Display command that restarts the device without confirmation.
const REBOOT_COMMAND: &str = "reboot force";

/// A configuration session with one device.
///
/// # Example
///
/// ```rust,no_run
/// use ferrisconf::{Session, SessionConfig};
///
/// # async fn example() -> Result<(), ferrisconf::Error> {
/// let mut session = Session::new(SessionConfig::new("192.168.1.1", "admin", "secret"));
/// session.open().await?;
///
/// let arp = session.cli_display(["display arp"]).await?;
/// println!("{arp}");
///
/// session.stage_config("interface vlan 10", "cli_config")?;
/// session.stage_config("", "save")?;
/// session.execute_staged().await?;
///
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session<C: Connector = SshConnector> {
    config: SessionConfig,
    connector: C,
    transport: Option<C::Transport>,
    lock: LockCoordinator,
    staging: StagingQueue,
}

impl Session {
    /// Create an SSH session. Does not connect.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_connector(config, SshConnector)
    }
}

impl<C: Connector> Session<C> {
    /// Create a session over a custom connector. Does not connect.
    pub fn with_connector(config: SessionConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            transport: None,
            lock: LockCoordinator::new(Datastore::Running),
            staging: StagingQueue::new(),
        }
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying transport, once opened.
    pub fn transport(&self) -> Option<&C::Transport> {
        self.transport.as_ref()
    }

    /// Connect to the device.
    ///
    /// The connection handle is stored only on success. Fails without
    /// touching the existing connection if the session is already open.
    pub async fn open(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(ConnectionError::Failed {
                host: self.config.host.clone(),
                port: self.config.port,
                message: "already connected".to_string(),
                source: None,
            }
            .into());
        }

        debug!("opening NETCONF session to {}", self.config.socket_addr());
        let transport = self
            .connector
            .connect(&self.config)
            .await
            .map_err(|fault| classify_connect(fault, &self.config.host, self.config.port))?;

        self.transport = Some(transport);
        self.lock = LockCoordinator::new(Datastore::Running);
        debug!("NETCONF session to {} open", self.config.socket_addr());
        Ok(())
    }

    /// Whether the session has a live connection. Never fails.
    pub fn is_connected(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|transport| transport.is_connected())
    }

    /// Close the NETCONF session.
    ///
    /// A timeout while closing is reported, not swallowed. The handle is
    /// released either way.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        if !transport.is_connected() {
            return Ok(());
        }

        debug!("closing NETCONF session to {}", self.config.socket_addr());
        transport.close_session().await.map_err(classify)
    }

    /// Lock the running datastore.
    pub async fn lock(&mut self) -> Result<RpcReply> {
        let transport = live(&mut self.transport)?;
        self.lock.acquire(transport).await
    }

    /// Unlock the running datastore. The lock flag is cleared even if the
    /// device refuses.
    pub async fn unlock(&mut self) -> Result<RpcReply> {
        let transport = live(&mut self.transport)?;
        self.lock.release(transport).await
    }

    /// Whether this session currently holds the datastore lock.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Dispatch an operation under the datastore lock.
    ///
    /// Fails with a closed-connection error without locking if the session
    /// is not connected. Returns the raw reply.
    pub async fn execute(&mut self, operation: &Operation) -> Result<RpcReply> {
        let transport = live(&mut self.transport)?;
        debug!("executing {}", operation.name());
        self.lock.scoped(transport, operation).await
    }

    /// Apply a configuration fragment to the running datastore.
    pub async fn edit_config(&mut self, config: impl Into<Payload>) -> Result<RpcReply> {
        self.execute(&Operation::EditConfig {
            target: Datastore::Running,
            config: config.into(),
        })
        .await
    }

    /// Retrieve data matching a filter.
    pub async fn get(&mut self, filter: Filter) -> Result<RpcReply> {
        self.execute(&Operation::Get(filter)).await
    }

    /// Run a device action.
    pub async fn action(&mut self, payload: impl Into<Payload>) -> Result<RpcReply> {
        self.execute(&Operation::Action(payload.into())).await
    }

    /// Save the running configuration, to `filename` or the startup file.
    pub async fn save(&mut self, filename: Option<&str>) -> Result<RpcReply> {
        self.execute(&Operation::Save {
            filename: filename.map(str::to_string),
        })
        .await
    }

    /// Roll the running configuration back to a saved file.
    pub async fn rollback(&mut self, filename: impl Into<String>) -> Result<RpcReply> {
        self.execute(&Operation::Rollback {
            filename: filename.into(),
        })
        .await
    }

    /// Run display commands and return their output as plain text.
    pub async fn cli_display<I, S>(&mut self, commands: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let operation = Operation::CliDisplay(commands.into_iter().map(Into::into).collect());
        let reply = self.execute(&operation).await?;
        cli_output(&reply)
    }

    /// Run configuration commands and return the device's echo as plain
    /// text.
    pub async fn cli_config<I, S>(&mut self, commands: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let operation = Operation::CliConfig(commands.into_iter().map(Into::into).collect());
        let reply = self.execute(&operation).await?;
        cli_output(&reply)
    }

    /// Force a device reboot.
    ///
    /// The device usually drops the session before replying, so a timeout
    /// counts as success. The command is sent without taking the lock.
    pub async fn reboot(&mut self) -> Result<()> {
        let transport = live(&mut self.transport)?;
        let operation = Operation::CliDisplay(vec![REBOOT_COMMAND.to_string()]);

        match transport.dispatch(&operation).await.map_err(classify) {
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => {
                warn!("no reply to '{}', device is restarting: {}", REBOOT_COMMAND, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Stage an operation by kind name (`edit-config`, `action`,
    /// `cli-config`, `cli-display`, `save` or `rollback`; underscores are
    /// accepted too).
    ///
    /// Nothing is sent to the device. Only the kind is checked: an unknown
    /// kind is rejected and the queue is left unchanged.
    pub fn stage_config(&mut self, config: impl Into<Payload>, kind: &str) -> Result<()> {
        let kind: OperationKind = kind.parse()?;
        self.stage(kind, config)
    }

    /// Stage an operation.
    pub fn stage(&mut self, kind: OperationKind, payload: impl Into<Payload>) -> Result<()> {
        self.staging.push(StagedOperation::new(kind, payload.into()));
        debug!("staged {} ({} pending)", kind, self.staging.len());
        Ok(())
    }

    /// The staged operations.
    pub fn staged(&self) -> &StagingQueue {
        &self.staging
    }

    /// Discard every staged operation.
    pub fn clear_staged(&mut self) {
        self.staging.clear();
    }

    /// Rendered staged payloads in submission order, for display.
    pub fn staged_to_string(&self) -> impl Iterator<Item = String> + Clone + '_ {
        self.staging.renderings()
    }

    /// Execute every staged operation in submission order.
    ///
    /// Each entry takes and releases the lock on its own. The first failure
    /// aborts the pass and is returned; entries already applied stay
    /// applied and the queue keeps every entry. After a full pass the queue
    /// is empty and the replies are returned in order.
    pub async fn execute_staged(&mut self) -> Result<Vec<RpcReply>> {
        let entries = self.staging.take();
        let total = entries.len();
        let mut replies = Vec::with_capacity(total);
        let mut failure: Option<Error> = None;

        for (index, entry) in entries.iter().enumerate() {
            debug!("executing staged {}/{}: {}", index + 1, total, entry.kind());
            match self.execute(entry.operation()).await {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    warn!("staged {} failed at {}/{}: {}", entry.kind(), index + 1, total, e);
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            self.staging.restore(entries);
            return Err(e);
        }
        Ok(replies)
    }
}

impl<C: Connector> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("locked", &self.lock.is_locked())
            .field("staged", &self.staging.len())
            .finish()
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!(
                "Session to {} dropped while connected; call close() to end it cleanly",
                self.config.socket_addr()
            );
        }
    }
}

/// The transport, if the session is connected.
fn live<T: RpcTransport>(transport: &mut Option<T>) -> Result<&mut T> {
    match transport.as_mut() {
        Some(transport) if transport.is_connected() => Ok(transport),
        _ => Err(ConnectionError::Closed {
            reason: "session is not connected".to_string(),
            source: None,
        }
        .into()),
    }
}

fn cli_output(reply: &RpcReply) -> Result<String> {
    reply.cli_text().ok_or_else(|| {
        RpcError::MalformedReply {
            message: "reply carries no CLI output".to_string(),
        }
        .into()
    })
}
