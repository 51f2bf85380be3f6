//! NETCONF transport layer.
//!
//! The session talks to the device through two traits: a [`Connector`]
//! that establishes a connection, and the [`RpcTransport`] it yields. Both
//! report failures as raw [`TransportFault`]s, which the session classifies
//! before they reach callers. [`SshConnector`] is the russh-backed
//! implementation.

pub mod config;
pub mod framing;
mod ssh;

pub use config::{HostKeyVerification, SessionConfig};
pub use ssh::{NetconfTransport, SshConnector};
pub(crate) use ssh::{SshHandler, connect_ssh};

use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::rpc::{Datastore, Operation, RpcErrorInfo, RpcReply};

/// Raw faults reported by transport implementations.
///
/// These never escape the crate's public operations; see
/// [`classify`](crate::error::classify).
#[derive(Error, Debug)]
pub enum TransportFault {
    /// The device rejected the credentials
    #[error("authentication rejected for user '{user}'")]
    Authentication { user: String },

    /// SSH protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Server host key rejected
    #[error("host key rejected: {message}")]
    HostKey { message: String },

    /// Host name resolution failed
    #[error("cannot resolve '{host}': {source}")]
    NameResolution {
        host: String,
        #[source]
        source: io::Error,
    },

    /// A required capability is missing from the server hello
    #[error("server does not advertise capability '{capability}'")]
    MissingCapability { capability: String },

    /// The device answered with an `rpc-error`
    #[error("{0}")]
    Rpc(RpcErrorInfo),

    /// No reply within the configured timeout
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The transport went away
    #[error("transport disconnected")]
    Disconnected,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A message could not be framed or parsed
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// An established NETCONF connection.
pub trait RpcTransport: Send {
    /// Whether the connection is still usable. Must not block or fail.
    fn is_connected(&self) -> bool;

    /// Issue `<lock>` on a datastore.
    fn lock(
        &mut self,
        target: Datastore,
    ) -> impl Future<Output = Result<RpcReply, TransportFault>> + Send;

    /// Issue `<unlock>` on a datastore.
    fn unlock(
        &mut self,
        target: Datastore,
    ) -> impl Future<Output = Result<RpcReply, TransportFault>> + Send;

    /// Dispatch an operation and wait for its reply.
    ///
    /// A reply carrying an `rpc-error` of severity `error` is reported as
    /// [`TransportFault::Rpc`].
    fn dispatch(
        &mut self,
        operation: &Operation,
    ) -> impl Future<Output = Result<RpcReply, TransportFault>> + Send;

    /// Request graceful termination of the NETCONF session.
    fn close_session(&mut self) -> impl Future<Output = Result<(), TransportFault>> + Send;
}

/// Factory for [`RpcTransport`]s.
pub trait Connector: Send + Sync {
    /// The connection type produced.
    type Transport: RpcTransport;

    /// Connect, authenticate and complete the NETCONF hello exchange.
    fn connect(
        &self,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<Self::Transport, TransportFault>> + Send;
}
