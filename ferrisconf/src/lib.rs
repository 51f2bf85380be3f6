//! # Ferrisconf
//!
//! Async NETCONF configuration sessions for network switches.
//!
//! Ferrisconf manages configuration changes on Comware-style switches over
//! NETCONF-over-SSH: locked RPC dispatch with a small, typed error taxonomy,
//! staged batches of heterogeneous operations committed in submission
//! order, and a file copy that checks free space and verifies the copied
//! file's digest on the device.
//!
//! ## Features
//!
//! - Async NETCONF 1.0/1.1 sessions via russh
//! - Every RPC wrapped in a scoped `<lock>`/`<unlock>` of the running datastore
//! - Raw transport faults classified into one [`Error`] kind per failure
//! - Staging queue for edit-config, action, CLI, save and rollback operations
//! - SCP upload with free-space check and MD5 verification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrisconf::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferrisconf::Error> {
//!     let mut session = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .build()?;
//!
//!     session.open().await?;
//!
//!     let output = session.cli_display(["display version"]).await?;
//!     println!("{}", output);
//!
//!     session.stage_config(vec!["vlan 10".to_string(), "name uplink".to_string()], "cli_config")?;
//!     session.stage_config("", "save")?;
//!     for staged in session.staged_to_string() {
//!         println!("staged: {}", staged);
//!     }
//!     session.execute_staged().await?;
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod file_copy;
pub mod rpc;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use error::{ConnectionError, Error, FileTransferError, Result, RpcError, StagingError};
pub use file_copy::{CopyChannel, CopyConnector, FileCopy, ScpConnector};
pub use rpc::{Datastore, Filter, Operation, Payload, RpcErrorInfo, RpcReply, XmlElement};
pub use session::{OperationKind, Session, SessionBuilder};
pub use transport::{
    Connector, HostKeyVerification, NetconfTransport, RpcTransport, SessionConfig, SshConnector,
    TransportFault,
};
