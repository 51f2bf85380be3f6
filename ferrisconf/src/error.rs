//! Error types for ferrisconf.
//!
//! Every public operation fails with exactly one [`Error`]. Raw faults from
//! the NETCONF and SCP collaborators ([`TransportFault`]) never cross the
//! session boundary: they are translated here, by [`classify`] and
//! [`classify_connect`], and nowhere else.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::rpc::RpcErrorInfo;
use crate::transport::TransportFault;

/// Main error type for ferrisconf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Connectivity and authentication failures
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Protocol-level RPC failures, including lock conflicts and timeouts
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Rejected staging requests
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    /// File copy failures
    #[error("File transfer error: {0}")]
    FileTransfer(#[from] FileTransferError),

    /// Invalid session configuration (detected before any network I/O)
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl Error {
    /// Whether retrying the same call later may succeed.
    ///
    /// Lock conflicts and timeouts are transient; everything else needs a
    /// change on the caller's side first. Nothing in this crate retries on
    /// its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(RpcError::LockConflict(_))
                | Error::Rpc(RpcError::UnlockConflict(_))
                | Error::Rpc(RpcError::Timeout(_))
        )
    }

    /// Whether this is a timeout classification.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Rpc(RpcError::Timeout(_)))
    }
}

/// Connection layer errors (session setup, liveness, authentication).
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The session is not connected or the transport went away mid-call.
    /// `source` is the fault that ended the call, if there was one.
    #[error("Connection closed: {reason}")]
    Closed {
        reason: String,
        #[source]
        source: Option<TransportFault>,
    },

    /// The device rejected the credentials
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH layer failure (handshake, host key, channel setup)
    #[error("SSH failure: {0}")]
    Ssh(#[source] TransportFault),

    /// The host name could not be resolved
    #[error("Unknown host '{host}': {source}")]
    UnknownHost {
        host: String,
        #[source]
        source: io::Error,
    },

    /// The device lacks a capability this client depends on. Not retryable.
    #[error("NETCONF extension not installed: server does not advertise '{capability}'")]
    ExtensionNotInstalled { capability: String },

    /// Any other failure while establishing the session
    #[error("Connection to {host}:{port} failed: {message}")]
    Failed {
        host: String,
        port: u16,
        message: String,
        #[source]
        source: Option<TransportFault>,
    },
}

/// RPC layer errors.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The device answered with an `rpc-error`
    #[error("{0}")]
    Rpc(RpcErrorInfo),

    /// Another session holds the configuration lock
    #[error("Lock conflict: {0}")]
    LockConflict(RpcErrorInfo),

    /// The device refused to release the configuration lock
    #[error("Unlock conflict: {0}")]
    UnlockConflict(RpcErrorInfo),

    /// No reply within the session timeout
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The reply could not be understood
    #[error("Malformed reply: {message}")]
    MalformedReply { message: String },
}

/// Staging errors. Raised before any network interaction.
#[derive(Error, Debug)]
pub enum StagingError {
    /// Operation kind outside the six stageable kinds
    #[error(
        "Invalid operation kind '{kind}' (expected one of: edit-config, action, cli-config, cli-display, save, rollback)"
    )]
    InvalidKind { kind: String },
}

/// File copy errors.
#[derive(Error, Debug)]
pub enum FileTransferError {
    /// The remote file system has less free space than the file needs
    #[error("Not enough space on remote device: need {required} bytes, {available} available")]
    NotEnoughSpace { required: u64, available: u64 },

    /// The local source file cannot be read
    #[error("Local file '{}' is not readable: {source}", .path.display())]
    NotReadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The remote destination directory does not exist
    #[error("Remote directory '{dir}' does not exist")]
    RemoteDirMissing { dir: String },

    /// Copy completed but the remote content differs
    #[error("Hash mismatch after transfer: local {local}, remote {}", .remote.as_deref().unwrap_or("<none>"))]
    HashMismatch {
        local: String,
        remote: Option<String>,
    },

    /// The copy itself did not complete
    #[error("Transfer to '{dst}' failed: {source}")]
    TransferFailed {
        dst: String,
        #[source]
        source: TransportFault,
    },
}

/// Result type alias using ferrisconf's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Error tag the device uses when the datastore is locked by someone else.
const LOCK_DENIED_TAG: &str = "lock-denied";
/// Error tag and message the device uses when an unlock is refused.
const UNLOCK_FAILED_TAG: &str = "operation-failed";
const UNLOCK_FAILED_MESSAGE: &str = "Unlock Failed";

/// Translate a fault raised during an RPC exchange.
///
/// This is the single reclassification point for everything that runs over
/// an established session: RPC dispatch, lock/unlock, close and the remote
/// inspection calls made by file copy.
pub fn classify(fault: TransportFault) -> Error {
    match fault {
        TransportFault::Rpc(info) => classify_rpc_error(info).into(),
        TransportFault::Timeout(timeout) => RpcError::Timeout(timeout).into(),
        fault @ (TransportFault::Disconnected | TransportFault::Io(_)) => closed(fault),
        TransportFault::Malformed(message) => RpcError::MalformedReply { message }.into(),
        TransportFault::Authentication { user } => {
            ConnectionError::AuthenticationFailed { user }.into()
        }
        TransportFault::NameResolution { host, source } => {
            ConnectionError::UnknownHost { host, source }.into()
        }
        TransportFault::MissingCapability { capability } => {
            ConnectionError::ExtensionNotInstalled { capability }.into()
        }
        fault @ (TransportFault::Ssh(_) | TransportFault::HostKey { .. }) => {
            ConnectionError::Ssh(fault).into()
        }
        fault @ TransportFault::Other(_) => closed(fault),
    }
}

/// Translate a fault raised while opening a session.
///
/// Authentication, SSH, name resolution and capability faults keep their
/// own classification; everything else becomes [`ConnectionError::Failed`].
pub fn classify_connect(fault: TransportFault, host: &str, port: u16) -> Error {
    match fault {
        fault @ (TransportFault::Authentication { .. }
        | TransportFault::Ssh(_)
        | TransportFault::HostKey { .. }
        | TransportFault::NameResolution { .. }
        | TransportFault::MissingCapability { .. }) => classify(fault),
        other => ConnectionError::Failed {
            host: host.to_string(),
            port,
            message: other.to_string(),
            source: Some(other),
        }
        .into(),
    }
}

fn closed(fault: TransportFault) -> Error {
    ConnectionError::Closed {
        reason: fault.to_string(),
        source: Some(fault),
    }
    .into()
}

fn classify_rpc_error(info: RpcErrorInfo) -> RpcError {
    if info.tag == LOCK_DENIED_TAG {
        RpcError::LockConflict(info)
    } else if info.tag == UNLOCK_FAILED_TAG
        && info.message.as_deref().map(str::trim) == Some(UNLOCK_FAILED_MESSAGE)
    {
        RpcError::UnlockConflict(info)
    } else {
        RpcError::Rpc(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_error(tag: &str, message: Option<&str>) -> RpcErrorInfo {
        RpcErrorInfo {
            tag: tag.to_string(),
            message: message.map(str::to_string),
            ..RpcErrorInfo::default()
        }
    }

    #[test]
    fn test_lock_denied_is_lock_conflict() {
        let err = classify(TransportFault::Rpc(rpc_error("lock-denied", None)));
        assert!(matches!(err, Error::Rpc(RpcError::LockConflict(_))));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unlock_failed_is_unlock_conflict() {
        let err = classify(TransportFault::Rpc(rpc_error(
            "operation-failed",
            Some("Unlock Failed"),
        )));
        assert!(matches!(err, Error::Rpc(RpcError::UnlockConflict(_))));

        // Same tag with another message stays generic
        let err = classify(TransportFault::Rpc(rpc_error(
            "operation-failed",
            Some("something else"),
        )));
        assert!(matches!(err, Error::Rpc(RpcError::Rpc(_))));
    }

    #[test]
    fn test_other_rpc_error_is_generic() {
        let err = classify(TransportFault::Rpc(rpc_error("invalid-value", Some("bad"))));
        match err {
            Error::Rpc(RpcError::Rpc(info)) => {
                assert_eq!(info.tag, "invalid-value");
                assert_eq!(info.message.as_deref(), Some("bad"));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn test_timeout_and_disconnect() {
        let err = classify(TransportFault::Timeout(Duration::from_secs(30)));
        assert!(err.is_timeout());

        let err = classify(TransportFault::Disconnected);
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::Closed { .. })
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_connect() {
        let err = classify_connect(
            TransportFault::Authentication {
                user: "admin".to_string(),
            },
            "sw1",
            830,
        );
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::AuthenticationFailed { .. })
        ));

        let err = classify_connect(
            TransportFault::NameResolution {
                host: "sw1".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such host"),
            },
            "sw1",
            830,
        );
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::UnknownHost { .. })
        ));

        let err = classify_connect(
            TransportFault::MissingCapability {
                capability: "urn:ietf:params:netconf:base:1.0".to_string(),
            },
            "sw1",
            830,
        );
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::ExtensionNotInstalled { .. })
        ));

        // Anything else while connecting is a generic connection failure
        let err = classify_connect(TransportFault::Timeout(Duration::from_secs(5)), "sw1", 830);
        match err {
            Error::Connection(ConnectionError::Failed { host, port, .. }) => {
                assert_eq!(host, "sw1");
                assert_eq!(port, 830);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn test_classified_faults_keep_their_source() {
        use std::error::Error as _;

        let err = classify(TransportFault::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "pipe",
        )));
        match &err {
            Error::Connection(ConnectionError::Closed { reason, source }) => {
                assert_eq!(reason, "I/O error: pipe");
                assert!(matches!(source, Some(TransportFault::Io(_))));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
        let inner = err.source().and_then(|e| e.source());
        assert!(inner.is_some_and(|e| e.to_string().contains("pipe")));

        let err = classify(TransportFault::Other("channel reset".to_string()));
        assert!(err.source().and_then(|e| e.source()).is_some());

        let err = classify_connect(TransportFault::Timeout(Duration::from_secs(5)), "sw1", 830);
        match &err {
            Error::Connection(ConnectionError::Failed { source, .. }) => {
                assert!(matches!(source, Some(TransportFault::Timeout(_))));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
        assert!(err.source().and_then(|e| e.source()).is_some());
    }

    #[test]
    fn test_error_display_carries_payload() {
        let err: Error = FileTransferError::HashMismatch {
            local: "abc".to_string(),
            remote: Some("def".to_string()),
        }
        .into();
        let text = err.to_string();
        assert!(text.contains("abc"));
        assert!(text.contains("def"));
    }
}
