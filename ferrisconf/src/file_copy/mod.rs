//! Verified file transfer to the device file system.
//!
//! [`FileCopy`] pushes a local file over a secure copy channel after
//! checking that the file is readable, that the remote directory exists and
//! that the device has room for it. Once the copy completes, the local MD5
//! digest is compared with one computed by the device; any difference fails
//! the transfer.
//!
//! Remote inspection (directory lookup, free space, digests) goes through
//! the [`Session`]; only the bytes travel over the copy channel.

pub mod scp;

pub use scp::{ScpChannel, ScpConnector};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{debug, warn};
use md5::{Digest, Md5};
use regex::Regex;
use tokio::io::AsyncReadExt;

use crate::error::{FileTransferError, Result};
use crate::rpc::{ACTION_NAMESPACE, DATA_NAMESPACE, Filter, XmlElement};
use crate::session::Session;
use crate::transport::{Connector, SessionConfig, SshConnector, TransportFault};

/// Directory used when no destination is given.
pub const DEFAULT_REMOTE_DIR: &str = "flash:/";

/// SSH port for the secure copy channel.
pub const DEFAULT_COPY_PORT: u16 = 22;

/// Read size when hashing local files.
const DIGEST_BLOCK_SIZE: usize = 8192;

/// Trailer of a Comware `dir` listing, e.g. `(742,204 KB free)`.
static FREE_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([0-9][0-9,]*) KB free\)").expect("free-space pattern is valid")
});

/// An open secure copy channel.
pub trait CopyChannel: Send {
    /// Copy a local file to a remote path.
    fn put(
        &mut self,
        local: &Path,
        remote: &str,
    ) -> impl Future<Output = std::result::Result<(), TransportFault>> + Send;

    /// Close the channel.
    fn close(self) -> impl Future<Output = std::result::Result<(), TransportFault>> + Send;
}

/// Opens secure copy channels with the session's credentials.
pub trait CopyConnector: Send + Sync {
    /// The channel type produced.
    type Channel: CopyChannel;

    /// Connect and authenticate on `port`.
    fn open(
        &self,
        config: &SessionConfig,
        port: u16,
    ) -> impl Future<Output = std::result::Result<Self::Channel, TransportFault>> + Send;
}

/// One file transfer to a device.
///
/// # Example
///
/// ```rust,no_run
/// use ferrisconf::{FileCopy, Session, SessionConfig};
///
/// # async fn example() -> Result<(), ferrisconf::Error> {
/// let mut session = Session::new(SessionConfig::new("192.168.1.1", "admin", "secret"));
/// session.open().await?;
///
/// let mut copy = FileCopy::new(&mut session, "images/firmware.ipe");
/// if !copy.file_already_exists().await {
///     copy.transfer_file().await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct FileCopy<'a, C: Connector = SshConnector, S: CopyConnector = ScpConnector> {
    session: &'a mut Session<C>,
    copier: S,
    src: PathBuf,
    dst: String,
    remote_dir: String,
    port: u16,
    remote_dir_exists: Option<bool>,
}

impl<'a, C: Connector> FileCopy<'a, C> {
    /// Copy `src` to `flash:/<file name>` over SCP.
    pub fn new(session: &'a mut Session<C>, src: impl Into<PathBuf>) -> Self {
        Self::with_copier(session, src, ScpConnector)
    }
}

impl<'a, C: Connector, S: CopyConnector> FileCopy<'a, C, S> {
    /// Copy `src` with a custom copy collaborator.
    pub fn with_copier(session: &'a mut Session<C>, src: impl Into<PathBuf>, copier: S) -> Self {
        let src = src.into();
        let name = src
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            session,
            copier,
            dst: format!("{DEFAULT_REMOTE_DIR}{name}"),
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            src,
            port: DEFAULT_COPY_PORT,
            remote_dir_exists: None,
        }
    }

    /// Set the remote destination path. The remote directory becomes its
    /// prefix up to the last `/`.
    pub fn with_destination(mut self, dst: impl Into<String>) -> Self {
        let dst = dst.into();
        self.remote_dir = remote_dir_of(&dst);
        self.dst = dst;
        self.remote_dir_exists = None;
        self
    }

    /// Set the SSH port of the copy channel (default: 22).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn src(&self) -> &Path {
        &self.src
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Free bytes in the remote directory, or 0 if the device's listing
    /// cannot be parsed.
    pub async fn remote_capacity(&mut self) -> Result<u64> {
        let output = self
            .session
            .cli_display([format!("dir {}", self.remote_dir)])
            .await?;
        let available = parse_free_space(&output);
        debug!("{} has {} bytes free", self.remote_dir, available);
        Ok(available)
    }

    /// Fail with not-enough-space if the local file exceeds the remote free
    /// space.
    pub async fn enough_space(&mut self) -> Result<()> {
        let required = tokio::fs::metadata(&self.src)
            .await
            .map_err(|source| FileTransferError::NotReadable {
                path: self.src.clone(),
                source,
            })?
            .len();
        let available = self.remote_capacity().await?;
        check_space(required, available)?;
        Ok(())
    }

    /// MD5 hex digest of the local file.
    pub async fn local_digest(&self) -> Result<String> {
        let digest = file_md5(&self.src)
            .await
            .map_err(|source| FileTransferError::NotReadable {
                path: self.src.clone(),
                source,
            })?;
        Ok(digest)
    }

    /// MD5 hex digest of the destination file computed by the device, if
    /// the device reports one.
    pub async fn remote_digest(&mut self) -> Result<Option<String>> {
        let reply = self.session.action(md5_request(&self.dst)).await?;
        Ok(reply
            .root()
            .find_text("md5sum")
            .filter(|digest| !digest.is_empty())
            .map(str::to_ascii_lowercase))
    }

    /// Whether the remote directory exists. Looked up once and cached.
    pub async fn remote_dir_exists(&mut self) -> Result<bool> {
        if let Some(exists) = self.remote_dir_exists {
            return Ok(exists);
        }

        let reply = self
            .session
            .get(Filter::Subtree(file_request(DATA_NAMESPACE, &self.remote_dir)))
            .await?;
        let exists = reply.data().and_then(|data| data.find("File")).is_some();
        debug!("remote directory {} exists: {}", self.remote_dir, exists);
        self.remote_dir_exists = Some(exists);
        Ok(exists)
    }

    /// Whether the destination already holds the same content.
    ///
    /// False whenever the remote directory is missing or a digest cannot be
    /// obtained; lookup failures are logged, never returned.
    pub async fn file_already_exists(&mut self) -> bool {
        match self.remote_dir_exists().await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!("cannot check remote directory {}: {}", self.remote_dir, e);
                return false;
            }
        }

        let local = match self.local_digest().await {
            Ok(digest) => digest,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };

        match self.remote_digest().await {
            Ok(Some(remote)) => remote == local,
            Ok(None) => false,
            Err(e) => {
                warn!("cannot get digest of {}, treating as absent: {}", self.dst, e);
                false
            }
        }
    }

    /// Check readability, remote directory and free space.
    ///
    /// Free space is only checked when the file is not already present.
    pub async fn safety_checks(&mut self) -> Result<()> {
        tokio::fs::File::open(&self.src)
            .await
            .map_err(|source| FileTransferError::NotReadable {
                path: self.src.clone(),
                source,
            })?;

        if !self.remote_dir_exists().await? {
            return Err(FileTransferError::RemoteDirMissing {
                dir: self.remote_dir.clone(),
            }
            .into());
        }

        if !self.file_already_exists().await {
            self.enough_space().await?;
        }
        Ok(())
    }

    /// Copy the file and verify its digest on the device.
    ///
    /// A copy that does not complete fails with transfer-failed; a copy
    /// whose remote digest differs fails with hash-mismatch. Nothing is
    /// retried.
    pub async fn transfer_file(&mut self) -> Result<()> {
        self.safety_checks().await?;

        debug!(
            "copying {} to {}:{}",
            self.src.display(),
            self.session.config().host,
            self.dst
        );
        let mut channel = self
            .copier
            .open(self.session.config(), self.port)
            .await
            .map_err(|source| transfer_failed(&self.dst, source))?;

        if let Err(source) = channel.put(&self.src, &self.dst).await {
            if let Err(e) = channel.close().await {
                debug!("closing copy channel after failed put: {}", e);
            }
            return Err(transfer_failed(&self.dst, source).into());
        }
        channel
            .close()
            .await
            .map_err(|source| transfer_failed(&self.dst, source))?;

        let local = self.local_digest().await?;
        let remote = match self.remote_digest().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!("cannot get digest of {} after copy: {}", self.dst, e);
                None
            }
        };

        if remote.as_deref() != Some(local.as_str()) {
            return Err(FileTransferError::HashMismatch { local, remote }.into());
        }

        debug!("{} verified ({})", self.dst, local);
        Ok(())
    }

    /// Create the remote directory. The cached existence check is dropped
    /// so the next check asks the device again.
    pub async fn create_remote_dir(&mut self) -> Result<()> {
        self.session.action(mkdir_request(&self.remote_dir)).await?;
        self.remote_dir_exists = None;
        debug!("created remote directory {}", self.remote_dir);
        Ok(())
    }
}

/// Fail if `required` bytes do not fit in `available`.
pub fn check_space(required: u64, available: u64) -> std::result::Result<(), FileTransferError> {
    if required > available {
        return Err(FileTransferError::NotEnoughSpace {
            required,
            available,
        });
    }
    Ok(())
}

/// Free bytes reported on the last line of a `dir` listing, e.g.
/// `1046512 KB total (742204 KB free)`. Returns 0 for anything else.
pub fn parse_free_space(output: &str) -> u64 {
    let Some(last) = output.lines().rev().find(|line| !line.trim().is_empty()) else {
        return 0;
    };

    FREE_SPACE
        .captures(last)
        .and_then(|caps| caps[1].replace(',', "").parse::<u64>().ok())
        .map(|kb| kb.saturating_mul(1000))
        .unwrap_or(0)
}

async fn file_md5(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; DIGEST_BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn remote_dir_of(dst: &str) -> String {
    match dst.rfind('/').or_else(|| dst.rfind(':')) {
        Some(index) => dst[..=index].to_string(),
        None => DEFAULT_REMOTE_DIR.to_string(),
    }
}

fn transfer_failed(dst: &str, source: TransportFault) -> FileTransferError {
    FileTransferError::TransferFailed {
        dst: dst.to_string(),
        source,
    }
}

/// `top/FileSystem/Files/File/SrcName` in the given namespace.
fn file_request(namespace: &str, name: &str) -> XmlElement {
    file_operation(namespace, name, None)
}

fn md5_request(name: &str) -> XmlElement {
    file_operation(ACTION_NAMESPACE, name, Some("md5sum"))
}

fn mkdir_request(dir: &str) -> XmlElement {
    file_operation(ACTION_NAMESPACE, dir, Some("MkDir"))
}

fn file_operation(namespace: &str, name: &str, operation: Option<&str>) -> XmlElement {
    let mut file = XmlElement::new("File").with_child(XmlElement::new("SrcName").with_text(name));
    if let Some(operation) = operation {
        file.push(XmlElement::new("Operations").with_child(XmlElement::new(operation)));
    }

    XmlElement::new("top").with_namespace(namespace).with_child(
        XmlElement::new("FileSystem").with_child(XmlElement::new("Files").with_child(file)),
    )
}
