//! NETCONF-over-SSH transport implementation using russh.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::config::{BASE_CAPABILITY_1_0, BASE_CAPABILITY_1_1, HostKeyVerification, SessionConfig};
use super::framing::{self, FrameDecoder, Framing};
use super::{Connector, RpcTransport, TransportFault};
use crate::rpc::{self, BASE_NAMESPACE, Datastore, Operation, RpcReply, XmlElement};

/// SSH subsystem name for NETCONF.
const NETCONF_SUBSYSTEM: &str = "netconf";

/// Connector that opens NETCONF sessions over SSH.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

impl Connector for SshConnector {
    type Transport = NetconfTransport;

    async fn connect(&self, config: &SessionConfig) -> Result<NetconfTransport, TransportFault> {
        NetconfTransport::connect(config).await
    }
}

/// NETCONF session over an SSH `netconf` subsystem channel.
pub struct NetconfTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// The subsystem channel carrying NETCONF messages.
    channel: Channel<Msg>,

    /// Received bytes awaiting a complete frame.
    decoder: FrameDecoder,

    /// Reply timeout for every RPC.
    timeout: Duration,

    /// Last `message-id` sent.
    message_id: u64,

    /// Capabilities from the server hello.
    server_capabilities: Vec<String>,

    /// `session-id` from the server hello.
    session_id: Option<String>,

    /// Set once `close_session` ran or the channel ended.
    closed: bool,
}

impl NetconfTransport {
    /// Connect, authenticate, open the subsystem and exchange hellos.
    pub async fn connect(config: &SessionConfig) -> Result<Self, TransportFault> {
        let session = connect_ssh(config, config.port).await?;

        let channel = session.channel_open_session().await?;
        channel.request_subsystem(true, NETCONF_SUBSYSTEM).await?;

        let mut transport = Self {
            session,
            channel,
            decoder: FrameDecoder::new(),
            timeout: config.timeout,
            message_id: 0,
            server_capabilities: Vec::new(),
            session_id: None,
            closed: false,
        };

        transport.exchange_hello(&config.required_capabilities).await?;
        Ok(transport)
    }

    /// Capabilities advertised by the device.
    pub fn server_capabilities(&self) -> &[String] {
        &self.server_capabilities
    }

    /// NETCONF session id assigned by the device.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Negotiated framing mode.
    pub fn framing(&self) -> Framing {
        self.decoder.framing()
    }

    async fn exchange_hello(&mut self, required: &[String]) -> Result<(), TransportFault> {
        let hello = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><hello xmlns=\"{BASE_NAMESPACE}\">\
             <capabilities><capability>{BASE_CAPABILITY_1_0}</capability>\
             <capability>{BASE_CAPABILITY_1_1}</capability></capabilities></hello>"
        );
        self.send(&hello).await?;

        let reply = self.read_message().await?;
        trace!("server hello: {}", reply);
        let root = XmlElement::parse(&reply).map_err(|e| TransportFault::Malformed(e.to_string()))?;
        if root.local_name() != "hello" {
            return Err(TransportFault::Malformed(format!(
                "expected <hello>, got <{}>",
                root.name()
            )));
        }

        self.server_capabilities = root
            .find_all("capability")
            .iter()
            .filter_map(|c| c.text())
            .map(|c| c.trim().to_string())
            .collect();
        self.session_id = root.find_text("session-id").map(str::to_string);

        if let Some(missing) = required
            .iter()
            .find(|cap| !self.server_capabilities.iter().any(|s| s == *cap))
        {
            return Err(TransportFault::MissingCapability {
                capability: missing.clone(),
            });
        }

        if self
            .server_capabilities
            .iter()
            .any(|c| c == BASE_CAPABILITY_1_1)
        {
            self.decoder.set_framing(Framing::Chunked);
        }

        debug!(
            "NETCONF session {} established ({:?} framing, {} capabilities)",
            self.session_id.as_deref().unwrap_or("?"),
            self.decoder.framing(),
            self.server_capabilities.len()
        );
        Ok(())
    }

    async fn send(&mut self, message: &str) -> Result<(), TransportFault> {
        let frame = framing::encode(message, self.decoder.framing());
        self.channel.data(&frame[..]).await.map_err(|e| match e {
            russh::Error::SendError | russh::Error::Disconnect => TransportFault::Disconnected,
            other => TransportFault::Ssh(other),
        })
    }

    async fn read_message(&mut self) -> Result<String, TransportFault> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if let Some(message) = self
                .decoder
                .next_message()
                .map_err(TransportFault::Malformed)?
            {
                return Ok(message);
            }

            match tokio::time::timeout_at(deadline, self.channel.wait()).await {
                Err(_) => return Err(TransportFault::Timeout(self.timeout)),
                Ok(None) | Ok(Some(ChannelMsg::Eof)) | Ok(Some(ChannelMsg::Close)) => {
                    self.closed = true;
                    return Err(TransportFault::Disconnected);
                }
                Ok(Some(ChannelMsg::Data { data })) => self.decoder.extend(&data[..]),
                Ok(Some(ChannelMsg::ExtendedData { data, .. })) => {
                    warn!("netconf stderr: {}", String::from_utf8_lossy(&data[..]));
                }
                Ok(Some(_)) => {}
            }
        }
    }

    /// Send one `<rpc>` and wait for the matching `<rpc-reply>`.
    async fn rpc(&mut self, body: String) -> Result<RpcReply, TransportFault> {
        if !self.is_connected() {
            return Err(TransportFault::Disconnected);
        }

        self.message_id += 1;
        let id = self.message_id.to_string();
        let message = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <rpc message-id=\"{id}\" xmlns=\"{BASE_NAMESPACE}\">{body}</rpc>"
        );
        trace!("rpc >> {}", message);
        self.send(&message).await?;

        loop {
            let raw = self.read_message().await?;
            trace!("rpc << {}", raw);
            let reply =
                RpcReply::parse(raw).map_err(|e| TransportFault::Malformed(e.to_string()))?;

            if reply.root().local_name() != "rpc-reply" {
                debug!("ignoring <{}> while waiting for reply {}", reply.root().name(), id);
                continue;
            }
            if reply.message_id().is_some_and(|m| m != id) {
                debug!(
                    "ignoring reply {} while waiting for {}",
                    reply.message_id().unwrap_or_default(),
                    id
                );
                continue;
            }

            if let Some(error) = reply.first_error() {
                return Err(TransportFault::Rpc(error));
            }
            return Ok(reply);
        }
    }
}

impl RpcTransport for NetconfTransport {
    fn is_connected(&self) -> bool {
        !self.closed && !self.session.is_closed()
    }

    async fn lock(&mut self, target: Datastore) -> Result<RpcReply, TransportFault> {
        self.rpc(rpc::lock_body(target)).await
    }

    async fn unlock(&mut self, target: Datastore) -> Result<RpcReply, TransportFault> {
        self.rpc(rpc::unlock_body(target)).await
    }

    async fn dispatch(&mut self, operation: &Operation) -> Result<RpcReply, TransportFault> {
        self.rpc(operation.to_rpc_body()).await
    }

    async fn close_session(&mut self) -> Result<(), TransportFault> {
        let result = self.rpc(rpc::close_session_body()).await.map(|_| ());
        self.closed = true;

        if let Err(e) = self.channel.close().await {
            debug!("closing netconf channel: {}", e);
        }
        if let Err(e) = self
            .session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            debug!("disconnecting SSH session: {}", e);
        }
        result
    }
}

/// Resolve, connect and password-authenticate an SSH session.
///
/// Shared by the NETCONF transport and the secure copy channel, which
/// connect to different ports with the same credentials.
pub(crate) async fn connect_ssh(
    config: &SessionConfig,
    port: u16,
) -> Result<Handle<SshHandler>, TransportFault> {
    let addr = resolve(&config.host, port).await?;

    let ssh_config = Arc::new(client::Config {
        inactivity_timeout: None,
        ..Default::default()
    });

    let host_key_error: Arc<Mutex<Option<TransportFault>>> = Arc::new(Mutex::new(None));

    let handler = SshHandler {
        host: config.host.clone(),
        port,
        host_key_verification: config.host_key_verification.clone(),
        known_hosts_path: config.known_hosts_path.clone(),
        host_key_error: host_key_error.clone(),
    };

    debug!("connecting to {}:{} ({})", config.host, port, addr);

    // Connect to the server
    let mut session = tokio::time::timeout(config.timeout, client::connect(ssh_config, addr, handler))
        .await
        .map_err(|_| TransportFault::Timeout(config.timeout))?
        .map_err(|e| {
            // If check_server_key stored a detailed error, use that instead
            // of the generic russh::Error::UnknownKey
            match host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
                Some(hk_err) => hk_err,
                None => TransportFault::Ssh(e),
            }
        })?;

    // Authenticate
    let auth = tokio::time::timeout(
        config.timeout,
        session.authenticate_password(&config.username, config.password.expose_secret()),
    )
    .await
    .map_err(|_| TransportFault::Timeout(config.timeout))??;

    if !auth.success() {
        return Err(TransportFault::Authentication {
            user: config.username.clone(),
        });
    }

    Ok(session)
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransportFault> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| TransportFault::NameResolution {
            host: host.to_string(),
            source,
        })?;

    addrs.next().ok_or_else(|| TransportFault::NameResolution {
        host: host.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
    })
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportFault>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err` if the key changed or known_hosts could not be read.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportFault> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportFault::HostKey {
                message: format!(
                    "host key for {}:{} changed (known_hosts line {})",
                    self.host, self.port, line
                ),
            }),
            Err(e) => Err(TransportFault::HostKey {
                message: format!("known_hosts: {e}"),
            }),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportFault> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportFault::HostKey {
            message: format!("known_hosts: {e}"),
        })
    }

    fn reject(&self, fault: TransportFault) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(fault);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    // Unknown host: learn the key
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportFault::HostKey {
                    message: format!("{}:{} is not in known_hosts", self.host, self.port),
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
