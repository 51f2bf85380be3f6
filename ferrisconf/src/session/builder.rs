//! Builder for creating sessions.

use std::path::PathBuf;
use std::time::Duration;

use super::Session;
use crate::error::{Error, Result};
use crate::transport::config::{BASE_CAPABILITY_1_0, DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::transport::{Connector, HostKeyVerification, SessionConfig};

/// Builder for constructing sessions.
///
/// # Example
///
/// ```rust,no_run
/// use ferrisconf::SessionBuilder;
///
/// # async fn example() -> Result<(), ferrisconf::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .build()?;
/// session.open().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    password: String,
    timeout: Duration,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    required_capabilities: Vec<String>,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: None,
            password: String::new(),
            timeout: DEFAULT_TIMEOUT,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            required_capabilities: vec![BASE_CAPABILITY_1_0.to_string()],
        }
    }

    /// Set the NETCONF port (default: 830).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password for authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the connect and RPC timeout (default: 30 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Require the device to advertise a capability in its hello.
    pub fn require_capability(mut self, capability: impl Into<String>) -> Self {
        let capability = capability.into();
        if !self.required_capabilities.contains(&capability) {
            self.required_capabilities.push(capability);
        }
        self
    }

    /// Set the host key verification mode (default: disabled).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a specific known_hosts file instead of `~/.ssh/known_hosts`.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Build the session configuration without creating a session.
    pub fn into_config(self) -> Result<SessionConfig> {
        let username = self.username.ok_or_else(|| Error::InvalidConfig {
            message: "Username is required".to_string(),
        })?;

        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "Host is required".to_string(),
            });
        }

        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig {
                message: "Timeout must be greater than zero".to_string(),
            });
        }

        let mut config = SessionConfig::new(self.host, username, self.password);
        config.port = self.port;
        config.timeout = self.timeout;
        config.host_key_verification = self.host_key_verification;
        config.known_hosts_path = self.known_hosts_path;
        config.required_capabilities = self.required_capabilities;
        Ok(config)
    }

    /// Build an SSH session.
    ///
    /// This creates the session but does not connect. Call `open()` on the
    /// returned session to establish the connection.
    pub fn build(self) -> Result<Session> {
        Ok(Session::new(self.into_config()?))
    }

    /// Build a session over a custom connector.
    pub fn build_with<C: Connector>(self, connector: C) -> Result<Session<C>> {
        Ok(Session::with_connector(self.into_config()?, connector))
    }
}
