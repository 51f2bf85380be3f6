//! Session connection configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Default NETCONF-over-SSH port.
pub const DEFAULT_PORT: u16 = 830;

/// Default timeout applied to connecting and to every RPC.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// NETCONF 1.0 base capability.
pub const BASE_CAPABILITY_1_0: &str = "urn:ietf:params:netconf:base:1.0";

/// NETCONF 1.1 base capability (chunked framing).
pub const BASE_CAPABILITY_1_1: &str = "urn:ietf:params:netconf:base:1.1";

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    AcceptNew,

    /// Accept all keys without checking. Switches are usually provisioned
    /// with throwaway keys, so this is the default.
    #[default]
    Disabled,
}

/// Connection configuration shared by the NETCONF session and the
/// secure copy channel.
///
/// Only password authentication is ever offered: no agent, no key files.
#[derive(Deserialize)]
pub struct SessionConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// NETCONF port (default: 830).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Password for authentication.
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,

    /// Timeout for connecting and for every RPC reply.
    #[serde(default = "default_timeout", deserialize_with = "deserialize_secs")]
    pub timeout: Duration,

    /// Host key verification mode.
    #[serde(default)]
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    /// Capabilities the device must advertise in its hello.
    #[serde(default = "default_capabilities")]
    pub required_capabilities: Vec<String>,
}

impl SessionConfig {
    /// Create a configuration with default port, timeout and capabilities.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: SecretString::from(password.into()),
            timeout: DEFAULT_TIMEOUT,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            required_capabilities: default_capabilities(),
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Clone for SessionConfig {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: SecretString::from(self.password.expose_secret().to_owned()),
            timeout: self.timeout,
            host_key_verification: self.host_key_verification.clone(),
            known_hosts_path: self.known_hosts_path.clone(),
            required_capabilities: self.required_capabilities.clone(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("host_key_verification", &self.host_key_verification)
            .field("known_hosts_path", &self.known_hosts_path)
            .field("required_capabilities", &self.required_capabilities)
            .finish()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_capabilities() -> Vec<String> {
    vec![BASE_CAPABILITY_1_0.to_string()]
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn deserialize_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("sw1", "admin", "secret");
        assert_eq!(config.port, 830);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.host_key_verification, HostKeyVerification::Disabled);
        assert_eq!(config.required_capabilities, vec![BASE_CAPABILITY_1_0]);
        assert_eq!(config.socket_addr(), "sw1:830");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"host": "10.1.1.1", "username": "admin", "password": "secret"}"#,
        )
        .unwrap();
        assert_eq!(config.port, 830);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.password.expose_secret(), "secret");
    }

    #[test]
    fn test_deserialize_overrides() {
        let config: SessionConfig = serde_json::from_str(
            r#"{
                "host": "sw1",
                "port": 2830,
                "username": "admin",
                "password": "secret",
                "timeout": 90,
                "host_key_verification": "accept-new",
                "required_capabilities": ["urn:ietf:params:netconf:base:1.1"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, 2830);
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(config.host_key_verification, HostKeyVerification::AcceptNew);
        assert_eq!(config.required_capabilities, vec![BASE_CAPABILITY_1_1]);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SessionConfig::new("sw1", "admin", "hunter2");
        let text = format!("{config:?}");
        assert!(!text.contains("hunter2"));
        assert!(text.contains("<redacted>"));
        assert_eq!(config.clone().password.expose_secret(), "hunter2");
    }
}
