//! NETCONF operations and replies.
//!
//! [`Operation`] is the closed set of requests a session can dispatch. Each
//! variant renders to the body of a single `<rpc>` element, including the
//! Comware extensions (`action`, `save`, `rollback`, `CLI`).

mod reply;
pub mod xml;

pub use reply::{RpcErrorInfo, RpcReply};
pub use xml::{XmlElement, XmlError};

use std::fmt;

use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};

/// NETCONF base namespace used on `<rpc>` and `<hello>`.
pub const BASE_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Namespace for Comware `<action>` payloads.
pub const ACTION_NAMESPACE: &str = "http://www.hp.com/netconf/action:1.0";

/// Namespace for Comware `<get>` data payloads.
pub const DATA_NAMESPACE: &str = "http://www.hp.com/netconf/data:1.0";

/// Namespace for Comware `<edit-config>` payloads.
pub const CONFIG_NAMESPACE: &str = "http://www.hp.com/netconf/config:1.0";

/// Configuration datastore targeted by lock and edit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    #[default]
    Running,
    Candidate,
    Startup,
}

impl Datastore {
    /// Element name of the datastore inside `<target>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Datastore::Running => "running",
            Datastore::Candidate => "candidate",
            Datastore::Startup => "startup",
        }
    }
}

impl fmt::Display for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a configuration request or staged operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Structured configuration fragment.
    Element(XmlElement),
    /// Raw text: pre-rendered markup, a file name, or a single command.
    Text(String),
    /// A sequence of CLI commands.
    Commands(Vec<String>),
}

impl Payload {
    /// Human readable rendering: markup for elements, text unchanged,
    /// commands one per line.
    pub fn render(&self) -> String {
        match self {
            Payload::Element(element) => element.to_xml(),
            Payload::Text(text) => text.clone(),
            Payload::Commands(commands) => commands.join("\n"),
        }
    }
}

impl From<XmlElement> for Payload {
    fn from(element: XmlElement) -> Self {
        Payload::Element(element)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<String>> for Payload {
    fn from(commands: Vec<String>) -> Self {
        Payload::Commands(commands)
    }
}

impl From<&[&str]> for Payload {
    fn from(commands: &[&str]) -> Self {
        Payload::Commands(commands.iter().map(|c| c.to_string()).collect())
    }
}

/// Filter for `<get>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Subtree filter.
    Subtree(XmlElement),
    /// XPath expression.
    XPath(String),
    /// No filter: the whole datastore.
    All,
}

/// A request the session can dispatch under the configuration lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `<edit-config>` against a datastore.
    EditConfig { target: Datastore, config: Payload },
    /// `<get>` of operational and configuration data.
    Get(Filter),
    /// Comware `<action>`.
    Action(Payload),
    /// Comware `<save>` of the running configuration; `None` uses the
    /// device's startup file.
    Save { filename: Option<String> },
    /// Comware `<rollback>` to a saved configuration file.
    Rollback { filename: String },
    /// Comware `<CLI><Execution>`: display commands.
    CliDisplay(Vec<String>),
    /// Comware `<CLI><Configuration>`: configuration commands.
    CliConfig(Vec<String>),
}

impl Operation {
    /// RPC element name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::EditConfig { .. } => "edit-config",
            Operation::Get(_) => "get",
            Operation::Action(_) => "action",
            Operation::Save { .. } => "save",
            Operation::Rollback { .. } => "rollback",
            Operation::CliDisplay(_) => "cli-display",
            Operation::CliConfig(_) => "cli-config",
        }
    }

    /// Render the content of the `<rpc>` element.
    pub fn to_rpc_body(&self) -> String {
        match self {
            Operation::EditConfig { target, config } => {
                let config = markup(config);
                let config = if is_config_element(&config) {
                    config
                } else {
                    format!("<config>{config}</config>")
                };
                format!(
                    "<edit-config><target><{target}/></target>{config}</edit-config>"
                )
            }
            Operation::Get(Filter::Subtree(filter)) => {
                format!("<get><filter type=\"subtree\">{filter}</filter></get>")
            }
            Operation::Get(Filter::XPath(select)) => format!(
                "<get><filter type=\"xpath\" select=\"{}\"/></get>",
                escape(select.as_str())
            ),
            Operation::Get(Filter::All) => "<get/>".to_string(),
            Operation::Action(payload) => format!("<action>{}</action>", markup(payload)),
            Operation::Save { filename: None } => "<save/>".to_string(),
            Operation::Save {
                filename: Some(filename),
            } => format!("<save><file>{}</file></save>", escape(filename.as_str())),
            Operation::Rollback { filename } => {
                format!("<rollback><file>{}</file></rollback>", escape(filename.as_str()))
            }
            Operation::CliDisplay(commands) => cli_body("Execution", commands),
            Operation::CliConfig(commands) => cli_body("Configuration", commands),
        }
    }
}

/// Render a `<lock>` body.
pub fn lock_body(target: Datastore) -> String {
    format!("<lock><target><{target}/></target></lock>")
}

/// Render an `<unlock>` body.
pub fn unlock_body(target: Datastore) -> String {
    format!("<unlock><target><{target}/></target></unlock>")
}

/// Render a `<close-session>` body.
pub fn close_session_body() -> String {
    "<close-session/>".to_string()
}

/// Payload as embeddable markup. Structured payloads and raw text are
/// already markup; command lists have no markup form and are escaped.
fn markup(payload: &Payload) -> String {
    match payload {
        Payload::Element(element) => element.to_xml(),
        Payload::Text(text) => text.clone(),
        Payload::Commands(commands) => escape(commands.join("\n").as_str()).into_owned(),
    }
}

fn is_config_element(markup: &str) -> bool {
    let trimmed = markup.trim_start();
    trimmed.starts_with("<config>")
        || trimmed.starts_with("<config ")
        || trimmed.starts_with("<config/>")
}

fn cli_body(mode: &str, commands: &[String]) -> String {
    format!(
        "<CLI><{mode}>{}</{mode}></CLI>",
        escape(commands.join("\n").as_str())
    )
}
