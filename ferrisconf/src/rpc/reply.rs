//! Reply type for RPC execution results.

use std::fmt;

use super::xml::{XmlElement, XmlError};

/// Parsed `<rpc-reply>`.
///
/// Returned undecoded by the session; feature code inspects it with
/// [`data`](Self::data) or [`root`](Self::root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReply {
    /// The raw reply document.
    xml: String,

    /// The parsed reply.
    root: XmlElement,
}

impl RpcReply {
    /// Parse a reply document.
    pub fn parse(xml: impl Into<String>) -> Result<Self, XmlError> {
        let xml = xml.into();
        let root = XmlElement::parse(&xml)?;
        Ok(Self { xml, root })
    }

    /// The raw reply document.
    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// The parsed reply root (`rpc-reply`).
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// `message-id` echoed by the device.
    pub fn message_id(&self) -> Option<&str> {
        self.root.attr("message-id")
    }

    /// Whether the reply is a bare `<ok/>`.
    pub fn is_ok(&self) -> bool {
        self.root.child("ok").is_some()
    }

    /// The `<data>` element of a `<get>` reply.
    pub fn data(&self) -> Option<&XmlElement> {
        self.root.child("data")
    }

    /// All `rpc-error` entries, warnings included.
    pub fn errors(&self) -> Vec<RpcErrorInfo> {
        self.root
            .find_all("rpc-error")
            .into_iter()
            .map(RpcErrorInfo::from_element)
            .collect()
    }

    /// First `rpc-error` with severity `error`. Warnings do not fail a call.
    pub fn first_error(&self) -> Option<RpcErrorInfo> {
        self.errors().into_iter().find(RpcErrorInfo::is_error)
    }

    /// Text returned by a `<CLI>` request.
    ///
    /// Comware wraps CLI output in a CDATA block under `CLI/Execution` or
    /// `CLI/Configuration`; this unwraps it into plain lines with `\n`
    /// line endings.
    pub fn cli_text(&self) -> Option<String> {
        let cli = self.root.find("CLI")?;
        let block = cli.child("Execution").or_else(|| cli.child("Configuration"))?;
        Some(block.text().unwrap_or_default().replace("\r\n", "\n"))
    }
}

impl fmt::Display for RpcReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.xml)
    }
}

/// Contents of an `<rpc-error>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcErrorInfo {
    /// `error-tag`, e.g. `lock-denied`.
    pub tag: String,

    /// `error-type`: transport, rpc, protocol or application.
    pub error_type: Option<String>,

    /// `error-severity`: error or warning.
    pub severity: Option<String>,

    /// `error-message`.
    pub message: Option<String>,

    /// `error-path`.
    pub path: Option<String>,

    /// The `<rpc-error>` element as received.
    pub raw: String,
}

impl RpcErrorInfo {
    /// Build from an `<rpc-error>` element.
    pub fn from_element(element: &XmlElement) -> Self {
        let field = |name: &str| element.find_text(name).map(str::to_string);
        Self {
            tag: field("error-tag").unwrap_or_default(),
            error_type: field("error-type"),
            severity: field("error-severity"),
            message: field("error-message"),
            path: field("error-path"),
            raw: element.to_xml(),
        }
    }

    /// Whether this entry fails the request (anything but a warning).
    pub fn is_error(&self) -> bool {
        self.severity.as_deref() != Some("warning")
    }
}

impl fmt::Display for RpcErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc-error '{}'", self.tag)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}
