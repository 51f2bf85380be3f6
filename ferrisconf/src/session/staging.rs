//! Deferred operations committed as one ordered batch.

use std::fmt;
use std::str::FromStr;

use crate::error::StagingError;
use crate::rpc::{Datastore, Operation, Payload};

/// The six kinds of operation that can be staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    EditConfig,
    Action,
    CliConfig,
    CliDisplay,
    Save,
    Rollback,
}

impl OperationKind {
    /// Every stageable kind.
    pub const ALL: [OperationKind; 6] = [
        OperationKind::EditConfig,
        OperationKind::Action,
        OperationKind::CliConfig,
        OperationKind::CliDisplay,
        OperationKind::Save,
        OperationKind::Rollback,
    ];

    /// Canonical name, e.g. `edit-config`.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::EditConfig => "edit-config",
            OperationKind::Action => "action",
            OperationKind::CliConfig => "cli-config",
            OperationKind::CliDisplay => "cli-display",
            OperationKind::Save => "save",
            OperationKind::Rollback => "rollback",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = StagingError;

    /// Accepts the canonical dashed names and their underscore spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('_', "-");
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| StagingError::InvalidKind {
                kind: s.to_string(),
            })
    }
}

/// A `(kind, payload)` pair waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedOperation {
    kind: OperationKind,
    payload: Payload,
    operation: Operation,
}

impl StagedOperation {
    /// Build the operation the payload will dispatch. Any payload shape is
    /// accepted: CLI kinds take a structured payload as a single command of
    /// its markup, and `save`/`rollback` take the rendered payload as the
    /// file name. Edits always target the running datastore.
    pub fn new(kind: OperationKind, payload: Payload) -> Self {
        let operation = match kind {
            OperationKind::EditConfig => Operation::EditConfig {
                target: Datastore::Running,
                config: payload.clone(),
            },
            OperationKind::Action => Operation::Action(payload.clone()),
            OperationKind::CliConfig => Operation::CliConfig(commands(&payload)),
            OperationKind::CliDisplay => Operation::CliDisplay(commands(&payload)),
            OperationKind::Save => {
                let filename = payload.render();
                let filename = filename.trim();
                Operation::Save {
                    filename: (!filename.is_empty()).then(|| filename.to_string()),
                }
            }
            OperationKind::Rollback => Operation::Rollback {
                filename: payload.render().trim().to_string(),
            },
        };

        Self {
            kind,
            payload,
            operation,
        }
    }

    /// The operation kind.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The payload as staged.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The operation dispatched when the queue is committed.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Markup for structured payloads, text unchanged.
    pub fn render(&self) -> String {
        self.payload.render()
    }
}

fn commands(payload: &Payload) -> Vec<String> {
    match payload {
        Payload::Commands(commands) => commands.clone(),
        other => vec![other.render()],
    }
}

/// Ordered queue of staged operations.
///
/// Entries are appended by staging and drained by a commit. A commit takes
/// the whole queue; if it fails, every entry is put back, so the queue is
/// either emptied by a fully successful pass or left as it was.
#[derive(Debug, Clone, Default)]
pub struct StagingQueue {
    entries: Vec<StagedOperation>,
}

impl StagingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&mut self, entry: StagedOperation) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, StagedOperation> {
        self.entries.iter()
    }

    /// Rendered payloads in submission order.
    ///
    /// The iterator is lazy and `Clone`, so it can be walked again.
    pub fn renderings(&self) -> impl Iterator<Item = String> + Clone + '_ {
        self.entries.iter().map(StagedOperation::render)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Take every entry for a commit, leaving the queue empty.
    pub(crate) fn take(&mut self) -> Vec<StagedOperation> {
        std::mem::take(&mut self.entries)
    }

    /// Put back entries taken by a failed commit, ahead of anything staged
    /// since.
    pub(crate) fn restore(&mut self, mut entries: Vec<StagedOperation>) {
        entries.append(&mut self.entries);
        self.entries = entries;
    }
}

impl<'a> IntoIterator for &'a StagingQueue {
    type Item = &'a StagedOperation;
    type IntoIter = std::slice::Iter<'a, StagedOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::XmlElement;

    #[test]
    fn test_kind_parsing() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
        assert_eq!(
            "edit_config".parse::<OperationKind>().unwrap(),
            OperationKind::EditConfig
        );
        assert_eq!(
            "cli_display".parse::<OperationKind>().unwrap(),
            OperationKind::CliDisplay
        );

        let err = "get".parse::<OperationKind>().unwrap_err();
        assert!(matches!(err, StagingError::InvalidKind { ref kind } if kind == "get"));
        assert!("commit".parse::<OperationKind>().is_err());
        assert!("".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_edit_config_targets_running() {
        let entry =
            StagedOperation::new(OperationKind::EditConfig, XmlElement::new("top").into());
        assert!(matches!(
            entry.operation(),
            Operation::EditConfig {
                target: Datastore::Running,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_text_becomes_single_command() {
        let entry = StagedOperation::new(OperationKind::CliDisplay, "display run".into());
        assert_eq!(
            entry.operation(),
            &Operation::CliDisplay(vec!["display run".to_string()])
        );

        let entry = StagedOperation::new(
            OperationKind::CliConfig,
            Payload::from(&["interface vlan 10", "description uplink"][..]),
        );
        assert_eq!(
            entry.operation(),
            &Operation::CliConfig(vec![
                "interface vlan 10".to_string(),
                "description uplink".to_string()
            ])
        );
    }

    #[test]
    fn test_save_and_rollback_filenames() {
        let save = StagedOperation::new(OperationKind::Save, "".into());
        assert_eq!(save.operation(), &Operation::Save { filename: None });

        let save = StagedOperation::new(OperationKind::Save, "backup.cfg".into());
        assert_eq!(
            save.operation(),
            &Operation::Save {
                filename: Some("backup.cfg".to_string())
            }
        );

        let rollback =
            StagedOperation::new(OperationKind::Rollback, "flash:/backup.cfg".into());
        assert_eq!(
            rollback.operation(),
            &Operation::Rollback {
                filename: "flash:/backup.cfg".to_string()
            }
        );
    }

    #[test]
    fn test_any_payload_shape_is_accepted() {
        let top = XmlElement::new("top");
        let mut queue = StagingQueue::new();
        for kind in OperationKind::ALL {
            queue.push(StagedOperation::new(kind, top.clone().into()));
        }
        assert_eq!(queue.len(), 6);

        let operations: Vec<&Operation> = queue.iter().map(StagedOperation::operation).collect();
        assert_eq!(
            operations[2],
            &Operation::CliConfig(vec!["<top/>".to_string()])
        );
        assert_eq!(
            operations[4],
            &Operation::Save {
                filename: Some("<top/>".to_string())
            }
        );
        assert_eq!(
            operations[5],
            &Operation::Rollback {
                filename: "<top/>".to_string()
            }
        );

        let entry = StagedOperation::new(
            OperationKind::EditConfig,
            Payload::Commands(vec!["vlan 10".to_string()]),
        );
        assert_eq!(entry.render(), "vlan 10");
    }

    #[test]
    fn test_take_and_restore() {
        let mut queue = StagingQueue::new();
        queue.push(StagedOperation::new(OperationKind::CliDisplay, "one".into()));
        queue.push(StagedOperation::new(OperationKind::CliDisplay, "two".into()));

        let taken = queue.take();
        assert!(queue.is_empty());

        queue.push(StagedOperation::new(OperationKind::CliDisplay, "three".into()));
        queue.restore(taken);

        let order: Vec<String> = queue.renderings().collect();
        assert_eq!(order, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_renderings_restartable() {
        let mut queue = StagingQueue::new();
        queue.push(StagedOperation::new(
            OperationKind::EditConfig,
            XmlElement::new("top").into(),
        ));
        queue.push(StagedOperation::new(OperationKind::CliDisplay, "display run".into()));

        let renderings = queue.renderings();
        let first: Vec<String> = renderings.clone().collect();
        let second: Vec<String> = renderings.collect();
        assert_eq!(first, vec!["<top/>", "display run"]);
        assert_eq!(first, second);
    }
}
