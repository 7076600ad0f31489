//! Compose file model for `agent-compose.yaml`.
//!
//! Two views over the same file:
//! - [`ComposeDocument`]: a lossless node tree. Every node remembers where it
//!   came from, edits are byte splices, and untouched text (comments, key
//!   order, quoting, blank lines) is written back exactly as read.
//! - [`ComposeFile`]: a typed serde model for read-only queries.
//!
//! The plugin sequence lives at `agents → (first agent) → perception → custom`.
//! Only the first agent, in document order, is considered.

mod document;
mod plugins;
mod types;
mod write;

pub use document::{ComposeDocument, Edit, MapEntry, Node, NodeKind, Scalar, ScalarStyle, SeqItem, Span};
pub use plugins::{EnabledField, MissingTarget, PluginEntry, PluginSequence, SequenceShape};
pub use types::{
    ActiveHours, ComposeAgent, ComposeCron, ComposeFile, ComposeLoop, ComposePaths,
    ComposePerception, PerceptionPlugin,
};
pub use write::{create_backup, write_atomic, BackupInfo};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or persisting a compose file.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("cannot read compose file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed compose file {path}{}: {reason}", line_suffix(.line))]
    Malformed {
        path: PathBuf,
        line: Option<usize>,
        reason: String,
    },

    #[error("cannot write compose file {path}: {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ComposeError {
    /// Path of the file the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ComposeError::Unreadable { path, .. }
            | ComposeError::Malformed { path, .. }
            | ComposeError::Unwritable { path, .. } => path,
        }
    }
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" (line {})", n),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_includes_line() {
        let err = ComposeError::Malformed {
            path: PathBuf::from("agent-compose.yaml"),
            line: Some(7),
            reason: "unexpected indentation".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed compose file agent-compose.yaml (line 7): unexpected indentation"
        );
    }

    #[test]
    fn test_malformed_display_without_line() {
        let err = ComposeError::Malformed {
            path: PathBuf::from("a.yaml"),
            line: None,
            reason: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "malformed compose file a.yaml: bad");
    }
}
