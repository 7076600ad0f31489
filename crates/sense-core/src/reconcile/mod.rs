//! Converge the plugin list of a compose document to a requested state.
//!
//! The reconciler computes the smallest set of text edits that makes the
//! requested plugins enabled or disabled, then applies them in one batch.
//! Untouched entries, comments, and formatting are preserved exactly.

mod apply;

pub use apply::{apply, auto_selection, ApplyOptions, ApplyOutcome, Selection};

use crate::compose::{
    ComposeDocument, ComposeError, Edit, EnabledField, PluginEntry, SequenceShape,
};
use indexmap::IndexSet;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no plugin list to reconcile in {path}: {reason} (add a `perception.custom` list to the first agent)")]
    TargetMissing { path: PathBuf, reason: String },

    #[error("plugins requested for both enable and disable: {}", .names.join(", "))]
    ConflictingRequest { names: Vec<String> },

    #[error("plugin `{name}` in {path} is not a mapping and cannot be edited")]
    UnsupportedEntry { path: PathBuf, name: String },

    #[error(transparent)]
    Document(#[from] ComposeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// `enabled` set to true.
    Enabled,
    /// `enabled` set to false.
    Disabled,
    /// New entry added at the end of the list.
    Appended,
    /// Already in the requested state.
    Unchanged,
    /// Disable requested for a plugin the document does not declare.
    Ignored,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::Enabled => "enabled",
            ChangeKind::Disabled => "disabled",
            ChangeKind::Appended => "appended",
            ChangeKind::Unchanged => "unchanged",
            ChangeKind::Ignored => "ignored",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginChange {
    pub name: String,
    pub kind: ChangeKind,
}

/// What a reconcile pass did, in the order it was decided.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub agent: String,
    pub changes: Vec<PluginChange>,
}

impl ReconcileReport {
    /// True when the document text was (or would be) modified.
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| {
            matches!(
                c.kind,
                ChangeKind::Enabled | ChangeKind::Disabled | ChangeKind::Appended
            )
        })
    }

    pub fn names(&self, kind: ChangeKind) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.as_str())
            .collect()
    }

    fn push(&mut self, name: &str, kind: ChangeKind) {
        self.changes.push(PluginChange {
            name: name.to_string(),
            kind,
        });
    }
}

/// Trim names, drop blanks and duplicates. First occurrence wins.
pub fn normalize_names<S: AsRef<str>>(names: &[S]) -> IndexSet<String> {
    names
        .iter()
        .map(|n| n.as_ref().trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reconcile `doc` so that `to_enable` plugins are enabled and `to_disable`
/// plugins are disabled.
///
/// On error the document is left unchanged.
pub fn reconcile<S: AsRef<str>>(
    doc: &mut ComposeDocument,
    to_enable: &[S],
    to_disable: &[S],
) -> Result<ReconcileReport, ReconcileError> {
    let mut pending_enable = normalize_names(to_enable);
    let mut pending_disable = normalize_names(to_disable);

    let overlap: Vec<String> = pending_enable
        .iter()
        .filter(|n| pending_disable.contains(*n))
        .cloned()
        .collect();
    if !overlap.is_empty() {
        return Err(ReconcileError::ConflictingRequest { names: overlap });
    }

    let sequence = doc
        .plugin_sequence()
        .map_err(|missing| ReconcileError::TargetMissing {
            path: doc.path().to_path_buf(),
            reason: missing.reason,
        })?;

    let mut report = ReconcileReport {
        agent: sequence.agent.clone(),
        changes: Vec::new(),
    };
    let mut edits = Vec::new();
    let mut flow_overrides = Vec::new();

    for entry in &sequence.entries {
        let Some(name) = entry.name.as_deref() else {
            continue;
        };
        let target = if pending_enable.shift_remove(name) {
            true
        } else if pending_disable.shift_remove(name) {
            false
        } else {
            continue;
        };

        if !needs_change(entry, target) {
            report.push(name, ChangeKind::Unchanged);
            continue;
        }
        match &sequence.shape {
            SequenceShape::Flow { .. } => flow_overrides.push((entry.index, target)),
            SequenceShape::Block { .. } => match enabled_edit(doc, entry, target) {
                Some(edit) => edits.push(edit),
                None => {
                    return Err(ReconcileError::UnsupportedEntry {
                        path: doc.path().to_path_buf(),
                        name: name.to_string(),
                    })
                }
            },
        }
        let kind = if target {
            ChangeKind::Enabled
        } else {
            ChangeKind::Disabled
        };
        report.push(name, kind);
    }

    let appended: Vec<String> = pending_enable.iter().cloned().collect();
    let new_items = sequence.render_items(&appended, doc.newline());
    match &sequence.shape {
        SequenceShape::Block { insert_at } => {
            if !appended.is_empty() {
                edits.push(doc.insertion_at(*insert_at, &new_items));
            }
        }
        SequenceShape::Flow {
            span,
            insert_at,
            items,
        } => {
            if !appended.is_empty() || !flow_overrides.is_empty() {
                let mut block = sequence.render_flow_items(items, &flow_overrides, doc.newline());
                block.push_str(&new_items);
                edits.push(Edit::replace(span.clone(), ""));
                edits.push(doc.insertion_at(*insert_at, &block));
            }
        }
    }
    for name in &appended {
        report.push(name, ChangeKind::Appended);
    }

    for name in &pending_disable {
        report.push(name, ChangeKind::Ignored);
    }

    if !edits.is_empty() {
        debug!(
            path = %doc.path().display(),
            edits = edits.len(),
            "applying compose edits"
        );
        doc.apply_edits(edits)?;
    }

    Ok(report)
}

/// Whether `entry` must be edited to reach `target`. An explicit value is
/// rewritten unless it is already the matching boolean.
fn needs_change(entry: &PluginEntry, target: bool) -> bool {
    match &entry.enabled {
        EnabledField::Absent => !target,
        EnabledField::Present { value, .. } => *value != Some(target),
    }
}

/// Edit that sets an entry's `enabled` key to `target`. Flow mapping items
/// are rewritten in block style; other non-mapping items cannot be edited.
fn enabled_edit(doc: &ComposeDocument, entry: &PluginEntry, target: bool) -> Option<Edit> {
    if !entry.editable {
        return entry.flow_rewrite(doc, target);
    }
    let literal = if target { "true" } else { "false" };
    let edit = match &entry.enabled {
        EnabledField::Absent => {
            let line = format!(
                "{}enabled: {}{}",
                " ".repeat(entry.key_indent),
                literal,
                doc.newline()
            );
            doc.insertion_at(entry.end, &line)
        }
        EnabledField::Present {
            span, empty: true, ..
        } => Edit::insert(span.start, format!(" {}", literal)),
        EnabledField::Present { span, .. } => Edit::replace(span.clone(), literal),
    };
    Some(edit)
}
