//! Load → reconcile → save for an agent project directory.

use super::{reconcile, ReconcileError, ReconcileReport};
use crate::compose::{create_backup, BackupInfo, ComposeDocument};
use sense_common::{DetectionResult, COMPOSE_FILE_NAME};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Compute the result but never write.
    pub dry_run: bool,
    /// Copy the original aside before writing.
    pub backup: bool,
    /// Compose file name inside the agent directory.
    pub compose_file: String,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: false,
            compose_file: COMPOSE_FILE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub path: PathBuf,
    pub report: ReconcileReport,
    /// The file on disk was replaced.
    pub written: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupInfo>,
}

impl ApplyOutcome {
    /// Changes were computed but not written because of `dry_run`.
    pub fn pending(&self) -> bool {
        self.dry_run && self.report.has_changes()
    }
}

/// Reconcile the compose file of the agent project at `agent_dir`.
///
/// The file is only rewritten when its text changed, and on any error it is
/// left untouched.
pub fn apply<S: AsRef<str>>(
    agent_dir: &Path,
    to_enable: &[S],
    to_disable: &[S],
    options: &ApplyOptions,
) -> Result<ApplyOutcome, ReconcileError> {
    let path = agent_dir.join(&options.compose_file);
    let mut doc = ComposeDocument::load(&path)?;
    let original_len = doc.text().len();

    let report = reconcile(&mut doc, to_enable, to_disable)?;

    let mut outcome = ApplyOutcome {
        path: path.clone(),
        report,
        written: false,
        dry_run: options.dry_run,
        backup: None,
    };

    if !outcome.report.has_changes() || options.dry_run {
        return Ok(outcome);
    }

    if options.backup {
        outcome.backup = Some(create_backup(&path)?);
    }
    doc.save(&path)?;
    outcome.written = true;

    info!(
        path = %path.display(),
        before = original_len,
        after = doc.text().len(),
        enabled = outcome.report.names(super::ChangeKind::Enabled).len(),
        disabled = outcome.report.names(super::ChangeKind::Disabled).len(),
        appended = outcome.report.names(super::ChangeKind::Appended).len(),
        "compose file updated"
    );
    Ok(outcome)
}

/// Desired enable/disable sets derived from detection results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub enable: Vec<String>,
    pub disable: Vec<String>,
}

/// Enable what is available and on by default, disable what is unavailable.
///
/// Degraded capabilities count as available. Available capabilities that
/// are off by default are left as the document has them.
pub fn auto_selection(results: &[DetectionResult]) -> Selection {
    let mut selection = Selection::default();
    for result in results {
        if result.available {
            if result.capability.default_enabled {
                selection.enable.push(result.capability.name.clone());
            }
        } else {
            selection.disable.push(result.capability.name.clone());
        }
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use sense_common::{Capability, Category, Dependency};
    use std::fs;
    use tempfile::TempDir;

    const COMPOSE: &str = "\
agents:
  kuro:
    perception:
      custom:
        - name: docker-status
          script: ./plugins/docker-status.sh
";

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(COMPOSE_FILE_NAME), COMPOSE).unwrap();
        dir
    }

    #[test]
    fn test_apply_writes_changes() {
        let dir = project();
        let outcome = apply(dir.path(), &[] as &[&str], &["docker-status"], &ApplyOptions::default())
            .unwrap();
        assert!(outcome.written);
        let text = fs::read_to_string(dir.path().join(COMPOSE_FILE_NAME)).unwrap();
        assert!(text.ends_with("          enabled: false\n"));
    }

    #[test]
    fn test_dry_run_never_writes() {
        let dir = project();
        let options = ApplyOptions {
            dry_run: true,
            ..ApplyOptions::default()
        };
        let outcome = apply(dir.path(), &["x-feed"], &[], &options).unwrap();
        assert!(!outcome.written);
        assert!(outcome.pending());
        let text = fs::read_to_string(dir.path().join(COMPOSE_FILE_NAME)).unwrap();
        assert_eq!(text, COMPOSE);
    }

    #[test]
    fn test_no_change_does_not_write_or_backup() {
        let dir = project();
        let options = ApplyOptions {
            backup: true,
            ..ApplyOptions::default()
        };
        let outcome = apply(dir.path(), &["docker-status"], &[], &options).unwrap();
        assert!(!outcome.written);
        assert!(outcome.backup.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_backup_is_created_before_write() {
        let dir = project();
        let options = ApplyOptions {
            backup: true,
            ..ApplyOptions::default()
        };
        let outcome = apply(dir.path(), &["x-feed"], &[], &options).unwrap();
        let backup = outcome.backup.unwrap();
        assert_eq!(fs::read_to_string(backup.backup_path).unwrap(), COMPOSE);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let err = apply(dir.path(), &["a"], &[], &ApplyOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Document(crate::compose::ComposeError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_auto_selection() {
        let on = Capability::new("on", "on.sh", "", Category::Workspace).enabled_by_default();
        let off = Capability::new("off", "off.sh", "", Category::Workspace);
        let missing = Capability::new("missing", "m.sh", "", Category::Workspace)
            .with_dependency(Dependency::binary("nope", true));
        let results = vec![
            DetectionResult::classify(on, Vec::new()),
            DetectionResult::classify(off, Vec::new()),
            DetectionResult::classify(missing, vec![Dependency::binary("nope", true)]),
        ];
        let selection = auto_selection(&results);
        assert_eq!(selection.enable, vec!["on"]);
        assert_eq!(selection.disable, vec!["missing"]);
    }
}
