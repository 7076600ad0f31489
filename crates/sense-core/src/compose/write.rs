//! Atomic persistence and backups for compose files.

use super::ComposeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Information about a backup file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    /// Original file path.
    pub original_path: PathBuf,

    /// Backup file path.
    pub backup_path: PathBuf,

    /// Timestamp of backup.
    pub created_at: String,
}

/// Write `content` to `path` through a sibling temp file and a rename.
///
/// Readers see either the old file or the new one. The original file's
/// permissions are carried over.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), ComposeError> {
    let unwritable = |path: &Path, e: std::io::Error| ComposeError::Unwritable {
        path: path.to_path_buf(),
        source: e,
    };

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("agent-compose.yaml");
    let tmp_path = path.with_file_name(format!("{}.tmp.{}", file_name, std::process::id()));
    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        if let Some(perms) = permissions {
            fs::set_permissions(&tmp_path, perms)?;
        }
        Ok(())
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(unwritable(&tmp_path, e));
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(unwritable(path, e));
    }
    debug!(path = %path.display(), bytes = content.len(), "compose file written");
    Ok(())
}

/// Copy `path` to `<name>.<timestamp>.bak` next to it.
pub fn create_backup(path: &Path) -> Result<BackupInfo, ComposeError> {
    // Fractional seconds keep two backups in the same second apart.
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%f").to_string();
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let backup_parent = path.parent().unwrap_or(path);
    let mut attempt = 0u32;
    let backup_path = loop {
        let suffix = if attempt == 0 {
            timestamp.clone()
        } else {
            format!("{}_{}", timestamp, attempt)
        };
        let candidate = backup_parent.join(format!("{}.{}.bak", file_name, suffix));
        if !candidate.exists() {
            break candidate;
        }
        attempt = attempt.saturating_add(1);
    };

    fs::copy(path, &backup_path).map_err(|e| ComposeError::Unwritable {
        path: backup_path.clone(),
        source: e,
    })?;

    debug!(original = ?path, backup = ?backup_path, "created backup");

    Ok(BackupInfo {
        original_path: path.to_path_buf(),
        backup_path,
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}
