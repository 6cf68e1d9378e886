//! Timestamped point-in-time copies of the ledger file.
//!
//! Backups are taken before risky operations (`pre-write`) and when the
//! loader recovers from corruption (`corrupt`). They are write-only from the
//! core's perspective: nothing here ever reads one back. Retention is an
//! operator concern; [`BackupManager::list`] exists so operators can find the
//! newest copies.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::LedgerError;

/// Timestamp format embedded in backup file names. Lexicographic order on
/// the name is chronological order.
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3f";

/// One backup file, as returned by [`BackupManager::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// Full path of the backup copy.
    pub path: PathBuf,
    /// File name, `requisitions-<timestamp>-<tag>.jsonl`.
    pub file_name: String,
}

/// Copies the ledger file into a backup directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    ledger_path: PathBuf,
    backup_dir: PathBuf,
}

impl BackupManager {
    /// Backup manager for the given ledger file and backup directory.
    #[must_use]
    pub fn new(ledger_path: PathBuf, backup_dir: PathBuf) -> Self {
        Self {
            ledger_path,
            backup_dir,
        }
    }

    /// The backup directory.
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Snapshot the current ledger file under a name embedding the UTC
    /// timestamp and `tag`.
    ///
    /// Returns the path of the copy, or `None` when there is no ledger file
    /// yet (first write): nothing to preserve is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the directory cannot be created or the
    /// copy fails.
    pub fn snapshot(&self, tag: &str) -> Result<Option<PathBuf>, LedgerError> {
        if !self.ledger_path.exists() {
            return Ok(None);
        }

        fs::create_dir_all(&self.backup_dir).map_err(|e| {
            LedgerError::io(
                format!("creating backup directory {}", self.backup_dir.display()),
                e,
            )
        })?;

        let stamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT);
        let name = format!("requisitions-{stamp}-{tag}.jsonl");
        let target = self.backup_dir.join(&name);

        fs::copy(&self.ledger_path, &target).map_err(|e| {
            LedgerError::io(format!("copying ledger to backup {}", target.display()), e)
        })?;

        tracing::debug!(backup = %target.display(), tag, "ledger snapshot written");
        Ok(Some(target))
    }

    /// List backups newest-first.
    ///
    /// An absent backup directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<BackupEntry>, LedgerError> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LedgerError::io(
                    format!("reading backup directory {}", self.backup_dir.display()),
                    e,
                ));
            },
        };

        let mut backups: Vec<BackupEntry> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                if name.starts_with("requisitions-") && name.ends_with(".jsonl") {
                    Some(BackupEntry {
                        path: entry.path(),
                        file_name: name,
                    })
                } else {
                    None
                }
            })
            .collect();

        // Timestamped names sort chronologically; newest first.
        backups.sort_by(|a, b| b.file_name.cmp(&a.file_name));
        Ok(backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> BackupManager {
        BackupManager::new(
            dir.path().join("requisitions.jsonl"),
            dir.path().join("backups"),
        )
    }

    #[test]
    fn snapshot_without_ledger_is_a_no_op() {
        let dir = TempDir::new().expect("tempdir");
        let backups = manager(&dir);
        assert_eq!(backups.snapshot("pre-write").expect("snapshot"), None);
        assert!(backups.list().expect("list").is_empty());
    }

    #[test]
    fn snapshot_copies_ledger_bytes_and_embeds_tag() {
        let dir = TempDir::new().expect("tempdir");
        let backups = manager(&dir);
        fs::write(dir.path().join("requisitions.jsonl"), b"header\nrow\n").expect("seed ledger");

        let path = backups
            .snapshot("corrupt")
            .expect("snapshot")
            .expect("backup written");
        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("requisitions-"));
        assert!(name.ends_with("-corrupt.jsonl"));
        assert_eq!(fs::read(&path).expect("read backup"), b"header\nrow\n");
    }

    #[test]
    fn list_is_newest_first() {
        let dir = TempDir::new().expect("tempdir");
        let backups = manager(&dir);
        let backup_dir = dir.path().join("backups");
        fs::create_dir_all(&backup_dir).expect("mkdir");
        // Seed out of order; names carry the ordering.
        for name in [
            "requisitions-20260101T000000000-pre-write.jsonl",
            "requisitions-20260301T000000000-corrupt.jsonl",
            "requisitions-20260201T000000000-pre-write.jsonl",
            "unrelated.txt",
        ] {
            fs::write(backup_dir.join(name), b"x").expect("seed");
        }

        let listed = backups.list().expect("list");
        let names: Vec<&str> = listed.iter().map(|b| b.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "requisitions-20260301T000000000-corrupt.jsonl",
                "requisitions-20260201T000000000-pre-write.jsonl",
                "requisitions-20260101T000000000-pre-write.jsonl",
            ]
        );
    }
}
