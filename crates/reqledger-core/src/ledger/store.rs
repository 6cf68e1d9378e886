//! The authoritative requisition store.
//!
//! The ledger is JSON Lines: a schema header line, then one record per line,
//! newest-created first. Every write runs the same sequence under the
//! cross-process lock: snapshot the pre-write state, load through the
//! recovery-aware parser, mutate in memory, render the complete new file, and
//! commit it with an atomic temp-file → rename. A crash at any point leaves
//! either the old file or the new file on disk, never a torn one.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::backend::RecordStore;
use super::backup::BackupManager;
use super::lock::LedgerLock;
use super::LedgerError;
use crate::clock;
use crate::config::LedgerConfig;
use crate::record::{self, NewRequisition, Requisition, Status, ValidationError};

/// Schema string carried by the ledger header line.
pub const LEDGER_SCHEMA: &str = "reqledger.ledger.v1";

/// First line of every ledger file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LedgerHeader {
    schema: String,
}

/// Result of a recovery-aware load.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Records parsed from the ledger, newest-created first.
    pub records: Vec<Requisition>,
    /// Number of lines skipped as corrupt.
    pub skipped: usize,
    /// Human-readable warnings about recovered corruption.
    pub warnings: Vec<String>,
}

/// Set of dedup tokens present in a loaded ledger snapshot.
///
/// Rebuilt from the just-loaded records inside the locked append path, so it
/// is always consistent with the data it guards; the write lock is the only
/// synchronization it needs.
#[derive(Debug, Default)]
pub struct DedupIndex {
    tokens: HashSet<String>,
}

impl DedupIndex {
    /// Build the index from a loaded snapshot.
    #[must_use]
    pub fn from_records(records: &[Requisition]) -> Self {
        Self {
            tokens: records
                .iter()
                .map(|record| record.dedup_token.clone())
                .collect(),
        }
    }

    /// Whether a submission with this token is already stored.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Number of distinct tokens in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Mutable fields accepted by [`LedgerStore::update`]. `None` leaves the
/// field as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    /// New workflow status.
    pub status: Option<Status>,
    /// New assignee.
    pub assignee: Option<String>,
    /// New issue flag.
    pub issue: Option<bool>,
}

/// The ledger store: recovery-aware load, idempotent append, in-place
/// update, atomic commit.
#[derive(Debug)]
pub struct LedgerStore {
    path: PathBuf,
    lock: LedgerLock,
    backups: BackupManager,
    lock_timeout: Duration,
}

impl LedgerStore {
    /// Store over the paths and timeouts of `config`. No I/O happens here;
    /// the ledger file is created on the first commit.
    #[must_use]
    pub fn open(config: &LedgerConfig) -> Self {
        Self {
            path: config.ledger_path.clone(),
            lock: LedgerLock::new(config.lock_path()),
            backups: BackupManager::new(config.ledger_path.clone(), config.backup_dir.clone()),
            lock_timeout: config.lock_timeout(),
        }
    }

    /// Path of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The backup manager serving this ledger.
    #[must_use]
    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Parse the persisted ledger.
    ///
    /// A structurally invalid line does not fail the load: the line is
    /// skipped and counted, a `corrupt` backup of the file as found is
    /// taken, and a warning describes how many lines were dropped. Lines
    /// that parse but violate the ledger invariants (blank id or token,
    /// zero quantity, duplicated id or token) are treated the same way. A
    /// missing file is an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] only for real I/O failures; corruption is
    /// recovered, never fatal.
    pub fn load(&self) -> Result<LoadOutcome, LedgerError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LoadOutcome::default());
            },
            Err(e) => {
                return Err(LedgerError::io(
                    format!("reading ledger {}", self.path.display()),
                    e,
                ));
            },
        };

        let mut outcome = LoadOutcome::default();
        let mut seen_ids = HashSet::new();
        let mut seen_tokens = HashSet::new();
        let mut saw_header = false;

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            // The first non-empty line should be the header. Anything else
            // there (including a bare record from a header-less file) falls
            // through to record parsing.
            if !saw_header {
                saw_header = true;
                match serde_json::from_str::<LedgerHeader>(line) {
                    Ok(header) if header.schema == LEDGER_SCHEMA => continue,
                    Ok(header) => {
                        tracing::warn!(
                            line = line_no + 1,
                            schema = %header.schema,
                            "unknown ledger schema; line skipped"
                        );
                        outcome.skipped += 1;
                        continue;
                    },
                    Err(_) => {},
                }
            }

            match serde_json::from_str::<Requisition>(line) {
                Ok(record)
                    if record.is_well_formed()
                        && seen_ids.insert(record.id.clone())
                        && seen_tokens.insert(record.dedup_token.clone()) =>
                {
                    outcome.records.push(record);
                },
                Ok(record) => {
                    tracing::warn!(
                        line = line_no + 1,
                        id = %record.id,
                        "ledger line violates invariants; skipped"
                    );
                    outcome.skipped += 1;
                },
                Err(e) => {
                    tracing::warn!(line = line_no + 1, err = %e, "corrupt ledger line skipped");
                    outcome.skipped += 1;
                },
            }
        }

        if outcome.skipped > 0 {
            self.backups.snapshot("corrupt")?;
            outcome.warnings.push(format!(
                "skipped {} corrupt ledger line(s); pre-recovery copy saved to backups",
                outcome.skipped
            ));
        }

        Ok(outcome)
    }

    /// Append a new requisition, idempotently.
    ///
    /// If a record with `dedup_token` already exists the call is a no-op and
    /// returns the existing record with `inserted = false`. Otherwise the
    /// candidate is assigned the next sequential id, inserted at the head,
    /// and committed atomically; `inserted = true`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] before any lock is taken if the
    /// candidate or token is invalid, [`LedgerError::LockTimeout`] if the
    /// write lock cannot be acquired in time, or [`LedgerError::Io`] /
    /// [`LedgerError::Serialize`] on commit failures.
    pub fn append(
        &self,
        candidate: &NewRequisition,
        dedup_token: &str,
    ) -> Result<(Requisition, bool), LedgerError> {
        self.append_at(candidate, dedup_token, Utc::now())
    }

    pub(crate) fn append_at(
        &self,
        candidate: &NewRequisition,
        dedup_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(Requisition, bool), LedgerError> {
        candidate.validate()?;
        if dedup_token.trim().is_empty() {
            return Err(ValidationError::EmptyDedupToken.into());
        }

        let _guard = self.lock.acquire(self.lock_timeout)?;
        self.backups.snapshot("pre-write")?;

        let mut records = self.load()?.records;
        let dedup = DedupIndex::from_records(&records);
        if dedup.contains(dedup_token) {
            if let Some(existing) = records
                .iter()
                .find(|record| record.dedup_token == dedup_token)
            {
                tracing::info!(
                    id = %existing.id,
                    "duplicate submission collapsed into existing record"
                );
                return Ok((existing.clone(), false));
            }
        }

        let record = Requisition {
            id: record::next_id(&records),
            dedup_token: dedup_token.to_string(),
            created_at: now,
            room: candidate.room.clone(),
            work_order: candidate.work_order.clone(),
            part_number: candidate.part_number.clone(),
            lot_number: candidate.lot_number.clone(),
            quantity: candidate.quantity,
            reason: candidate.reason,
            status: Status::Pending,
            assignee: String::new(),
            issue: false,
            frozen_elapsed_minutes: None,
        };

        records.insert(0, record.clone());
        self.commit(&records)?;
        tracing::info!(id = %record.id, work_order = %record.work_order, "requisition appended");
        Ok((record, true))
    }

    /// Update the mutable fields of a record in place.
    ///
    /// Entering a terminal status freezes the elapsed-minutes metric if it
    /// is not already frozen; leaving the terminal set clears it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if `id` is not in the ledger; no
    /// partial mutation is applied.
    pub fn update(&self, id: &str, changes: &UpdateRequest) -> Result<Requisition, LedgerError> {
        self.update_at(id, changes, Utc::now())
    }

    pub(crate) fn update_at(
        &self,
        id: &str,
        changes: &UpdateRequest,
        now: DateTime<Utc>,
    ) -> Result<Requisition, LedgerError> {
        let _guard = self.lock.acquire(self.lock_timeout)?;
        self.backups.snapshot("pre-write")?;

        let mut records = self.load()?.records;
        let position = records
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| LedgerError::NotFound { id: id.to_string() })?;

        let record = &mut records[position];
        if let Some(status) = changes.status {
            record.status = status;
        }
        if let Some(assignee) = &changes.assignee {
            record.assignee = assignee.clone();
        }
        if let Some(issue) = changes.issue {
            record.issue = issue;
        }

        if record.status.is_terminal() {
            // Frozen at most once per terminal-entry event: a record already
            // frozen keeps its value across terminal-to-terminal edits.
            if record.frozen_elapsed_minutes.is_none() {
                record.frozen_elapsed_minutes =
                    Some(clock::live_elapsed_minutes(record.created_at, now));
            }
        } else {
            record.frozen_elapsed_minutes = None;
        }

        let updated = record.clone();
        self.commit(&records)?;
        tracing::info!(
            id = %updated.id,
            status = %updated.status,
            frozen = updated.frozen_elapsed_minutes.is_some(),
            "requisition updated"
        );
        Ok(updated)
    }

    /// Render the complete new ledger and commit it by atomic rename.
    fn commit(&self, records: &[Requisition]) -> Result<(), LedgerError> {
        let mut content = serde_json::to_string(&LedgerHeader {
            schema: LEDGER_SCHEMA.to_string(),
        })?;
        content.push('\n');
        for record in records {
            content.push_str(&serde_json::to_string(record)?);
            content.push('\n');
        }

        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let parent = match parent {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::io(format!("creating ledger directory {}", parent.display()), e)
                })?;
                parent
            },
            None => Path::new("."),
        };

        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            LedgerError::io(format!("creating temp file in {}", parent.display()), e)
        })?;
        temp.write_all(content.as_bytes()).map_err(|e| {
            LedgerError::io(format!("writing temp file for {}", self.path.display()), e)
        })?;
        temp.flush().map_err(|e| {
            LedgerError::io(format!("flushing temp file for {}", self.path.display()), e)
        })?;
        temp.as_file().sync_all().map_err(|e| {
            LedgerError::io(format!("syncing temp file for {}", self.path.display()), e)
        })?;
        temp.persist(&self.path).map_err(|e| {
            LedgerError::io(
                format!("renaming temp file to {}", self.path.display()),
                e.error,
            )
        })?;
        Ok(())
    }
}

impl RecordStore for LedgerStore {
    fn load(&self) -> Result<LoadOutcome, LedgerError> {
        LedgerStore::load(self)
    }

    fn append(
        &self,
        candidate: &NewRequisition,
        dedup_token: &str,
    ) -> Result<(Requisition, bool), LedgerError> {
        LedgerStore::append(self, candidate, dedup_token)
    }

    fn update(&self, id: &str, changes: &UpdateRequest) -> Result<Requisition, LedgerError> {
        LedgerStore::update(self, id, changes)
    }
}
