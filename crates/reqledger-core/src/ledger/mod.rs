//! The requisition ledger: authoritative store, lock manager, backups.
//!
//! Many independent processes read and append to one shared ledger file. All
//! mutation goes through [`LedgerStore`], which serializes writers with a
//! cross-process [`LedgerLock`], snapshots the pre-write state through
//! [`BackupManager`], and commits by atomic rename so a reader never observes
//! a torn file.
//!
//! # File layout
//!
//! ```text
//! <ledger dir>/requisitions.jsonl          the ledger (header + one record per line)
//! <ledger dir>/requisitions.jsonl.lock     lock marker, flock'd by writers
//! <backup dir>/requisitions-<ts>-<tag>.jsonl   point-in-time copies
//! ```

mod backend;
mod backup;
mod error;
mod lock;
mod store;


pub use backend::RecordStore;
pub use backup::{BackupEntry, BackupManager};
pub use error::LedgerError;
pub use lock::{LedgerLock, LockGuard, LOCK_POLL_INTERVAL, LOCK_POLL_JITTER_MS};
pub use store::{DedupIndex, LedgerStore, LoadOutcome, UpdateRequest, LEDGER_SCHEMA};
