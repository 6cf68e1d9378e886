//! Core library for the warehouse requisition ledger.
//!
//! The ledger is a single shared flat file read and appended to by many
//! independent processes. This crate owns the parts with real invariants:
//!
//! - **Ledger store**: recovery-aware load, idempotent append, in-place
//!   update, atomic temp-file → rename commits ([`ledger`]).
//! - **Lock manager**: cross-process mutual exclusion with bounded wait
//!   ([`ledger::LedgerLock`]).
//! - **Backup manager**: timestamped point-in-time copies taken before risky
//!   writes ([`ledger::BackupManager`]).
//! - **Freeze clock**: the elapsed-minutes metric, frozen exactly once when a
//!   record first enters a terminal status ([`clock`]).
//! - **Read cache**: a time-bounded snapshot shared by concurrent readers
//!   ([`cache`]).
//! - **Boundary API**: `create` / `get_all` / `update_status` for the UI and
//!   sync layers that sit outside this crate ([`service`]).
//!
//! Writes are totally ordered by lock acquisition. Reads through the cache
//! may lag another process's commit by up to the configured TTL; that bounded
//! staleness is an accepted trade-off, not a bug.

pub mod cache;
pub mod clock;
pub mod config;
pub mod ledger;
pub mod mirror;
pub mod record;
pub mod service;

pub use cache::SnapshotCache;
pub use clock::{TrafficLight, TrafficThresholds};
pub use config::{ConfigError, LedgerConfig};
pub use ledger::{
    BackupManager, DedupIndex, LedgerError, LedgerLock, LedgerStore, LoadOutcome, RecordStore,
    UpdateRequest,
};
pub use mirror::{Mirror, MirrorError, NoopMirror};
pub use record::{NewRequisition, Reason, Requisition, Status, ValidationError};
pub use service::{Aggregates, RequisitionService, Snapshot, SnapshotFilter, SnapshotRow};
