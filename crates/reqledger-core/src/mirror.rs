//! Fire-and-forget mirror to an external tracking service.
//!
//! The warehouse keeps a copy of the ledger in a third-party tracking sheet.
//! That system is an observer, never a source of truth: the service offers
//! each committed record to the configured [`Mirror`] after the ledger
//! commit succeeds, logs failures, and moves on. A mirror failure must never
//! roll back or block a commit.

use thiserror::Error;

use crate::record::Requisition;

/// Errors a mirror implementation may report.
///
/// These are logged by the caller and never cross the ledger boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MirrorError {
    /// The remote rejected the record.
    #[error("mirror rejected record {id}: {reason}")]
    Rejected {
        /// Id of the record that was refused.
        id: String,
        /// Remote-supplied reason.
        reason: String,
    },

    /// The remote could not be reached.
    #[error("mirror transport error: {0}")]
    Transport(String),
}

/// Observer receiving a copy of each committed record.
///
/// Implementations must be `Send + Sync`; the service may be shared across
/// threads.
pub trait Mirror: Send + Sync {
    /// Offer one committed record to the tracking service.
    ///
    /// # Errors
    ///
    /// Implementations report delivery problems via [`MirrorError`]; the
    /// caller logs and discards them.
    fn publish(&self, record: &Requisition) -> Result<(), MirrorError>;
}

/// Mirror that drops every record. The default when no tracking service is
/// configured, and handy in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMirror;

impl Mirror for NoopMirror {
    fn publish(&self, _record: &Requisition) -> Result<(), MirrorError> {
        Ok(())
    }
}
