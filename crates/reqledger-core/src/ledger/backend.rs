//! Storage contract of the requisition ledger.
//!
//! The flat file is an implementation detail: callers program against
//! [`RecordStore`] so the backing medium can later be swapped for an
//! embedded key-value store without touching them. [`super::LedgerStore`]
//! is the flat-file implementation.

use crate::record::{NewRequisition, Requisition};

use super::store::{LoadOutcome, UpdateRequest};
use super::LedgerError;

/// The ledger storage contract.
///
/// Implementations must serialize writes so that two concurrent appends
/// never assign the same sequential id and neither observes the other's
/// uncommitted state, and must keep committed data durable and never torn.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store instance is shared by
/// every caller in the process.
pub trait RecordStore: Send + Sync {
    /// Recovery-aware load of the full record set.
    ///
    /// Malformed entries are skipped and counted, never fatal.
    ///
    /// # Errors
    ///
    /// Only real I/O failures.
    fn load(&self) -> Result<LoadOutcome, LedgerError>;

    /// Idempotent append keyed on `dedup_token`.
    ///
    /// Returns the stored record and whether this call inserted it.
    ///
    /// # Errors
    ///
    /// Validation failures before any lock, lock timeouts, or commit I/O
    /// failures.
    fn append(
        &self,
        candidate: &NewRequisition,
        dedup_token: &str,
    ) -> Result<(Requisition, bool), LedgerError>;

    /// Update the mutable fields of the record with `id`, applying the
    /// freeze rule on terminal transitions.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown id; no partial mutation.
    fn update(&self, id: &str, changes: &UpdateRequest) -> Result<Requisition, LedgerError>;
}
