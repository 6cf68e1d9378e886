//! Ledger error taxonomy.
//!
//! Parse corruption and duplicate submissions are deliberately missing here:
//! both are handled inside the store and reported as data
//! ([`super::LoadOutcome::skipped`] and `inserted = false` respectively),
//! never as errors that abort the caller's flow.

use std::io;

use thiserror::Error;

use crate::record::ValidationError;

/// Errors surfaced by ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// The ledger lock could not be acquired within the bound. Retryable.
    #[error("ledger lock acquisition timed out after {elapsed_secs}s")]
    LockTimeout {
        /// How long we waited before giving up.
        elapsed_secs: u64,
    },

    /// An update referenced an id that is not in the ledger.
    #[error("requisition not found: {id}")]
    NotFound {
        /// The id that was requested.
        id: String,
    },

    /// The candidate was rejected before any lock was taken.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// I/O failure during a ledger operation.
    #[error("ledger I/O error: {context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A record could not be rendered for commit.
    #[error("failed to encode ledger record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl LedgerError {
    /// Helper to build an [`LedgerError::Io`] with context.
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the caller may simply retry the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}
