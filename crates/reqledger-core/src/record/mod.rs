//! Canonical requisition record shapes.
//!
//! One typed record replaces the loosely-typed row dictionaries of earlier
//! iterations of this system: every persisted row has exactly the fields of
//! [`Requisition`], enforced on load via `deny_unknown_fields`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of every requisition identifier.
pub const ID_PREFIX: &str = "REQ-";

/// Minimum zero-padded width of the numeric id suffix (`REQ-00001`).
///
/// Suffixes past 99999 widen; the format never truncates.
pub const ID_SUFFIX_WIDTH: usize = 5;

/// Errors raised by candidate validation, before any lock is taken.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// A required free-text field is empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Quantity below the minimum of 1.
    #[error("quantity must be at least 1, got {0}")]
    QuantityTooSmall(u32),

    /// The caller-supplied dedup token is empty.
    #[error("dedup token must not be empty")]
    EmptyDedupToken,
}

/// Why material was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Reason {
    /// Regular process consumption.
    Process,
    /// Extra material beyond the planned quantity.
    Extra,
    /// Replacement for scrapped material.
    Scrap,
    /// Blade replacement.
    Blades,
    /// Tooling request.
    Tooling,
}

impl Reason {
    /// All reasons, in display order.
    pub const ALL: [Self; 5] = [
        Self::Process,
        Self::Extra,
        Self::Scrap,
        Self::Blades,
        Self::Tooling,
    ];
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Process => "Process",
            Self::Extra => "Extra",
            Self::Scrap => "Scrap",
            Self::Blades => "Blades",
            Self::Tooling => "Tooling",
        };
        f.write_str(label)
    }
}

impl FromStr for Reason {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(Self::Process),
            "extra" => Ok(Self::Extra),
            "scrap" => Ok(Self::Scrap),
            "blades" => Ok(Self::Blades),
            "tooling" => Ok(Self::Tooling),
            other => Err(format!(
                "invalid reason `{other}` (expected process|extra|scrap|blades|tooling)"
            )),
        }
    }
}

/// Workflow status of a requisition.
///
/// {Delivered, Cancelled, NotFound} are terminal: once a record enters one of
/// them its elapsed-minutes metric is frozen until the status is edited back
/// out of the terminal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    /// Submitted, not yet picked up by the warehouse.
    Pending,
    /// A warehouse actor is working the request.
    InProgress,
    /// Material handed over.
    Delivered,
    /// Request withdrawn.
    Cancelled,
    /// Material could not be located.
    NotFound,
}

impl Status {
    /// All statuses, in workflow order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::InProgress,
        Self::Delivered,
        Self::Cancelled,
        Self::NotFound,
    ];

    /// Whether elapsed time stops advancing in this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::NotFound)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::NotFound => "Not found",
        };
        f.write_str(label)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '-', '_'], "")
            .as_str()
        {
            "pending" => Ok(Self::Pending),
            "inprogress" => Ok(Self::InProgress),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "notfound" => Ok(Self::NotFound),
            other => Err(format!(
                "invalid status `{other}` (expected pending|in-progress|delivered|cancelled|not-found)"
            )),
        }
    }
}

/// One row of the ledger.
///
/// `id`, `dedup_token`, and `created_at` are fixed at append time and never
/// mutated; `status`, `assignee`, `issue`, and `frozen_elapsed_minutes` are
/// the only fields the update path may touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Requisition {
    /// Sequential identifier, `REQ-00001` format. Unique per ledger.
    pub id: String,

    /// Caller-supplied opaque token that makes creation idempotent.
    pub dedup_token: String,

    /// Creation timestamp, fixed at append time.
    pub created_at: DateTime<Utc>,

    /// Production room the request came from.
    pub room: String,

    /// Work order the material is for.
    pub work_order: String,

    /// Part number requested.
    pub part_number: String,

    /// Lot number, if the requester knows it.
    pub lot_number: String,

    /// Requested quantity, at least 1.
    pub quantity: u32,

    /// Why the material was requested.
    pub reason: Reason,

    /// Current workflow status.
    pub status: Status,

    /// Warehouse actor working the request; empty until claimed.
    #[serde(default)]
    pub assignee: String,

    /// Flag raised by the warehouse when something is off with the request.
    #[serde(default)]
    pub issue: bool,

    /// Elapsed minutes captured when the record first entered a terminal
    /// status. Absent while the record is live; cleared if the status is
    /// edited back out of the terminal set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_elapsed_minutes: Option<i64>,
}

impl Requisition {
    /// Structural validity of a loaded row. Rows violating this are treated
    /// as corrupt by the loader and skipped.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.dedup_token.trim().is_empty() && self.quantity >= 1
    }
}

/// Candidate for a new requisition, validated before any lock is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequisition {
    /// Production room the request comes from.
    pub room: String,
    /// Work order the material is for.
    pub work_order: String,
    /// Part number requested.
    pub part_number: String,
    /// Lot number; may be empty.
    pub lot_number: String,
    /// Requested quantity, at least 1.
    pub quantity: u32,
    /// Why the material is requested.
    pub reason: Reason,
}

impl NewRequisition {
    /// Rejects invalid candidates before the ledger lock is touched.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::QuantityTooSmall`] for a zero quantity and
    /// [`ValidationError::MissingField`] for an empty work order or part
    /// number.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity < 1 {
            return Err(ValidationError::QuantityTooSmall(self.quantity));
        }
        if self.work_order.trim().is_empty() {
            return Err(ValidationError::MissingField("work_order"));
        }
        if self.part_number.trim().is_empty() {
            return Err(ValidationError::MissingField("part_number"));
        }
        Ok(())
    }
}

/// Numeric suffix of an id, if it has the `REQ-` shape.
#[must_use]
pub fn id_suffix(id: &str) -> Option<u64> {
    id.strip_prefix(ID_PREFIX)?.parse().ok()
}

/// Formats an id from its numeric suffix: `format_id(7)` → `REQ-00007`.
#[must_use]
pub fn format_id(suffix: u64) -> String {
    format!("{ID_PREFIX}{suffix:0width$}", width = ID_SUFFIX_WIDTH)
}

/// Next sequential id for a loaded ledger snapshot.
///
/// Gap-tolerant: max existing numeric suffix + 1, so deleted or skipped rows
/// never cause reuse.
#[must_use]
pub fn next_id(records: &[Requisition]) -> String {
    let max = records
        .iter()
        .filter_map(|record| id_suffix(&record.id))
        .max()
        .unwrap_or(0);
    format_id(max + 1)
}
