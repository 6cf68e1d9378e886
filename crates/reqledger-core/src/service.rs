//! Boundary API for the layers outside the core.
//!
//! [`RequisitionService`] is what the form UI and the sync glue call:
//! `create`, `get_all`, `update_status`. It wires the ledger store, the read
//! cache, the freeze clock, and the tracking mirror together and holds no
//! per-caller mutable state: rerun/reset behavior is the caller's problem,
//! expressed through explicit parameters like `force_reload`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::SnapshotCache;
use crate::clock::{self, TrafficLight, TrafficThresholds};
use crate::config::LedgerConfig;
use crate::ledger::{LedgerError, LedgerStore, RecordStore, UpdateRequest};
use crate::mirror::{Mirror, NoopMirror};
use crate::record::{NewRequisition, Requisition, Status};

/// One record as the display layers consume it: the stored fields plus the
/// derived elapsed minutes and its traffic-light bucket.
#[derive(Debug, Clone)]
pub struct SnapshotRow {
    /// The stored record.
    pub record: Requisition,
    /// Frozen or live elapsed minutes at computation time.
    pub elapsed_minutes: i64,
    /// Bucket of `elapsed_minutes` under the configured thresholds.
    pub light: TrafficLight,
}

/// Display-only aggregates over a snapshot.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    /// Total number of records.
    pub total: usize,
    /// Record count per status.
    pub by_status: BTreeMap<Status, usize>,
    /// Records with the issue flag raised.
    pub open_issues: usize,
}

/// A fully-computed view of the ledger at one instant.
///
/// Snapshots obtained through [`RequisitionService::get_all`] may lag
/// another process's commit by up to the configured cache TTL.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Rows, newest-created first.
    pub rows: Vec<SnapshotRow>,
    /// Display aggregates.
    pub aggregates: Aggregates,
    /// Corrupt lines skipped by the recovery-aware loader.
    pub skipped: usize,
    /// Warnings from the loader.
    pub warnings: Vec<String>,
    /// When this snapshot was computed.
    pub computed_at: DateTime<Utc>,
}

/// List-view filter over a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    /// Keep rows from these rooms; empty keeps all.
    pub rooms: Vec<String>,
    /// Keep rows in these statuses; empty keeps all.
    pub statuses: Vec<Status>,
    /// Case-insensitive needle matched against work order, part number,
    /// lot number, and reason.
    pub search: Option<String>,
}

impl SnapshotFilter {
    fn matches(&self, row: &SnapshotRow) -> bool {
        let record = &row.record;
        if !self.rooms.is_empty() && !self.rooms.iter().any(|room| room == &record.room) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&record.status) {
            return false;
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            if needle.is_empty() {
                return true;
            }
            let haystacks = [
                record.work_order.as_str(),
                record.part_number.as_str(),
                record.lot_number.as_str(),
            ];
            return haystacks
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
                || record.reason.to_string().to_lowercase().contains(&needle);
        }
        true
    }
}

impl Snapshot {
    /// Rows passing `filter`, in snapshot order.
    #[must_use]
    pub fn filter(&self, filter: &SnapshotFilter) -> Vec<&SnapshotRow> {
        self.rows.iter().filter(|row| filter.matches(row)).collect()
    }
}

/// The boundary service: `create` / `get_all` / `update_status`.
///
/// Generic over the [`RecordStore`] backing medium; the flat-file
/// [`LedgerStore`] is the default.
pub struct RequisitionService<S: RecordStore = LedgerStore> {
    store: S,
    cache: SnapshotCache<Snapshot>,
    mirror: Box<dyn Mirror>,
    cache_ttl: Duration,
    thresholds: TrafficThresholds,
}

impl RequisitionService<LedgerStore> {
    /// Service over the flat-file ledger of `config`, with no tracking
    /// mirror.
    #[must_use]
    pub fn new(config: &LedgerConfig) -> Self {
        Self::with_mirror(config, Box::new(NoopMirror))
    }

    /// Service over the flat-file ledger of `config`, publishing committed
    /// records to `mirror`.
    #[must_use]
    pub fn with_mirror(config: &LedgerConfig, mirror: Box<dyn Mirror>) -> Self {
        Self::with_backend(
            LedgerStore::open(config),
            mirror,
            config.cache_ttl(),
            config.thresholds,
        )
    }
}

impl<S: RecordStore> RequisitionService<S> {
    /// Service over an arbitrary storage backend.
    #[must_use]
    pub fn with_backend(
        store: S,
        mirror: Box<dyn Mirror>,
        cache_ttl: Duration,
        thresholds: TrafficThresholds,
    ) -> Self {
        Self {
            store,
            cache: SnapshotCache::new(),
            mirror,
            cache_ttl,
            thresholds,
        }
    }

    /// The underlying store (for operator tooling such as backup listing).
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a requisition, idempotently.
    ///
    /// Retries carrying the same `dedup_token` collapse into the stored
    /// record and report `inserted = false`. On a real insert the committed
    /// record is offered to the tracking mirror (failures logged, never
    /// propagated) and this process's read cache is invalidated so the
    /// writer's own next read sees the write.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] before any lock is taken,
    /// [`LedgerError::LockTimeout`] (retryable), or I/O failures from the
    /// commit.
    pub fn create(
        &self,
        candidate: &NewRequisition,
        dedup_token: &str,
    ) -> Result<(Requisition, bool), LedgerError> {
        let (record, inserted) = self.store.append(candidate, dedup_token)?;
        if inserted {
            self.offer_to_mirror(&record);
            self.cache.invalidate();
        }
        Ok((record, inserted))
    }

    /// The current snapshot, served from the read cache.
    ///
    /// `force_reload` bypasses a fresh cache entry; otherwise a snapshot up
    /// to the configured TTL old may be returned.
    ///
    /// # Errors
    ///
    /// I/O failures from the loader. Corruption does not fail the read; it
    /// shows up in [`Snapshot::skipped`] and [`Snapshot::warnings`].
    pub fn get_all(&self, force_reload: bool) -> Result<Arc<Snapshot>, LedgerError> {
        self.cache
            .get(self.cache_ttl, force_reload, || self.compute_snapshot())
    }

    /// Update status, assignee, and issue flag of one record.
    ///
    /// Entering a terminal status freezes the record's elapsed minutes;
    /// leaving the terminal set clears the freeze. The committed record is
    /// offered to the tracking mirror and the cache is invalidated.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown id; no partial mutation is
    /// applied.
    pub fn update_status(
        &self,
        id: &str,
        new_status: Status,
        assignee: Option<String>,
        issue: Option<bool>,
    ) -> Result<Requisition, LedgerError> {
        let record = self.store.update(
            id,
            &UpdateRequest {
                status: Some(new_status),
                assignee,
                issue,
            },
        )?;
        self.offer_to_mirror(&record);
        self.cache.invalidate();
        Ok(record)
    }

    fn compute_snapshot(&self) -> Result<Snapshot, LedgerError> {
        let outcome = self.store.load()?;
        let now = Utc::now();

        let rows: Vec<SnapshotRow> = outcome
            .records
            .into_iter()
            .map(|record| {
                let elapsed_minutes = clock::elapsed_minutes(&record, now);
                SnapshotRow {
                    light: self.thresholds.bucket(elapsed_minutes),
                    elapsed_minutes,
                    record,
                }
            })
            .collect();

        let mut aggregates = Aggregates {
            total: rows.len(),
            ..Aggregates::default()
        };
        for row in &rows {
            *aggregates.by_status.entry(row.record.status).or_insert(0) += 1;
            if row.record.issue {
                aggregates.open_issues += 1;
            }
        }

        Ok(Snapshot {
            rows,
            aggregates,
            skipped: outcome.skipped,
            warnings: outcome.warnings,
            computed_at: now,
        })
    }

    fn offer_to_mirror(&self, record: &Requisition) {
        if let Err(err) = self.mirror.publish(record) {
            tracing::warn!(
                id = %record.id,
                err = %err,
                "tracking mirror publish failed; ledger state unaffected"
            );
        }
    }
}
