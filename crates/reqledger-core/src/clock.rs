//! Elapsed-minutes derivation and the freeze rule.
//!
//! The elapsed metric for a record is a pure function of the record and the
//! current time: the frozen value if one was captured, otherwise whole
//! minutes since creation, truncated. The store calls
//! [`live_elapsed_minutes`] exactly once per terminal-entry event to populate
//! the frozen value; everything else reads through [`elapsed_minutes`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Requisition;

/// Display bucket for a record's elapsed minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrafficLight {
    /// Under the amber threshold.
    Green,
    /// At or past amber, under red.
    Amber,
    /// At or past the red threshold.
    Red,
}

impl std::fmt::Display for TrafficLight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Green => "green",
            Self::Amber => "amber",
            Self::Red => "red",
        };
        f.write_str(label)
    }
}

/// Thresholds (in minutes) separating the traffic-light buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrafficThresholds {
    /// Elapsed minutes at which a record turns amber.
    #[serde(default = "default_amber_after")]
    pub amber_after_minutes: i64,

    /// Elapsed minutes at which a record turns red.
    #[serde(default = "default_red_after")]
    pub red_after_minutes: i64,
}

const fn default_amber_after() -> i64 {
    10
}

const fn default_red_after() -> i64 {
    20
}

impl Default for TrafficThresholds {
    fn default() -> Self {
        Self {
            amber_after_minutes: default_amber_after(),
            red_after_minutes: default_red_after(),
        }
    }
}

impl TrafficThresholds {
    /// Bucket an elapsed-minutes value.
    #[must_use]
    pub const fn bucket(&self, elapsed_minutes: i64) -> TrafficLight {
        if elapsed_minutes >= self.red_after_minutes {
            TrafficLight::Red
        } else if elapsed_minutes >= self.amber_after_minutes {
            TrafficLight::Amber
        } else {
            TrafficLight::Green
        }
    }
}

/// Elapsed minutes for a record at `now`: the frozen value if present,
/// otherwise the live value.
#[must_use]
pub fn elapsed_minutes(record: &Requisition, now: DateTime<Utc>) -> i64 {
    record
        .frozen_elapsed_minutes
        .unwrap_or_else(|| live_elapsed_minutes(record.created_at, now))
}

/// Whole minutes between `created_at` and `now`, truncated toward zero and
/// clamped at 0 so clock skew never yields a negative metric.
#[must_use]
pub fn live_elapsed_minutes(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_minutes().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    use crate::record::{Reason, Status};

    fn record_created_at(created_at: DateTime<Utc>) -> Requisition {
        Requisition {
            id: "REQ-00001".to_string(),
            dedup_token: "tok-1".to_string(),
            created_at,
            room: "INTRODUCER".to_string(),
            work_order: "WO-1".to_string(),
            part_number: "PN-1".to_string(),
            lot_number: String::new(),
            quantity: 1,
            reason: Reason::Process,
            status: Status::Pending,
            assignee: String::new(),
            issue: false,
            frozen_elapsed_minutes: None,
        }
    }

    #[test]
    fn live_elapsed_truncates_partial_minutes() {
        let now = Utc::now();
        let created = now - Duration::seconds(12 * 60 + 59);
        assert_eq!(live_elapsed_minutes(created, now), 12);
    }

    #[test]
    fn live_elapsed_clamps_clock_skew_to_zero() {
        let now = Utc::now();
        let created = now + Duration::minutes(3);
        assert_eq!(live_elapsed_minutes(created, now), 0);
    }

    #[test]
    fn frozen_value_wins_over_live_computation() {
        let now = Utc::now();
        let mut record = record_created_at(now - Duration::minutes(45));
        assert_eq!(elapsed_minutes(&record, now), 45);

        record.frozen_elapsed_minutes = Some(12);
        assert_eq!(elapsed_minutes(&record, now), 12);
        // More wall-clock time does not move a frozen record.
        assert_eq!(elapsed_minutes(&record, now + Duration::minutes(30)), 12);
    }

    #[test]
    fn buckets_split_at_thresholds() {
        let thresholds = TrafficThresholds::default();
        assert_eq!(thresholds.bucket(0), TrafficLight::Green);
        assert_eq!(thresholds.bucket(9), TrafficLight::Green);
        assert_eq!(thresholds.bucket(10), TrafficLight::Amber);
        assert_eq!(thresholds.bucket(19), TrafficLight::Amber);
        assert_eq!(thresholds.bucket(20), TrafficLight::Red);
        assert_eq!(thresholds.bucket(500), TrafficLight::Red);
    }
}
