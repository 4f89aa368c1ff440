//! Snapshot eligibility filter
//!
//! A snapshot qualifies for replication when it was taken within the last
//! 24 hours and has reached the `completed` state. The lookback window bounds
//! the scan; the engine assumes an invocation cadence of at most 24 hours, so
//! every snapshot is observed by at least one pass.

use crate::aws::ec2::{SnapshotInfo, SnapshotState};
use chrono::{DateTime, Duration, Utc};

/// How far back the replication pass looks for new snapshots.
pub fn lookback_window() -> Duration {
    Duration::days(1)
}

/// Whether a snapshot qualifies for replication at `now`.
///
/// The window is strict: a snapshot taken exactly 24 hours ago is excluded.
/// Incomplete snapshots (`pending`, `error`, anything else) are silently
/// excluded; a later pass picks them up once they complete, if still within
/// the window.
pub fn is_eligible(snapshot: &SnapshotInfo, now: DateTime<Utc>) -> bool {
    snapshot.state == SnapshotState::Completed && snapshot.start_time > now - lookback_window()
}
