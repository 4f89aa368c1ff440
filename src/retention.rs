//! Retention pass: age-based pruning of replicated snapshots
//!
//! For each policy class the pass lists target-region snapshots carrying the
//! class's eligibility tag and deletes those older than the class's retention
//! window. Age is the only criterion; whether the source snapshot still
//! exists is irrelevant. Deletions are independent, so one failure never
//! blocks the rest.

use crate::aws::ec2::TargetRegionOps;
use crate::aws::error::{classify_anyhow_error, AwsError};
use crate::config::{PolicyClass, ReplicationConfig};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Retention pass options
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionOptions {
    /// Report what would be deleted without deleting anything
    pub dry_run: bool,
}

/// A replica deleted (or slated for deletion in dry-run mode)
#[derive(Debug, Clone)]
pub struct PrunedSnapshot {
    pub snapshot_id: String,
    pub policy: PolicyClass,
    pub start_time: DateTime<Utc>,
}

/// A deletion the provider rejected
#[derive(Debug)]
pub struct DeleteFailure {
    pub snapshot_id: String,
    pub policy: PolicyClass,
    pub error: AwsError,
}

/// Outcome of one retention pass
#[derive(Debug, Default)]
pub struct RetentionReport {
    /// Replicas examined across both policy classes
    pub examined: usize,
    /// Replicas deleted this pass
    pub deleted: Vec<PrunedSnapshot>,
    /// Replicas still within their retention window
    pub retained: usize,
    /// Replicas that crossed the threshold but were kept (dry-run mode)
    pub skipped: Vec<PrunedSnapshot>,
    /// Deletions the provider rejected
    pub failed: Vec<DeleteFailure>,
}

/// Run one retention pass over the target region.
///
/// Listing errors propagate (fatal); per-snapshot delete errors are
/// contained, symmetric with the replication pass's copy handling.
pub async fn run_retention_pass<T: TargetRegionOps>(
    target: &T,
    config: &ReplicationConfig,
    now: DateTime<Utc>,
    options: RetentionOptions,
) -> Result<RetentionReport> {
    let mut report = RetentionReport::default();

    for (class, policy) in config.policies() {
        let cutoff = now - Duration::days(i64::from(policy.retention_days));
        let snapshots = target.snapshots_with_tag(&policy.tag_key).await?;
        report.examined += snapshots.len();

        for snapshot in snapshots {
            // Strictly older than the cutoff; a replica at exactly the
            // threshold survives until the next pass.
            if snapshot.start_time >= cutoff {
                report.retained += 1;
                continue;
            }

            let pruned = PrunedSnapshot {
                snapshot_id: snapshot.snapshot_id.clone(),
                policy: class,
                start_time: snapshot.start_time,
            };

            if options.dry_run {
                info!(
                    snapshot_id = %pruned.snapshot_id,
                    policy = %class,
                    target_region = %config.target_region,
                    "[DRY RUN] Would delete"
                );
                report.skipped.push(pruned);
                continue;
            }

            match target.delete_snapshot(&snapshot.snapshot_id).await {
                Ok(()) => {
                    info!(
                        snapshot_id = %pruned.snapshot_id,
                        target_region = %config.target_region,
                        policy = %class,
                        "Deleted expired replica"
                    );
                    report.deleted.push(pruned);
                }
                Err(e) => {
                    let error = classify_anyhow_error(&e);
                    warn!(
                        snapshot_id = %snapshot.snapshot_id,
                        policy = %class,
                        error = %error,
                        "Failed to delete replica, continuing"
                    );
                    report.failed.push(DeleteFailure {
                        snapshot_id: snapshot.snapshot_id,
                        policy: class,
                        error,
                    });
                }
            }
        }
    }

    info!(
        examined = report.examined,
        deleted = report.deleted.len(),
        retained = report.retained,
        failed = report.failed.len(),
        dry_run = options.dry_run,
        "Retention pass complete"
    );
    Ok(report)
}
