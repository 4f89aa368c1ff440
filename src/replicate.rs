//! Replication pass: identity tagging, the replica guard, and the copy
//!
//! For every eligible snapshot the pass derives the replication identity,
//! rewrites the source snapshot's `Name` tag to match it, checks the target
//! region for an existing replica with the same description, and issues a
//! cross-region copy when none exists. Copies are fire-and-forget; a failed
//! copy is recorded in the report and never blocks the rest of the fleet.

use crate::aws::ec2::{SourceRegionOps, TargetRegionOps};
use crate::aws::error::{classify_anyhow_error, AwsError};
use crate::config::ReplicationConfig;
use crate::eligibility::is_eligible;
use crate::identity::ReplicationIdentity;
use crate::inventory;
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// A successfully initiated replication
#[derive(Debug, Clone)]
pub struct ReplicatedSnapshot {
    pub instance_name: String,
    pub instance_id: String,
    pub volume_name: String,
    pub volume_id: String,
    pub snapshot_id: String,
    pub snapshot_state: String,
    /// Snapshot id assigned to the replica in the target region
    pub replica_id: String,
}

/// A copy the provider rejected
#[derive(Debug)]
pub struct CopyFailure {
    pub snapshot_id: String,
    pub identity: ReplicationIdentity,
    pub error: AwsError,
}

/// Outcome of one replication pass
#[derive(Debug, Default)]
pub struct ReplicationReport {
    /// Snapshots examined across all volumes (before eligibility filtering)
    pub examined: usize,
    /// Copies initiated this pass
    pub replicated: Vec<ReplicatedSnapshot>,
    /// Eligible snapshots skipped because a replica already exists
    pub skipped_existing: usize,
    /// Copies the provider rejected; each is retried naturally on a later
    /// pass while the snapshot stays within the lookback window
    pub failed: Vec<CopyFailure>,
}

impl ReplicationReport {
    /// Whether every eligible snapshot was either replicated or already had
    /// a replica.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run one replication pass over the source region.
///
/// Discovery and guard queries propagate errors (fatal to the pass); copy
/// rejections are contained per snapshot.
pub async fn run_replication_pass<S, T>(
    source: &S,
    target: &T,
    config: &ReplicationConfig,
    now: DateTime<Utc>,
) -> Result<ReplicationReport>
where
    S: SourceRegionOps,
    T: TargetRegionOps,
{
    let entries = inventory::discover(source, config).await?;
    let mut report = ReplicationReport::default();

    for entry in &entries {
        for volume in &entry.volumes {
            let snapshots = source.snapshots_for_volume(&volume.volume_id).await?;
            report.examined += snapshots.len();

            for snapshot in snapshots {
                if !is_eligible(&snapshot, now) {
                    continue;
                }

                let identity = ReplicationIdentity::new(
                    &entry.instance.name,
                    &volume.name,
                    &snapshot.snapshot_id,
                );

                // Keep the source snapshot's visible name in sync with the
                // identity used for cross-region correlation. Idempotent.
                source
                    .set_name_tag(&snapshot.snapshot_id, identity.as_str())
                    .await?;

                // Guard: the replica's description is the only cross-region
                // handle, so an existing match means this snapshot was
                // already replicated.
                if target.replica_exists(identity.as_str()).await? {
                    report.skipped_existing += 1;
                    continue;
                }

                match target
                    .copy_snapshot(&config.source_region, &snapshot.snapshot_id, identity.as_str())
                    .await
                {
                    Ok(replica_id) => {
                        info!(
                            instance_name = %entry.instance.name,
                            instance_id = %entry.instance.instance_id,
                            volume_name = %volume.name,
                            volume_id = %volume.volume_id,
                            snapshot_id = %snapshot.snapshot_id,
                            snapshot_state = %snapshot.state.as_str(),
                            replica_id = %replica_id,
                            "Replicated snapshot"
                        );
                        report.replicated.push(ReplicatedSnapshot {
                            instance_name: entry.instance.name.clone(),
                            instance_id: entry.instance.instance_id.clone(),
                            volume_name: volume.name.clone(),
                            volume_id: volume.volume_id.clone(),
                            snapshot_id: snapshot.snapshot_id.clone(),
                            snapshot_state: snapshot.state.as_str().to_string(),
                            replica_id,
                        });
                    }
                    Err(e) => {
                        let error = classify_anyhow_error(&e);
                        warn!(
                            snapshot_id = %snapshot.snapshot_id,
                            identity = %identity,
                            error = %error,
                            "Copy rejected, continuing with remaining snapshots"
                        );
                        report.failed.push(CopyFailure {
                            snapshot_id: snapshot.snapshot_id.clone(),
                            identity,
                            error,
                        });
                    }
                }
            }
        }
    }

    info!(
        examined = report.examined,
        replicated = report.replicated.len(),
        skipped_existing = report.skipped_existing,
        failed = report.failed.len(),
        "Replication pass complete"
    );
    Ok(report)
}
