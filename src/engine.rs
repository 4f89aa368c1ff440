//! Replication engine: one invocation = replication pass + retention pass
//!
//! The two passes are sequential but logically independent; both run on every
//! invocation and the whole unit is safe to re-run arbitrarily often. An
//! external scheduler is expected to invoke the engine at most every 24 hours
//! (the eligibility lookback window), typically hourly.

use crate::aws::ec2::{Ec2Client, SourceRegionOps, TargetRegionOps};
use crate::aws::AwsContext;
use crate::config::ReplicationConfig;
use crate::replicate::{run_replication_pass, ReplicationReport};
use crate::retention::{run_retention_pass, RetentionOptions, RetentionReport};
use anyhow::Result;
use chrono::Utc;
use tracing::info;

/// Combined outcome of one engine invocation
#[derive(Debug)]
pub struct PassReport {
    pub replication: ReplicationReport,
    pub retention: RetentionReport,
}

/// Cross-region snapshot replication engine.
///
/// Generic over the region operations so the decision logic runs against
/// mocks in tests and `Ec2Client`s in production.
pub struct ReplicationEngine<S, T> {
    source: S,
    target: T,
    config: ReplicationConfig,
}

impl ReplicationEngine<Ec2Client, Ec2Client> {
    /// Connect EC2 clients for the configured source and target regions.
    pub async fn connect(config: ReplicationConfig) -> Result<Self> {
        let source_ctx = AwsContext::new(&config.source_region).await;
        let target_ctx = AwsContext::new(&config.target_region).await;

        info!(
            source_region = %config.source_region,
            target_region = %config.target_region,
            "Connected replication engine"
        );

        Ok(Self {
            source: Ec2Client::from_context(&source_ctx),
            target: Ec2Client::from_context(&target_ctx),
            config,
        })
    }
}

impl<S, T> ReplicationEngine<S, T>
where
    S: SourceRegionOps,
    T: TargetRegionOps,
{
    pub fn new(source: S, target: T, config: ReplicationConfig) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Run both passes: replicate fresh snapshots, then prune expired
    /// replicas.
    pub async fn run(&self) -> Result<PassReport> {
        let replication = self.replicate().await?;
        let retention = self.prune(RetentionOptions::default()).await?;
        Ok(PassReport {
            replication,
            retention,
        })
    }

    /// Run the replication pass only.
    pub async fn replicate(&self) -> Result<ReplicationReport> {
        run_replication_pass(&self.source, &self.target, &self.config, Utc::now()).await
    }

    /// Run the retention pass only.
    pub async fn prune(&self, options: RetentionOptions) -> Result<RetentionReport> {
        run_retention_pass(&self.target, &self.config, Utc::now(), options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::ec2::{InstanceInfo, SnapshotInfo, SnapshotState, VolumeInfo};
    use crate::config::PolicyConfig;
    use chrono::{DateTime, Duration};
    use std::sync::Mutex;

    fn test_config() -> ReplicationConfig {
        ReplicationConfig::new(
            "us-east-1",
            "us-west-2",
            PolicyConfig {
                tag_key: "backup-test".to_string(),
                retention_days: 7,
            },
            PolicyConfig {
                tag_key: "backup-prod".to_string(),
                retention_days: 30,
            },
        )
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// In-memory source region: fixed inventory, records Name tag writes.
    struct FakeSource {
        snapshots: Vec<SnapshotInfo>,
        name_tags: Mutex<Vec<(String, String)>>,
    }

    impl SourceRegionOps for FakeSource {
        async fn instances_with_tag(&self, tag_key: &str) -> Result<Vec<InstanceInfo>> {
            if tag_key == "backup-test" {
                Ok(vec![InstanceInfo {
                    instance_id: "i-1".to_string(),
                    name: "db-primary".to_string(),
                    volume_ids: vec!["vol-1".to_string()],
                }])
            } else {
                Ok(vec![])
            }
        }

        async fn describe_volume(&self, volume_id: &str) -> Result<VolumeInfo> {
            Ok(VolumeInfo {
                volume_id: volume_id.to_string(),
                name: "db-data".to_string(),
            })
        }

        async fn snapshots_for_volume(&self, _volume_id: &str) -> Result<Vec<SnapshotInfo>> {
            Ok(self.snapshots.clone())
        }

        async fn set_name_tag(&self, resource_id: &str, name: &str) -> Result<()> {
            self.name_tags
                .lock()
                .unwrap()
                .push((resource_id.to_string(), name.to_string()));
            Ok(())
        }
    }

    /// In-memory target region: copies become replicas visible to the guard.
    #[derive(Default)]
    struct FakeTarget {
        replicas: Mutex<Vec<SnapshotInfo>>,
    }

    impl TargetRegionOps for FakeTarget {
        async fn replica_exists(&self, description: &str) -> Result<bool> {
            Ok(self
                .replicas
                .lock()
                .unwrap()
                .iter()
                .any(|r| r.description == description))
        }

        async fn copy_snapshot(
            &self,
            _source_region: &str,
            snapshot_id: &str,
            description: &str,
        ) -> Result<String> {
            let mut replicas = self.replicas.lock().unwrap();
            let replica_id = format!("replica-of-{snapshot_id}");
            replicas.push(SnapshotInfo {
                snapshot_id: replica_id.clone(),
                volume_id: String::new(),
                start_time: now(),
                state: SnapshotState::Pending,
                description: description.to_string(),
            });
            Ok(replica_id)
        }

        async fn snapshots_with_tag(&self, _tag_key: &str) -> Result<Vec<SnapshotInfo>> {
            Ok(vec![])
        }

        async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
            self.replicas
                .lock()
                .unwrap()
                .retain(|r| r.snapshot_id != snapshot_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let source = FakeSource {
            snapshots: vec![SnapshotInfo {
                snapshot_id: "snap-1".to_string(),
                volume_id: "vol-1".to_string(),
                start_time: now() - Duration::hours(1),
                state: SnapshotState::Completed,
                description: String::new(),
            }],
            name_tags: Mutex::new(Vec::new()),
        };
        let target = FakeTarget::default();
        let engine = ReplicationEngine::new(source, target, test_config());

        let first = engine.replicate().await.unwrap();
        assert_eq!(first.replicated.len(), 1);
        assert_eq!(first.skipped_existing, 0);

        // Re-run with no time elapsed: the guard observes the first run's
        // replica and skips the copy.
        let second = engine.replicate().await.unwrap();
        assert!(second.replicated.is_empty());
        assert_eq!(second.skipped_existing, 1);

        // Exactly one replica exists, and the Name tag was rewritten (to the
        // same identity) on both runs.
        assert_eq!(engine.target.replicas.lock().unwrap().len(), 1);
        let tags = engine.source.name_tags.lock().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], ("snap-1".to_string(), "db-primary:db-data:snap-1".to_string()));
        assert_eq!(tags[0], tags[1]);
    }

    #[tokio::test]
    async fn run_executes_both_passes() {
        let source = FakeSource {
            snapshots: vec![],
            name_tags: Mutex::new(Vec::new()),
        };
        let engine = ReplicationEngine::new(source, FakeTarget::default(), test_config());

        let report = engine.run().await.unwrap();
        assert_eq!(report.replication.examined, 0);
        assert_eq!(report.retention.examined, 0);
    }
}
