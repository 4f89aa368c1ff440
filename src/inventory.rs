//! Source-region resource inventory
//!
//! Discovers the instances tagged for replication under either policy class
//! and resolves each instance's EBS-backed volumes. Read-only; provider
//! errors here are fatal to the pass, since a partial inventory has no
//! meaningful interpretation.

use crate::aws::ec2::{InstanceInfo, SourceRegionOps, VolumeInfo};
use crate::config::ReplicationConfig;
use anyhow::Result;
use std::collections::HashSet;
use tracing::debug;

/// An eligible instance with its resolved volumes
#[derive(Debug, Clone)]
pub struct InventoryEntry {
    pub instance: InstanceInfo,
    pub volumes: Vec<VolumeInfo>,
}

/// Discover all instances tagged for replication, with their volumes.
///
/// Returns the union of instances matching either class's eligibility tag;
/// an instance carrying both tags appears once. Device mappings with no EBS
/// backing were already skipped during listing.
pub async fn discover<S: SourceRegionOps>(
    source: &S,
    config: &ReplicationConfig,
) -> Result<Vec<InventoryEntry>> {
    let mut instances = Vec::new();
    let mut seen = HashSet::new();

    for (class, policy) in config.policies() {
        for instance in source.instances_with_tag(&policy.tag_key).await? {
            if seen.insert(instance.instance_id.clone()) {
                instances.push(instance);
            } else {
                debug!(
                    instance_id = %instance.instance_id,
                    class = %class,
                    "Instance already discovered under the other policy class"
                );
            }
        }
    }

    let mut entries = Vec::with_capacity(instances.len());
    for instance in instances {
        let mut volumes = Vec::with_capacity(instance.volume_ids.len());
        for volume_id in &instance.volume_ids {
            volumes.push(source.describe_volume(volume_id).await?);
        }
        entries.push(InventoryEntry { instance, volumes });
    }

    debug!(count = entries.len(), "Inventory complete");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::ec2::MockSourceRegionOps;
    use crate::config::{PolicyConfig, ReplicationConfig};

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

    fn instance(id: &str, name: &str, volume_ids: &[&str]) -> InstanceInfo {
        InstanceInfo {
            instance_id: id.to_string(),
            name: name.to_string(),
            volume_ids: volume_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn union_of_both_policy_classes() {
        let mut source = MockSourceRegionOps::new();

        source
            .expect_instances_with_tag()
            .withf(|key| key == "backup-test")
            .returning(|_| Ok(vec![instance("i-test", "staging-db", &["vol-a"])]));
        source
            .expect_instances_with_tag()
            .withf(|key| key == "backup-prod")
            .returning(|_| Ok(vec![instance("i-prod", "prod-db", &["vol-b", "vol-c"])]));
        source.expect_describe_volume().returning(|id| {
            Ok(VolumeInfo {
                volume_id: id.to_string(),
                name: format!("name-{id}"),
            })
        });

        let entries = discover(&source, &test_config()).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].instance.instance_id, "i-test");
        assert_eq!(entries[0].volumes.len(), 1);
        assert_eq!(entries[1].volumes.len(), 2);
        assert_eq!(entries[1].volumes[0].name, "name-vol-b");
    }

    #[tokio::test]
    async fn instance_in_both_classes_appears_once() {
        let mut source = MockSourceRegionOps::new();

        source
            .expect_instances_with_tag()
            .returning(|_| Ok(vec![instance("i-both", "shared", &["vol-a"])]));
        source
            .expect_describe_volume()
            .times(1)
            .returning(|id| {
                Ok(VolumeInfo {
                    volume_id: id.to_string(),
                    name: "data".to_string(),
                })
            });

        let entries = discover(&source, &test_config()).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn discovery_errors_are_fatal() {
        let mut source = MockSourceRegionOps::new();

        source
            .expect_instances_with_tag()
            .returning(|_| Err(anyhow::anyhow!("RequestLimitExceeded")));

        assert!(discover(&source, &test_config()).await.is_err());
    }

    #[tokio::test]
    async fn instance_without_volumes_yields_empty_entry() {
        let mut source = MockSourceRegionOps::new();

        source
            .expect_instances_with_tag()
            .withf(|key| key == "backup-test")
            .returning(|_| Ok(vec![instance("i-1", "ephemeral-only", &[])]));
        source
            .expect_instances_with_tag()
            .withf(|key| key == "backup-prod")
            .returning(|_| Ok(vec![]));

        let entries = discover(&source, &test_config()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].volumes.is_empty());
    }
}
