//! EC2 snapshot and inventory operations
//!
//! Thin wrappers over the EC2 control-plane calls the replication engine
//! consumes, plus the `SourceRegionOps`/`TargetRegionOps` traits that make
//! the decision logic testable without AWS.

use crate::aws::context::AwsContext;
use crate::aws::tags::{self, ELIGIBLE_VALUE, TAG_NAME};
use anyhow::{Context, Result};
use aws_sdk_ec2::types::{Filter, Snapshot, Tag};
use aws_sdk_ec2::Client;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// An instance eligible for replication, with its attached EBS volumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub instance_id: String,
    /// `Name` tag value, or the unnamed sentinel
    pub name: String,
    /// Volume ids from EBS-backed device mappings (ephemeral devices skipped)
    pub volume_ids: Vec<String>,
}

/// A volume resolved from an instance's device mappings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub volume_id: String,
    /// `Name` tag value, or the unnamed sentinel
    pub name: String,
}

/// Snapshot lifecycle state as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotState {
    Pending,
    Completed,
    Error,
    Other(String),
}

impl SnapshotState {
    pub fn as_str(&self) -> &str {
        match self {
            SnapshotState::Pending => "pending",
            SnapshotState::Completed => "completed",
            SnapshotState::Error => "error",
            SnapshotState::Other(s) => s,
        }
    }
}

impl From<&aws_sdk_ec2::types::SnapshotState> for SnapshotState {
    fn from(state: &aws_sdk_ec2::types::SnapshotState) -> Self {
        match state.as_str() {
            "pending" => SnapshotState::Pending,
            "completed" => SnapshotState::Completed,
            "error" => SnapshotState::Error,
            other => SnapshotState::Other(other.to_string()),
        }
    }
}

/// A point-in-time snapshot of a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub snapshot_id: String,
    pub volume_id: String,
    pub start_time: DateTime<Utc>,
    pub state: SnapshotState,
    pub description: String,
}

/// Source-region operations consumed by the replication pass.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait SourceRegionOps: Send + Sync {
    /// List instances carrying `{tag_key: "true"}`
    async fn instances_with_tag(&self, tag_key: &str) -> Result<Vec<InstanceInfo>>;

    /// Resolve a volume's display name by id
    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeInfo>;

    /// List all snapshots of a volume
    async fn snapshots_for_volume(&self, volume_id: &str) -> Result<Vec<SnapshotInfo>>;

    /// Set or overwrite a resource's `Name` tag
    async fn set_name_tag(&self, resource_id: &str, name: &str) -> Result<()>;
}

/// Target-region operations consumed by the replication and retention passes.
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait TargetRegionOps: Send + Sync {
    /// Whether any snapshot in the target region carries this exact description
    async fn replica_exists(&self, description: &str) -> Result<bool>;

    /// Issue a cross-region copy; returns the new replica's snapshot id.
    ///
    /// The copy completes asynchronously on the provider side; completion is
    /// not awaited.
    async fn copy_snapshot(
        &self,
        source_region: &str,
        snapshot_id: &str,
        description: &str,
    ) -> Result<String>;

    /// List target-region snapshots carrying `{tag_key: "true"}`
    async fn snapshots_with_tag(&self, tag_key: &str) -> Result<Vec<SnapshotInfo>>;

    /// Delete a snapshot by id
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;
}

/// EC2 client bound to a single region
pub struct Ec2Client {
    client: Client,
    region: String,
}

impl Ec2Client {
    /// Create a new EC2 client (loads AWS config from environment)
    pub async fn new(region: &str) -> Result<Self> {
        let ctx = AwsContext::new(region).await;
        Ok(Self::from_context(&ctx))
    }

    /// Create an EC2 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
            region: ctx.region().to_string(),
        }
    }

    /// The region this client operates in.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// List snapshots matching the given describe-snapshots filter.
    async fn describe_snapshots(&self, filter: Filter) -> Result<Vec<SnapshotInfo>> {
        let mut snapshots = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self.client.describe_snapshots().filters(filter.clone());
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }

            let response = request
                .send()
                .await
                .context("Failed to describe snapshots")?;

            snapshots.extend(response.snapshots().iter().filter_map(convert_snapshot));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(snapshots)
    }
}

impl SourceRegionOps for Ec2Client {
    async fn instances_with_tag(&self, tag_key: &str) -> Result<Vec<InstanceInfo>> {
        let filter = Filter::builder()
            .name(tags::tag_filter(tag_key))
            .values(ELIGIBLE_VALUE)
            .build();

        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self.client.describe_instances().filters(filter.clone());
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }

            let response = request
                .send()
                .await
                .context("Failed to describe instances")?;

            for reservation in response.reservations() {
                for instance in reservation.instances() {
                    let Some(instance_id) = instance.instance_id() else {
                        continue;
                    };

                    let volume_ids = instance
                        .block_device_mappings()
                        .iter()
                        // Device mappings without an EBS backing are ephemeral
                        .filter_map(|dev| dev.ebs())
                        .filter_map(|ebs| ebs.volume_id())
                        .map(|id| id.to_string())
                        .collect();

                    instances.push(InstanceInfo {
                        instance_id: instance_id.to_string(),
                        name: tags::display_name(instance.tags()),
                        volume_ids,
                    });
                }
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(
            tag = %tag_key,
            count = instances.len(),
            "Found tagged instances"
        );
        Ok(instances)
    }

    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeInfo> {
        let response = self
            .client
            .describe_volumes()
            .filters(
                Filter::builder()
                    .name("volume-id")
                    .values(volume_id)
                    .build(),
            )
            .send()
            .await
            .context("Failed to describe volume")?;

        let volume = response
            .volumes()
            .first()
            .with_context(|| format!("Volume not found: {volume_id}"))?;

        Ok(VolumeInfo {
            volume_id: volume_id.to_string(),
            name: tags::display_name(volume.tags()),
        })
    }

    async fn snapshots_for_volume(&self, volume_id: &str) -> Result<Vec<SnapshotInfo>> {
        self.describe_snapshots(
            Filter::builder()
                .name("volume-id")
                .values(volume_id)
                .build(),
        )
        .await
    }

    async fn set_name_tag(&self, resource_id: &str, name: &str) -> Result<()> {
        self.client
            .create_tags()
            .resources(resource_id)
            .tags(Tag::builder().key(TAG_NAME).value(name).build())
            .send()
            .await
            .with_context(|| format!("Failed to tag {resource_id}"))?;

        debug!(resource_id = %resource_id, name = %name, "Set Name tag");
        Ok(())
    }
}

impl TargetRegionOps for Ec2Client {
    async fn replica_exists(&self, description: &str) -> Result<bool> {
        let replicas = self
            .describe_snapshots(
                Filter::builder()
                    .name("description")
                    .values(description)
                    .build(),
            )
            .await?;

        Ok(!replicas.is_empty())
    }

    async fn copy_snapshot(
        &self,
        source_region: &str,
        snapshot_id: &str,
        description: &str,
    ) -> Result<String> {
        info!(
            snapshot_id = %snapshot_id,
            source_region = %source_region,
            target_region = %self.region,
            "Copying snapshot"
        );

        let response = self
            .client
            .copy_snapshot()
            .source_region(source_region)
            .source_snapshot_id(snapshot_id)
            .description(description)
            .send()
            .await
            .with_context(|| format!("Failed to copy snapshot {snapshot_id}"))?;

        let replica_id = response
            .snapshot_id()
            .context("Copy response missing snapshot id")?;

        Ok(replica_id.to_string())
    }

    async fn snapshots_with_tag(&self, tag_key: &str) -> Result<Vec<SnapshotInfo>> {
        self.describe_snapshots(
            Filter::builder()
                .name(tags::tag_filter(tag_key))
                .values(ELIGIBLE_VALUE)
                .build(),
        )
        .await
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .with_context(|| format!("Failed to delete snapshot {snapshot_id}"))?;

        Ok(())
    }
}

/// Convert an SDK snapshot into `SnapshotInfo`.
///
/// Snapshots missing an id, state, or start time are skipped; the engine
/// cannot make eligibility or retention decisions about them.
fn convert_snapshot(snapshot: &Snapshot) -> Option<SnapshotInfo> {
    let snapshot_id = match snapshot.snapshot_id() {
        Some(id) => id.to_string(),
        None => return None,
    };

    let start_time = snapshot
        .start_time()
        .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()));

    let Some(start_time) = start_time else {
        warn!(snapshot_id = %snapshot_id, "Snapshot has no start time, skipping");
        return None;
    };

    let state = match snapshot.state() {
        Some(state) => SnapshotState::from(state),
        None => {
            warn!(snapshot_id = %snapshot_id, "Snapshot has no state, skipping");
            return None;
        }
    };

    Some(SnapshotInfo {
        snapshot_id,
        volume_id: snapshot.volume_id().unwrap_or_default().to_string(),
        start_time,
        state,
        description: snapshot.description().unwrap_or_default().to_string(),
    })
}
