//! EC2 tag conventions used by the replication engine
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `Name` | Display name; rewritten on source snapshots to the replication identity |
//! | eligibility tag (configured) | `"true"` marks an instance in-scope for a policy class |

use aws_sdk_ec2::types::Tag;

/// Standard EC2 display-name tag key
pub const TAG_NAME: &str = "Name";

/// Tag value that marks an instance eligible for replication
pub const ELIGIBLE_VALUE: &str = "true";

/// Sentinel display name for instances/volumes with no `Name` tag.
///
/// Matches what the provider console shows for unnamed resources; a missing
/// name is never an error, the sentinel flows into the replication identity.
pub const UNNAMED: &str = "None";

/// Build a describe-call filter name for a tag key (e.g. `tag:backup-dr`).
pub fn tag_filter(key: &str) -> String {
    format!("tag:{key}")
}

/// Resolve a resource's display name from its tags.
///
/// Returns the value of the `Name` tag, or [`UNNAMED`] when absent.
pub fn display_name(tags: &[Tag]) -> String {
    tags.iter()
        .find(|t| t.key() == Some(TAG_NAME))
        .and_then(|t| t.value())
        .unwrap_or(UNNAMED)
        .to_string()
}
