//! ebs-snapshot-dr - cross-region EBS snapshot replication for disaster recovery
//!
//! Discovers recent snapshots of backup-tagged instances in a source region,
//! copies them to a target region exactly once (correlated by a derived
//! identity carried in the replica's description), and prunes replicas that
//! outlive their policy class's retention window.

pub mod aws;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod identity;
pub mod inventory;
pub mod replicate;
pub mod retention;
