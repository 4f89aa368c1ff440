//! AWS service clients and error classification

pub mod context;
pub mod ec2;
pub mod error;
pub mod tags;

pub use context::AwsContext;
pub use ec2::{Ec2Client, SourceRegionOps, TargetRegionOps};
pub use error::AwsError;
