//! AWS error classification
//!
//! Provides typed errors for snapshot operations using the SDK's `.code()`
//! method instead of string matching on Debug format. Classification feeds
//! the pass reports; nothing here triggers automatic retries.

use thiserror::Error;

/// AWS error categories for snapshot copy and delete outcomes
#[derive(Debug, Error)]
pub enum AwsError {
    /// Snapshot or volume no longer exists (safe to skip)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded; the next scheduled pass will pick the snapshot up
    #[error("Rate limit exceeded")]
    Throttled,

    /// Snapshot is in a state that rejects the operation (e.g. still copying)
    #[error("Invalid resource state: {0}")]
    InvalidState(String),

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound(_))
    }

    /// Whether a later pass is expected to succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, AwsError::Throttled | AwsError::InvalidState(_))
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidSnapshot.NotFound",
    "InvalidVolume.NotFound",
    "InvalidInstanceID.NotFound",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "SnapshotCopyPerVolumeRateExceeded",
];

/// Known AWS error codes for state conflicts
const INVALID_STATE_CODES: &[&str] = &[
    "InvalidSnapshot.InUse",
    "IncorrectState",
    "ConcurrentSnapshotLimitExceeded",
];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound(message),
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if INVALID_STATE_CODES.contains(&c) => AwsError::InvalidState(message),
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify an error from an `anyhow::Error` by extracting the AWS error code.
///
/// Walks the error chain using `ProvideErrorMetadata` to extract `.code()` and
/// `.message()` from the snapshot operation errors the engine issues. Falls
/// back to string matching on the Debug representation if no typed error is
/// found.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    use aws_sdk_ec2::error::ProvideErrorMetadata;

    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<aws_sdk_ec2::error::SdkError<
            aws_sdk_ec2::operation::copy_snapshot::CopySnapshotError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return classify_aws_error(meta.code(), meta.message());
        }
        if let Some(e) = cause.downcast_ref::<aws_sdk_ec2::error::SdkError<
            aws_sdk_ec2::operation::delete_snapshot::DeleteSnapshotError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return classify_aws_error(meta.code(), meta.message());
        }
        if let Some(e) = cause.downcast_ref::<aws_sdk_ec2::error::SdkError<
            aws_sdk_ec2::operation::create_tags::CreateTagsError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return classify_aws_error(meta.code(), meta.message());
        }
    }

    // Fallback: extract error code from debug string representation
    let debug_str = format!("{:?}", error);
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(&code), Some(&debug_str));
    }

    AwsError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

/// All known AWS error codes for extraction from debug strings (flat list)
const ALL_KNOWN_CODES: &[&str] = &[
    // Not found
    "InvalidSnapshot.NotFound",
    "InvalidVolume.NotFound",
    "InvalidInstanceID.NotFound",
    // Throttling
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "SnapshotCopyPerVolumeRateExceeded",
    // State conflicts
    "InvalidSnapshot.InUse",
    "IncorrectState",
    "ConcurrentSnapshotLimitExceeded",
];

/// Extract an AWS error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<String> {
    for code in ALL_KNOWN_CODES {
        if debug_str.contains(code) {
            return Some((*code).to_string());
        }
    }

    // Try to extract any code from `code: Some("...")` pattern
    if let Some(start) = debug_str.find("code: Some(\"") {
        let rest = &debug_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    None
}
