//! Replication engine configuration
//!
//! An explicit, validated configuration struct passed into each component at
//! construction. Regions, eligibility tag keys, and retention windows are
//! resolved once at startup (CLI flags with environment fallbacks) and never
//! read ambiently afterwards.

use thiserror::Error;

/// The two independently configured retention/eligibility groupings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyClass {
    Test,
    Production,
}

impl PolicyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyClass::Test => "test",
            PolicyClass::Production => "production",
        }
    }
}

impl std::fmt::Display for PolicyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-class eligibility tag and retention window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Tag key whose value `"true"` marks an instance in-scope for this class
    pub tag_key: String,
    /// Maximum replica age in days; 0 means delete on the next pass
    pub retention_days: u32,
}

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationConfig {
    pub source_region: String,
    pub target_region: String,
    pub test: PolicyConfig,
    pub production: PolicyConfig,
}

impl ReplicationConfig {
    /// Validate and construct a configuration.
    ///
    /// Regions and tag keys must be non-empty. Retention windows are
    /// unsigned, so non-negativity holds by construction.
    pub fn new(
        source_region: impl Into<String>,
        target_region: impl Into<String>,
        test: PolicyConfig,
        production: PolicyConfig,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            source_region: source_region.into(),
            target_region: target_region.into(),
            test,
            production,
        };

        if config.source_region.is_empty() {
            return Err(ConfigError::EmptyField("source region"));
        }
        if config.target_region.is_empty() {
            return Err(ConfigError::EmptyField("target region"));
        }
        if config.test.tag_key.is_empty() {
            return Err(ConfigError::EmptyField("test eligibility tag"));
        }
        if config.production.tag_key.is_empty() {
            return Err(ConfigError::EmptyField("production eligibility tag"));
        }

        Ok(config)
    }

    /// The policy configuration for a class.
    pub fn policy(&self, class: PolicyClass) -> &PolicyConfig {
        match class {
            PolicyClass::Test => &self.test,
            PolicyClass::Production => &self.production,
        }
    }

    /// Both policy classes with their configurations, test first.
    pub fn policies(&self) -> [(PolicyClass, &PolicyConfig); 2] {
        [
            (PolicyClass::Test, &self.test),
            (PolicyClass::Production, &self.production),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(tag_key: &str, retention_days: u32) -> PolicyConfig {
        PolicyConfig {
            tag_key: tag_key.to_string(),
            retention_days,
        }
    }

    #[test]
    fn valid_config() {
        let config = ReplicationConfig::new(
            "us-east-1",
            "us-west-2",
            policy("backup-test", 7),
            policy("backup-prod", 30),
        )
        .unwrap();

        assert_eq!(config.policy(PolicyClass::Test).retention_days, 7);
        assert_eq!(config.policy(PolicyClass::Production).tag_key, "backup-prod");
        assert_eq!(config.policies()[0].0, PolicyClass::Test);
    }

    #[test]
    fn zero_retention_is_valid() {
        // A window of 0 means delete on the next pass
        let config = ReplicationConfig::new(
            "us-east-1",
            "us-west-2",
            policy("backup-test", 0),
            policy("backup-prod", 0),
        );
        assert!(config.is_ok());
    }

    #[test]
    fn empty_fields_rejected() {
        let err = ReplicationConfig::new("", "us-west-2", policy("t", 1), policy("p", 1));
        assert_eq!(err.unwrap_err(), ConfigError::EmptyField("source region"));

        let err = ReplicationConfig::new("us-east-1", "", policy("t", 1), policy("p", 1));
        assert_eq!(err.unwrap_err(), ConfigError::EmptyField("target region"));

        let err = ReplicationConfig::new("us-east-1", "us-west-2", policy("", 1), policy("p", 1));
        assert_eq!(
            err.unwrap_err(),
            ConfigError::EmptyField("test eligibility tag")
        );

        let err = ReplicationConfig::new("us-east-1", "us-west-2", policy("t", 1), policy("", 1));
        assert_eq!(
            err.unwrap_err(),
            ConfigError::EmptyField("production eligibility tag")
        );
    }

    #[test]
    fn policy_class_display() {
        assert_eq!(PolicyClass::Test.to_string(), "test");
        assert_eq!(PolicyClass::Production.to_string(), "production");
    }
}
