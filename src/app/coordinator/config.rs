//! Configuration structures for the download coordinator

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::default_concurrency;

/// What the coordinator does when a download fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop enumerating and abort in-flight downloads on the first failure
    #[default]
    FailFast,
    /// Let every launched download finish and report all failures at the end
    KeepGoing,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::KeepGoing => write!(f, "keep-going"),
        }
    }
}

/// Configuration for the download coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Maximum downloads in flight at once
    pub concurrency: usize,
    /// Reaction to a failed download
    pub failure_policy: FailurePolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Set the download concurrency
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("Concurrency must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that default configuration is valid
    #[test]
    fn test_default_config_is_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.concurrency >= 1);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn test_config_builder_methods() {
        let config = CoordinatorConfig::default()
            .with_concurrency(3)
            .with_failure_policy(FailurePolicy::KeepGoing);

        assert_eq!(config.concurrency, 3);
        assert_eq!(config.failure_policy, FailurePolicy::KeepGoing);
        assert!(CoordinatorConfig::default().with_concurrency(0).validate().is_err());
    }

    #[test]
    fn test_failure_policy_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: FailurePolicy,
        }

        let parsed: Wrapper = toml::from_str(r#"policy = "keep-going""#).unwrap();
        assert_eq!(parsed.policy, FailurePolicy::KeepGoing);
        assert_eq!(FailurePolicy::FailFast.to_string(), "fail-fast");
    }
}
