//! Cluster identity

use crate::error::{KeelError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Prefix of every stack keel creates
pub const STACK_NAME_PREFIX: &str = "keel-setup-";

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Ties a cluster name to its stack and region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster name
    cluster: String,
    /// Region the cluster lives in
    region: String,
}

impl ClusterConfig {
    /// Create a config, validating the cluster name
    pub fn new(cluster: &str, region: &str) -> Result<Self> {
        if !cluster_name_pattern().is_match(cluster) {
            return Err(KeelError::InvalidClusterName(cluster.to_string()));
        }
        if region.is_empty() {
            return Err(KeelError::MissingFlag("region".to_string()));
        }

        Ok(Self {
            cluster: cluster.to_string(),
            region: region.to_string(),
        })
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Name of the stack backing this cluster
    pub fn stack_name(&self) -> String {
        format!("{}{}", STACK_NAME_PREFIX, self.cluster)
    }
}

fn cluster_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,254}$").expect("cluster name pattern is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_name() {
        let config = ClusterConfig::new("dev", DEFAULT_REGION).unwrap();
        assert_eq!(config.stack_name(), "keel-setup-dev");
        assert_eq!(config.cluster(), "dev");
        assert_eq!(config.region(), "us-east-1");
    }

    #[test]
    fn test_invalid_cluster_names() {
        for name in ["", "-dev", "dev cluster", "dev/1", &"a".repeat(256)] {
            assert!(
                matches!(ClusterConfig::new(name, DEFAULT_REGION), Err(KeelError::InvalidClusterName(_))),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_valid_cluster_names() {
        for name in ["dev", "prod_2", "a-b-c", "0cluster"] {
            assert!(ClusterConfig::new(name, DEFAULT_REGION).is_ok());
        }
    }

    #[test]
    fn test_missing_region() {
        assert!(matches!(ClusterConfig::new("dev", ""), Err(KeelError::MissingFlag(_))));
    }
}
