//! Stack parameters
//!
//! A [`ParameterSet`] holds the named inputs submitted with a stack request.
//! Each parameter either carries an explicit value or asks the stack service
//! to reuse the value already in effect. Creation requests always carry
//! explicit values; update requests start from [`ParameterSet::for_update`]
//! so that only the overridden keys change.

use crate::error::{KeelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PARAM_KEY_PAIR: &str = "KeyName";
pub const PARAM_CLUSTER: &str = "ClusterName";
pub const PARAM_IMAGE_ID: &str = "ImageId";
pub const PARAM_ASG_MAX_SIZE: &str = "AsgMaxSize";
pub const PARAM_INSTANCE_TYPE: &str = "InstanceType";
pub const PARAM_VPC_AZS: &str = "VpcAvailabilityZones";
pub const PARAM_SECURITY_GROUP: &str = "SecurityGroup";
pub const PARAM_SOURCE_CIDR: &str = "SourceCidr";
pub const PARAM_PORT: &str = "ServicePort";
pub const PARAM_SUBNET_IDS: &str = "SubnetIds";
pub const PARAM_VPC_ID: &str = "VpcId";

/// Keys that must be present and valid before a stack can be created
pub const REQUIRED_PARAMETERS: &[&str] = &[PARAM_KEY_PAIR, PARAM_CLUSTER, PARAM_IMAGE_ID];

/// Every key the cluster template declares
pub const KNOWN_PARAMETERS: &[&str] = &[
    PARAM_KEY_PAIR,
    PARAM_CLUSTER,
    PARAM_IMAGE_ID,
    PARAM_ASG_MAX_SIZE,
    PARAM_INSTANCE_TYPE,
    PARAM_VPC_AZS,
    PARAM_SECURITY_GROUP,
    PARAM_SOURCE_CIDR,
    PARAM_PORT,
    PARAM_SUBNET_IDS,
    PARAM_VPC_ID,
];

/// A single named stack input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParameter {
    /// Parameter name
    pub key: String,
    /// Explicit value
    pub value: Option<String>,
    /// Reuse the value currently in effect on the stack
    pub inherit_previous: bool,
}

impl StackParameter {
    /// Either an explicit non-empty value or inherit-previous is required
    pub fn is_valid(&self) -> bool {
        self.inherit_previous || self.value.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Parameters for a single stack request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    params: BTreeMap<String, StackParameter>,
}

impl ParameterSet {
    /// Create an empty set for stack creation
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set for stack update where every known key inherits its previous value
    pub fn for_update(known_keys: &[&str]) -> Result<Self> {
        let mut set = Self::new();
        for key in known_keys {
            set.add_with_inherit_previous(key, true)?;
        }
        Ok(set)
    }

    /// Set an explicit value, replacing any previous entry for the key
    pub fn add(&mut self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        self.params.insert(
            key.to_string(),
            StackParameter {
                key: key.to_string(),
                value: Some(value.to_string()),
                inherit_previous: false,
            },
        );
        Ok(())
    }

    /// Mark a key as inheriting (or not) its previous value, dropping any explicit value
    pub fn add_with_inherit_previous(&mut self, key: &str, inherit_previous: bool) -> Result<()> {
        check_key(key)?;
        self.params.insert(
            key.to_string(),
            StackParameter {
                key: key.to_string(),
                value: None,
                inherit_previous,
            },
        );
        Ok(())
    }

    /// Get a parameter that was added to this set
    pub fn get(&self, key: &str) -> Result<&StackParameter> {
        self.params
            .get(key)
            .ok_or_else(|| KeelError::ParameterNotFound(key.to_string()))
    }

    /// Whether a key was added to this set
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Check required keys first, then everything else; the first violation wins
    pub fn validate(&self) -> Result<()> {
        for key in REQUIRED_PARAMETERS {
            let param = self
                .params
                .get(*key)
                .ok_or_else(|| KeelError::MissingParameter(key.to_string()))?;
            if !param.is_valid() {
                return Err(KeelError::InvalidParameter(key.to_string()));
            }
        }

        match self.params.values().find(|p| !p.is_valid()) {
            Some(param) => Err(KeelError::InvalidParameter(param.key.clone())),
            None => Ok(()),
        }
    }

    /// All parameters, ordered by key
    pub fn all(&self) -> Vec<StackParameter> {
        self.params.values().cloned().collect()
    }

    /// Iterate parameters ordered by key
    pub fn iter(&self) -> impl Iterator<Item = &StackParameter> {
        self.params.values()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(KeelError::InvalidParameterKey);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_set() -> ParameterSet {
        let mut params = ParameterSet::new();
        params.add(PARAM_KEY_PAIR, "default").unwrap();
        params.add(PARAM_CLUSTER, "dev").unwrap();
        params.add(PARAM_IMAGE_ID, "ami-12345").unwrap();
        params
    }

    #[test]
    fn test_validate_complete_set() {
        assert!(complete_set().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_required_key() {
        let mut params = ParameterSet::new();
        params.add(PARAM_KEY_PAIR, "default").unwrap();
        params.add(PARAM_IMAGE_ID, "ami-12345").unwrap();

        match params.validate() {
            Err(KeelError::MissingParameter(key)) => assert_eq!(key, PARAM_CLUSTER),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_required_checked_in_order() {
        let params = ParameterSet::new();
        match params.validate() {
            Err(KeelError::MissingParameter(key)) => assert_eq!(key, PARAM_KEY_PAIR),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_empty_required_value() {
        let mut params = complete_set();
        params.add(PARAM_IMAGE_ID, "").unwrap();

        match params.validate() {
            Err(KeelError::InvalidParameter(key)) => assert_eq!(key, PARAM_IMAGE_ID),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_optional_parameter_without_value() {
        let mut params = complete_set();
        params.add_with_inherit_previous(PARAM_VPC_ID, false).unwrap();

        match params.validate() {
            Err(KeelError::InvalidParameter(key)) => assert_eq!(key, PARAM_VPC_ID),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_required_violation_wins_over_optional() {
        let mut params = complete_set();
        params.add(PARAM_ASG_MAX_SIZE, "").unwrap();
        params.add(PARAM_CLUSTER, "").unwrap();

        match params.validate() {
            Err(KeelError::InvalidParameter(key)) => assert_eq!(key, PARAM_CLUSTER),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_inherit_previous_satisfies_required() {
        let mut params = ParameterSet::new();
        for key in REQUIRED_PARAMETERS {
            params.add_with_inherit_previous(key, true).unwrap();
        }
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_explicit_value_overrides_inherit() {
        let mut params = ParameterSet::new();
        params.add_with_inherit_previous(PARAM_ASG_MAX_SIZE, true).unwrap();
        params.add(PARAM_ASG_MAX_SIZE, "4").unwrap();

        let param = params.get(PARAM_ASG_MAX_SIZE).unwrap();
        assert!(!param.inherit_previous);
        assert_eq!(param.value.as_deref(), Some("4"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_inherit_overrides_explicit_value() {
        let mut params = ParameterSet::new();
        params.add(PARAM_ASG_MAX_SIZE, "4").unwrap();
        params.add_with_inherit_previous(PARAM_ASG_MAX_SIZE, true).unwrap();

        let param = params.get(PARAM_ASG_MAX_SIZE).unwrap();
        assert!(param.inherit_previous);
        assert_eq!(param.value, None);
    }

    #[test]
    fn test_for_update_defaults_to_inherit() {
        let params = ParameterSet::for_update(KNOWN_PARAMETERS).unwrap();

        assert_eq!(params.len(), KNOWN_PARAMETERS.len());
        assert!(params.iter().all(|p| p.inherit_previous && p.value.is_none()));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_for_update_override_leaves_others_inherited() {
        let mut params = ParameterSet::for_update(KNOWN_PARAMETERS).unwrap();
        params.add(PARAM_ASG_MAX_SIZE, "3").unwrap();

        for param in params.iter() {
            if param.key == PARAM_ASG_MAX_SIZE {
                assert_eq!(param.value.as_deref(), Some("3"));
                assert!(!param.inherit_previous);
            } else {
                assert!(param.inherit_previous, "{} should inherit", param.key);
            }
        }
    }

    #[test]
    fn test_get_unknown_key() {
        let params = ParameterSet::for_update(&[PARAM_CLUSTER]).unwrap();
        assert!(matches!(
            params.get(PARAM_VPC_ID),
            Err(KeelError::ParameterNotFound(key)) if key == PARAM_VPC_ID
        ));
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut params = ParameterSet::new();
        assert!(matches!(params.add("", "x"), Err(KeelError::InvalidParameterKey)));
        assert!(matches!(
            params.add_with_inherit_previous("", true),
            Err(KeelError::InvalidParameterKey)
        ));
        assert!(params.is_empty());
    }

    #[test]
    fn test_for_update_rejects_empty_key() {
        assert!(matches!(
            ParameterSet::for_update(&[PARAM_CLUSTER, ""]),
            Err(KeelError::InvalidParameterKey)
        ));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let mut params = complete_set();
        params.add("CustomTag", "blue").unwrap();
        assert!(params.validate().is_ok());
        assert!(params.contains("CustomTag"));
    }

    #[test]
    fn test_all_is_ordered_by_key() {
        let params = complete_set();
        let keys: Vec<String> = params.all().into_iter().map(|p| p.key).collect();
        assert_eq!(keys, vec![PARAM_CLUSTER, PARAM_IMAGE_ID, PARAM_KEY_PAIR]);
    }
}
