//! Inputs of the cluster commands
//!
//! These mirror the command-line flags. Turning an [`UpRequest`] into a
//! [`ParameterSet`] also checks the flag combinations the cluster template
//! cannot express on its own.

use crate::error::{KeelError, Result};
use crate::stack::params::{
    ParameterSet, PARAM_ASG_MAX_SIZE, PARAM_CLUSTER, PARAM_IMAGE_ID, PARAM_INSTANCE_TYPE,
    PARAM_KEY_PAIR, PARAM_PORT, PARAM_SECURITY_GROUP, PARAM_SOURCE_CIDR, PARAM_SUBNET_IDS,
    PARAM_VPC_AZS, PARAM_VPC_ID,
};

/// Number of availability zones a new VPC spans
pub const REQUIRED_AZ_COUNT: usize = 2;

/// Inputs of `up`
#[derive(Debug, Clone, Default)]
pub struct UpRequest {
    /// Caller acknowledges the stack creates identity resources
    pub capability_iam: bool,
    pub key_pair: Option<String>,
    pub size: Option<String>,
    pub instance_type: Option<String>,
    pub image_id: Option<String>,
    /// Comma-separated availability zones
    pub azs: Option<String>,
    pub security_group: Option<String>,
    pub source_cidr: Option<String>,
    pub port: Option<String>,
    /// Comma-separated subnet ids
    pub subnets: Option<String>,
    pub vpc: Option<String>,
}

impl UpRequest {
    /// Build the creation parameters for a cluster
    pub fn to_parameters(&self, cluster: &str) -> Result<ParameterSet> {
        self.check_flag_combinations()?;

        let mut params = ParameterSet::new();
        params.add(PARAM_CLUSTER, cluster)?;

        if let Some(size) = &self.size {
            params.add(PARAM_ASG_MAX_SIZE, &parse_size(size)?.to_string())?;
        }
        if let Some(port) = &self.port {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| KeelError::InvalidFlags(format!("invalid port '{}'", port)))?;
            params.add(PARAM_PORT, &port.to_string())?;
        }

        let optional = [
            (PARAM_KEY_PAIR, &self.key_pair),
            (PARAM_INSTANCE_TYPE, &self.instance_type),
            (PARAM_IMAGE_ID, &self.image_id),
            (PARAM_VPC_AZS, &self.azs),
            (PARAM_SECURITY_GROUP, &self.security_group),
            (PARAM_SOURCE_CIDR, &self.source_cidr),
            (PARAM_SUBNET_IDS, &self.subnets),
            (PARAM_VPC_ID, &self.vpc),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                params.add(key, value)?;
            }
        }

        Ok(params)
    }

    fn check_flag_combinations(&self) -> Result<()> {
        if self.vpc.is_some() && self.azs.is_some() {
            return Err(KeelError::InvalidFlags(
                "you can only specify '--vpc' or '--azs'".to_string(),
            ));
        }
        if self.security_group.is_some() && self.vpc.is_none() {
            return Err(KeelError::InvalidFlags(
                "a security group requires a VPC, specify it with '--vpc'".to_string(),
            ));
        }
        if self.vpc.is_some() && self.subnets.is_none() {
            return Err(KeelError::InvalidFlags(
                "a VPC requires subnets, specify them with '--subnets'".to_string(),
            ));
        }
        if self.subnets.is_some() && self.vpc.is_none() {
            return Err(KeelError::InvalidFlags(
                "subnets require a VPC, specify it with '--vpc'".to_string(),
            ));
        }

        if let Some(azs) = &self.azs {
            let count = comma_separated(azs, "azs")?;
            if count != REQUIRED_AZ_COUNT {
                return Err(KeelError::InvalidFlags(format!(
                    "'--azs' must list exactly {} availability zones, got {}",
                    REQUIRED_AZ_COUNT, count
                )));
            }
        }
        if let Some(subnets) = &self.subnets {
            comma_separated(subnets, "subnets")?;
        }

        Ok(())
    }
}

/// Inputs of `down`
#[derive(Debug, Clone, Default)]
pub struct DownRequest {
    /// Caller acknowledges the cluster and its resources are destroyed
    pub force: bool,
}

/// Inputs of `scale`
#[derive(Debug, Clone, Default)]
pub struct ScaleRequest {
    pub capability_iam: bool,
    pub size: Option<String>,
}

/// Parse an instance count; it must be a positive integer
pub fn parse_size(size: &str) -> Result<u32> {
    match size.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(KeelError::InvalidSize(size.to_string())),
    }
}

/// Count entries of a comma-separated flag, rejecting empty entries
fn comma_separated(value: &str, flag: &str) -> Result<usize> {
    let entries: Vec<&str> = value.split(',').map(str::trim).collect();
    if entries.iter().any(|e| e.is_empty()) {
        return Err(KeelError::InvalidFlags(format!(
            "'--{}' contains an empty entry: '{}'",
            flag, value
        )));
    }
    Ok(entries.len())
}
