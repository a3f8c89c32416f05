//! Orchestration and compute service interfaces

use crate::error::ServiceResult;
use serde::{Deserialize, Serialize};

/// Port mapping of a running container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkBinding {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: String,
}

/// A container inside a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContainer {
    pub name: String,
    pub last_status: String,
    pub network_bindings: Vec<NetworkBinding>,
}

/// A workload instance scheduled on the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_arn: String,
    pub task_definition_arn: String,
    /// Container instance the task was placed on
    pub container_instance_arn: Option<String>,
    pub last_status: String,
    pub containers: Vec<TaskContainer>,
}

/// A compute instance registered with a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInstance {
    pub container_instance_arn: String,
    pub compute_instance_id: String,
}

/// A machine in the compute layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeInstance {
    pub instance_id: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
}

impl ComputeInstance {
    /// Address used to reach published ports
    pub fn address(&self) -> Option<&str> {
        self.public_ip.as_deref().or(self.private_ip.as_deref())
    }
}

/// Remote container-orchestration service
pub trait OrchestrationService {
    /// Create a cluster, returning its identifier
    fn create_cluster(&self, name: &str) -> ServiceResult<String>;

    /// Delete a cluster, returning its identifier
    fn delete_cluster(&self, name: &str) -> ServiceResult<String>;

    /// Whether the cluster exists and is active
    fn is_active_cluster(&self, name: &str) -> ServiceResult<bool>;

    /// All tasks of a cluster
    fn list_tasks(&self, cluster: &str) -> ServiceResult<Vec<Task>>;

    /// Describe container instances by identifier
    fn describe_container_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> ServiceResult<Vec<ContainerInstance>>;
}

/// Remote compute layer underneath the cluster
pub trait ComputeService {
    fn describe_instances(&self, ids: &[String]) -> ServiceResult<Vec<ComputeInstance>>;
}
