//! Container listing across the orchestration and compute layers

use super::client::{ComputeInstance, ContainerInstance, NetworkBinding, Task};
use serde::Serialize;
use std::collections::HashMap;

/// One running container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRow {
    /// `task-id/container-name`
    pub name: String,
    pub state: String,
    /// Published ports, `ip:host->container/proto` joined by `, `
    pub ports: String,
    /// Task definition family and revision
    pub task_definition: String,
}

/// Join tasks with the instances they run on
pub fn container_rows(
    tasks: &[Task],
    container_instances: &[ContainerInstance],
    compute_instances: &[ComputeInstance],
) -> Vec<ContainerRow> {
    let instance_ids: HashMap<&str, &str> = container_instances
        .iter()
        .map(|ci| (ci.container_instance_arn.as_str(), ci.compute_instance_id.as_str()))
        .collect();
    let addresses: HashMap<&str, &str> = compute_instances
        .iter()
        .filter_map(|i| Some((i.instance_id.as_str(), i.address()?)))
        .collect();

    let mut rows = Vec::new();
    for task in tasks {
        let address = task
            .container_instance_arn
            .as_deref()
            .and_then(|arn| instance_ids.get(arn))
            .and_then(|id| addresses.get(id))
            .copied();

        for container in &task.containers {
            let ports: Vec<String> = container
                .network_bindings
                .iter()
                .map(|b| format_binding(address, b))
                .collect();

            rows.push(ContainerRow {
                name: format!("{}/{}", resource_id(&task.task_arn), container.name),
                state: container.last_status.clone(),
                ports: ports.join(", "),
                task_definition: resource_id(&task.task_definition_arn).to_string(),
            });
        }
    }

    rows
}

/// Container instance identifiers referenced by the tasks, without duplicates
pub fn container_instance_arns(tasks: &[Task]) -> Vec<String> {
    let mut arns: Vec<String> = tasks
        .iter()
        .filter_map(|t| t.container_instance_arn.clone())
        .collect();
    arns.sort();
    arns.dedup();
    arns
}

fn format_binding(address: Option<&str>, binding: &NetworkBinding) -> String {
    match address {
        Some(ip) => format!(
            "{}:{}->{}/{}",
            ip, binding.host_port, binding.container_port, binding.protocol
        ),
        None => format!(
            "{}->{}/{}",
            binding.host_port, binding.container_port, binding.protocol
        ),
    }
}

/// Last path segment of an identifier such as `task/dev/0a1b`
fn resource_id(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}
