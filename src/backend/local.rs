//! File-backed simulation of the remote services
//!
//! Requests are accepted the way the remote services accept them and leave
//! the stack in an `*_IN_PROGRESS` status. The next describe settles the
//! operation: resource events are recorded from the stack's template and the
//! cluster's container instances are resized to the stack's `AsgMaxSize`.
//! A settled delete removes the stack, so it is reported as missing.

use crate::cluster::client::{
    ComputeInstance, ComputeService, ContainerInstance, OrchestrationService, Task,
};
use crate::error::{KeelError, Result, ServiceError, ServiceResult, VALIDATION_ERROR_CODE};
use crate::stack::client::{
    CreateStackInput, StackDescription, StackService, UpdateStackInput, CAPABILITY_IAM,
};
use crate::stack::params::{StackParameter, PARAM_ASG_MAX_SIZE, PARAM_CLUSTER};
use crate::stack::status::{ResourceStatus, StackEvent, StackEventPage, StackStatus};
use crate::stack::template::{declared_parameters, declared_resources, TemplateParameter};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Name of the state file inside the state directory
pub const STATE_FILE: &str = "state.json";

/// Events returned per page
pub const EVENT_PAGE_SIZE: usize = 10;

const CLUSTER_ACTIVE: &str = "ACTIVE";
const CLUSTER_INACTIVE: &str = "INACTIVE";
const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";
const SCALING_GROUP_RESOURCE: &str = "InstanceAutoScalingGroup";
const INTERNAL_FAILURE: &str = "InternalFailure";
const CLUSTER_NOT_FOUND: &str = "ClusterNotFoundException";

/// A registered cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalCluster {
    arn: String,
    status: String,
    tasks: Vec<Task>,
    container_instances: Vec<ContainerInstance>,
}

/// A stack and its event history, oldest event first
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalStack {
    stack_id: String,
    name: String,
    status: StackStatus,
    parameters: BTreeMap<String, String>,
    template_body: String,
    events: Vec<StackEvent>,
}

impl LocalStack {
    fn record(&mut self, logical_id: &str, resource_type: &str, status: ResourceStatus, reason: Option<&str>) {
        let physical_id = if logical_id == self.name {
            Some(self.stack_id.clone())
        } else {
            Some(format!("{}-{}", logical_id.to_lowercase(), short_id()))
        };

        self.events.push(StackEvent {
            event_id: Uuid::new_v4().to_string(),
            stack_name: self.name.clone(),
            timestamp: Utc::now(),
            logical_resource_id: logical_id.to_string(),
            physical_resource_id: physical_id,
            resource_type: resource_type.to_string(),
            resource_status: status,
            resource_status_reason: reason.map(str::to_string),
        });
    }

    fn record_stack(&mut self, status: ResourceStatus, reason: Option<&str>) {
        let name = self.name.clone();
        self.record(&name, STACK_RESOURCE_TYPE, status, reason);
    }

    fn description(&self) -> StackDescription {
        StackDescription {
            stack_id: self.stack_id.clone(),
            stack_name: self.name.clone(),
            status: self.status,
            status_reason: None,
        }
    }
}

/// Everything the simulated services know about
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocalState {
    clusters: BTreeMap<String, LocalCluster>,
    stacks: BTreeMap<String, LocalStack>,
    instances: BTreeMap<String, ComputeInstance>,
}

/// Local backend persisted as JSON
pub struct LocalBackend {
    /// State file path
    path: PathBuf,
    /// In-memory state, written back after every mutation
    state: Arc<RwLock<LocalState>>,
}

impl LocalBackend {
    /// Open (or start) the state kept in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STATE_FILE);

        let state = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            LocalState::default()
        };

        tracing::debug!("Local backend state at {}", path.display());

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// State file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Place a task on a cluster, on its first container instance if it has one
    pub fn register_task(&self, cluster: &str, mut task: Task) -> Result<()> {
        self.mutate(|state| {
            let entry = state
                .clusters
                .get_mut(cluster)
                .ok_or_else(|| ServiceError::new(CLUSTER_NOT_FOUND, "Cluster not found."))?;

            if task.container_instance_arn.is_none() {
                task.container_instance_arn = entry
                    .container_instances
                    .first()
                    .map(|ci| ci.container_instance_arn.clone());
            }
            entry.tasks.push(task);
            Ok(())
        })
        .map_err(|e| KeelError::remote("RegisterTask", cluster, e))
    }

    fn read<T>(&self, f: impl FnOnce(&LocalState) -> ServiceResult<T>) -> ServiceResult<T> {
        let state = self
            .state
            .read()
            .map_err(|_| ServiceError::new(INTERNAL_FAILURE, "Failed to acquire read lock"))?;
        f(&state)
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut LocalState) -> ServiceResult<T>) -> ServiceResult<T> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ServiceError::new(INTERNAL_FAILURE, "Failed to acquire write lock"))?;

        let value = f(&mut state)?;
        self.save(&state)?;
        Ok(value)
    }

    fn save(&self, state: &LocalState) -> ServiceResult<()> {
        let data = serde_json::to_string_pretty(state)
            .map_err(|e| ServiceError::new(INTERNAL_FAILURE, e.to_string()))?;
        std::fs::write(&self.path, data).map_err(|e| ServiceError::new(INTERNAL_FAILURE, e.to_string()))
    }
}

impl StackService for LocalBackend {
    fn create_stack(&self, input: CreateStackInput) -> ServiceResult<String> {
        let declared = template_parameters(&input.template_body)?;
        check_capabilities(&input.template_body, &input.capabilities)?;
        let parameters = resolve_create(&declared, &input.parameters)?;

        self.mutate(|state| {
            if state.stacks.contains_key(&input.stack_name) {
                return Err(ServiceError::new(
                    "AlreadyExistsException",
                    format!("Stack [{}] already exists", input.stack_name),
                ));
            }

            let mut stack = LocalStack {
                stack_id: format!("stack/{}/{}", input.stack_name, Uuid::new_v4()),
                name: input.stack_name.clone(),
                status: StackStatus::CreateInProgress,
                parameters,
                template_body: input.template_body,
                events: Vec::new(),
            };
            stack.record_stack(ResourceStatus::CreateInProgress, Some("User Initiated"));

            let id = stack.stack_id.clone();
            state.stacks.insert(input.stack_name, stack);
            Ok(id)
        })
    }

    fn update_stack(&self, input: UpdateStackInput) -> ServiceResult<String> {
        if !input.use_previous_template {
            return Err(validation("Updates must reuse the previous template"));
        }

        self.mutate(|state| {
            let stack = state
                .stacks
                .get_mut(&input.stack_name)
                .ok_or_else(|| ServiceError::stack_not_found(&input.stack_name))?;

            if !matches!(
                stack.status,
                StackStatus::CreateComplete | StackStatus::UpdateComplete | StackStatus::UpdateRollbackComplete
            ) {
                return Err(validation(format!(
                    "Stack:{} is in {} state and can not be updated.",
                    stack.name, stack.status
                )));
            }

            let declared = template_parameters(&stack.template_body)?;
            check_capabilities(&stack.template_body, &input.capabilities)?;
            let parameters = resolve_update(&declared, &stack.parameters, &input.parameters)?;
            if parameters == stack.parameters {
                return Err(validation("No updates are to be performed."));
            }

            stack.parameters = parameters;
            stack.status = StackStatus::UpdateInProgress;
            stack.record_stack(ResourceStatus::UpdateInProgress, Some("User Initiated"));
            Ok(stack.stack_id.clone())
        })
    }

    fn delete_stack(&self, name: &str) -> ServiceResult<()> {
        self.mutate(|state| {
            // Deleting a missing stack is not an error.
            if let Some(stack) = state.stacks.get_mut(name) {
                if stack.status != StackStatus::DeleteInProgress {
                    stack.status = StackStatus::DeleteInProgress;
                    stack.record_stack(ResourceStatus::DeleteInProgress, Some("User Initiated"));
                }
            }
            Ok(())
        })
    }

    fn describe_stack(&self, name: &str) -> ServiceResult<StackDescription> {
        self.mutate(|state| settle(state, name))?
            .ok_or_else(|| ServiceError::stack_not_found(name))
    }

    fn describe_stack_events(
        &self,
        name: &str,
        next_token: Option<&str>,
    ) -> ServiceResult<StackEventPage> {
        self.read(|state| {
            let stack = state
                .stacks
                .get(name)
                .ok_or_else(|| ServiceError::stack_not_found(name))?;

            let offset = match next_token {
                Some(token) => token
                    .parse::<usize>()
                    .map_err(|_| validation(format!("Invalid pagination token: {}", token)))?,
                None => 0,
            };

            let events: Vec<StackEvent> = stack
                .events
                .iter()
                .rev()
                .skip(offset)
                .take(EVENT_PAGE_SIZE)
                .cloned()
                .collect();
            let end = offset + events.len();
            let next_token = (end < stack.events.len()).then(|| end.to_string());

            Ok(StackEventPage { events, next_token })
        })
    }
}

impl OrchestrationService for LocalBackend {
    fn create_cluster(&self, name: &str) -> ServiceResult<String> {
        self.mutate(|state| {
            let cluster = state
                .clusters
                .entry(name.to_string())
                .or_insert_with(|| LocalCluster {
                    arn: format!("cluster/{}", name),
                    status: CLUSTER_ACTIVE.to_string(),
                    tasks: Vec::new(),
                    container_instances: Vec::new(),
                });
            cluster.status = CLUSTER_ACTIVE.to_string();
            Ok(cluster.arn.clone())
        })
    }

    fn delete_cluster(&self, name: &str) -> ServiceResult<String> {
        self.mutate(|state| {
            let cluster = state
                .clusters
                .get_mut(name)
                .ok_or_else(|| ServiceError::new(CLUSTER_NOT_FOUND, "Cluster not found."))?;

            if !cluster.container_instances.is_empty() {
                return Err(ServiceError::new(
                    "ClusterContainsContainerInstancesException",
                    "The Cluster cannot be deleted while Container Instances are active or draining.",
                ));
            }

            cluster.status = CLUSTER_INACTIVE.to_string();
            cluster.tasks.clear();
            Ok(cluster.arn.clone())
        })
    }

    fn is_active_cluster(&self, name: &str) -> ServiceResult<bool> {
        self.read(|state| {
            Ok(state
                .clusters
                .get(name)
                .is_some_and(|c| c.status == CLUSTER_ACTIVE))
        })
    }

    fn list_tasks(&self, cluster: &str) -> ServiceResult<Vec<Task>> {
        self.read(|state| {
            state
                .clusters
                .get(cluster)
                .map(|c| c.tasks.clone())
                .ok_or_else(|| ServiceError::new(CLUSTER_NOT_FOUND, "Cluster not found."))
        })
    }

    fn describe_container_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> ServiceResult<Vec<ContainerInstance>> {
        self.read(|state| {
            let cluster = state
                .clusters
                .get(cluster)
                .ok_or_else(|| ServiceError::new(CLUSTER_NOT_FOUND, "Cluster not found."))?;

            Ok(cluster
                .container_instances
                .iter()
                .filter(|ci| arns.contains(&ci.container_instance_arn))
                .cloned()
                .collect())
        })
    }
}

impl ComputeService for LocalBackend {
    fn describe_instances(&self, ids: &[String]) -> ServiceResult<Vec<ComputeInstance>> {
        self.read(|state| {
            Ok(ids
                .iter()
                .filter_map(|id| state.instances.get(id).cloned())
                .collect())
        })
    }
}

/// Finish any in-progress operation; `None` once the stack is gone
fn settle(state: &mut LocalState, name: &str) -> ServiceResult<Option<StackDescription>> {
    let LocalState {
        clusters,
        stacks,
        instances,
    } = state;

    let Some(stack) = stacks.get_mut(name) else {
        return Ok(None);
    };

    match stack.status {
        StackStatus::CreateInProgress => {
            for resource in template_resources(&stack.template_body)? {
                stack.record(&resource.0, &resource.1, ResourceStatus::CreateInProgress, None);
                stack.record(&resource.0, &resource.1, ResourceStatus::CreateComplete, None);
            }
            stack.status = StackStatus::CreateComplete;
            stack.record_stack(ResourceStatus::CreateComplete, None);
            resize_capacity(clusters, instances, &stack.parameters);
        }
        StackStatus::UpdateInProgress => {
            stack.record(SCALING_GROUP_RESOURCE, "AWS::AutoScaling::AutoScalingGroup", ResourceStatus::UpdateInProgress, None);
            stack.record(SCALING_GROUP_RESOURCE, "AWS::AutoScaling::AutoScalingGroup", ResourceStatus::UpdateComplete, None);
            stack.status = StackStatus::UpdateComplete;
            stack.record_stack(ResourceStatus::UpdateComplete, None);
            resize_capacity(clusters, instances, &stack.parameters);
        }
        StackStatus::DeleteInProgress => {
            let mut parameters = stack.parameters.clone();
            parameters.insert(PARAM_ASG_MAX_SIZE.to_string(), "0".to_string());
            resize_capacity(clusters, instances, &parameters);
            stacks.remove(name);
            tracing::debug!("Local stack {} deleted", name);
            return Ok(None);
        }
        _ => {}
    }

    Ok(Some(stack.description()))
}

/// Register or deregister container instances until the cluster has `AsgMaxSize`
fn resize_capacity(
    clusters: &mut BTreeMap<String, LocalCluster>,
    instances: &mut BTreeMap<String, ComputeInstance>,
    parameters: &BTreeMap<String, String>,
) {
    let Some(cluster_name) = parameters.get(PARAM_CLUSTER) else {
        return;
    };
    let Some(cluster) = clusters.get_mut(cluster_name) else {
        tracing::warn!("Stack capacity targets unknown cluster {}", cluster_name);
        return;
    };
    let size = parameters
        .get(PARAM_ASG_MAX_SIZE)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1);

    while cluster.container_instances.len() > size {
        if let Some(ci) = cluster.container_instances.pop() {
            instances.remove(&ci.compute_instance_id);
            cluster
                .tasks
                .retain(|t| t.container_instance_arn.as_deref() != Some(ci.container_instance_arn.as_str()));
        }
    }

    while cluster.container_instances.len() < size {
        let index = cluster.container_instances.len();
        let instance_id = format!("i-{}", short_id());
        instances.insert(
            instance_id.clone(),
            ComputeInstance {
                instance_id: instance_id.clone(),
                public_ip: None,
                private_ip: Some(private_address(index)),
            },
        );
        cluster.container_instances.push(ContainerInstance {
            container_instance_arn: format!("container-instance/{}/{}", cluster_name, short_id()),
            compute_instance_id: instance_id,
        });
    }
}

fn template_parameters(body: &str) -> ServiceResult<Vec<TemplateParameter>> {
    declared_parameters(body).map_err(|e| validation(format!("Template format error: {}", e)))
}

fn template_resources(body: &str) -> ServiceResult<Vec<(String, String)>> {
    declared_resources(body)
        .map(|resources| {
            resources
                .into_iter()
                .map(|r| (r.logical_id, r.resource_type))
                .collect()
        })
        .map_err(|e| validation(format!("Template format error: {}", e)))
}

/// Templates creating identity resources must be acknowledged
fn check_capabilities(body: &str, capabilities: &[String]) -> ServiceResult<()> {
    let needs_iam = template_resources(body)?
        .iter()
        .any(|(_, resource_type)| resource_type.starts_with("AWS::IAM::"));

    if needs_iam && !capabilities.iter().any(|c| c == CAPABILITY_IAM) {
        return Err(ServiceError::new(
            "InsufficientCapabilitiesException",
            format!("Requires capabilities : [{}]", CAPABILITY_IAM),
        ));
    }
    Ok(())
}

fn resolve_create(
    declared: &[TemplateParameter],
    supplied: &[StackParameter],
) -> ServiceResult<BTreeMap<String, String>> {
    check_declared(declared, supplied)?;

    let mut values = BTreeMap::new();
    for param in declared {
        let given = supplied.iter().find(|p| p.key == param.name);
        let value = match given {
            Some(p) if p.inherit_previous => {
                return Err(validation(format!(
                    "Invalid input for parameter key {}. Cannot specify usePreviousValue as true when creating a stack",
                    param.name
                )))
            }
            Some(p) => p.value.clone(),
            None => param.default.clone(),
        };

        let value = value.ok_or_else(|| validation(format!("Parameters: [{}] must have values", param.name)))?;
        check_range(param, &value)?;
        values.insert(param.name.clone(), value);
    }

    Ok(values)
}

/// Parameters left out of an update fall back to their template default
fn resolve_update(
    declared: &[TemplateParameter],
    previous: &BTreeMap<String, String>,
    supplied: &[StackParameter],
) -> ServiceResult<BTreeMap<String, String>> {
    check_declared(declared, supplied)?;

    let mut values = BTreeMap::new();
    for param in declared {
        let given = supplied.iter().find(|p| p.key == param.name);
        let value = match given {
            Some(p) if p.inherit_previous => Some(previous.get(&param.name).cloned().ok_or_else(|| {
                validation(format!(
                    "Invalid input for parameter key {}. Cannot specify usePreviousValue as true for a parameter key not in the previous template",
                    param.name
                ))
            })?),
            Some(p) => p.value.clone(),
            None => param.default.clone(),
        };

        let value = value.ok_or_else(|| validation(format!("Parameters: [{}] must have values", param.name)))?;
        check_range(param, &value)?;
        values.insert(param.name.clone(), value);
    }

    Ok(values)
}

fn check_declared(declared: &[TemplateParameter], supplied: &[StackParameter]) -> ServiceResult<()> {
    let unknown: Vec<&str> = supplied
        .iter()
        .filter(|p| !declared.iter().any(|d| d.name == p.key))
        .map(|p| p.key.as_str())
        .collect();

    if !unknown.is_empty() {
        return Err(validation(format!(
            "Parameters: [{}] do not exist in the template",
            unknown.join(", ")
        )));
    }
    Ok(())
}

fn validation(message: impl Into<String>) -> ServiceError {
    ServiceError::new(VALIDATION_ERROR_CODE, message)
}

fn check_range(param: &TemplateParameter, value: &str) -> ServiceResult<()> {
    if param.in_range(value) {
        return Ok(());
    }

    let bounds = match (param.min_value, param.max_value) {
        (Some(min), Some(max)) => format!("a number between {} and {}", min, max),
        (Some(min), None) => format!("a number not less than {}", min),
        (None, Some(max)) => format!("a number not greater than {}", max),
        (None, None) => "a number".to_string(),
    };
    Err(validation(format!("Parameter '{}' must be {}", param.name, bounds)))
}

/// Address in 10.0.0.0/16 for the instance at `index`, skipping the reserved first hosts
fn private_address(index: usize) -> String {
    let host = (index % 65_000) + 4;
    format!("10.0.{}.{}", host / 256, host % 256)
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}
