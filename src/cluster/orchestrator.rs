//! Cluster orchestrator
//!
//! Sequences calls to the orchestration service and the stack controller for
//! the `up`, `down`, `scale` and `ps` commands. Each command checks its guards
//! in order and stops at the first one that fails. Nothing is rolled back:
//! if stack creation fails after the cluster was registered, the cluster
//! stays and can be removed with `down` or reused by another `up`.

use super::client::{ComputeService, OrchestrationService};
use super::config::ClusterConfig;
use super::image::ImageResolver;
use super::ps::{container_instance_arns, container_rows, ContainerRow};
use super::request::{parse_size, DownRequest, ScaleRequest, UpRequest};
use crate::error::{KeelError, Result};
use crate::stack::controller::StackController;
use crate::stack::params::{ParameterSet, KNOWN_PARAMETERS, PARAM_ASG_MAX_SIZE, PARAM_IMAGE_ID, PARAM_KEY_PAIR};
use crate::stack::template::TemplateProvider;

/// Cluster orchestrator
pub struct ClusterOrchestrator<'a> {
    /// Cluster identity
    config: &'a ClusterConfig,
    /// Container-orchestration service
    clusters: &'a dyn OrchestrationService,
    /// Compute layer underneath the cluster
    compute: &'a dyn ComputeService,
    /// Stack lifecycle controller
    stacks: StackController<'a>,
    /// Template used for stack creation
    template: &'a dyn TemplateProvider,
    /// Default image lookup
    images: &'a dyn ImageResolver,
}

impl<'a> ClusterOrchestrator<'a> {
    /// Create a new orchestrator
    pub fn new(
        config: &'a ClusterConfig,
        clusters: &'a dyn OrchestrationService,
        compute: &'a dyn ComputeService,
        stacks: StackController<'a>,
        template: &'a dyn TemplateProvider,
        images: &'a dyn ImageResolver,
    ) -> Self {
        Self {
            config,
            clusters,
            compute,
            stacks,
            template,
            images,
        }
    }

    /// Register the cluster and create its stack
    pub fn up(&self, request: &UpRequest) -> Result<()> {
        if !request.capability_iam {
            return Err(KeelError::MissingFlag("capability-iam".to_string()));
        }

        let cluster = self.config.cluster();
        let stack_name = self.config.stack_name();
        let mut params = request.to_parameters(cluster)?;

        match self.stacks.validate_stack_exists(&stack_name) {
            Ok(()) => {
                return Err(KeelError::StackExists {
                    cluster: cluster.to_string(),
                    stack: stack_name,
                })
            }
            Err(KeelError::StackNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if !params.contains(PARAM_KEY_PAIR) {
            return Err(KeelError::MissingFlag("keypair".to_string()));
        }

        if !params.contains(PARAM_IMAGE_ID) {
            let image_id = self.images.resolve(self.config.region())?;
            tracing::info!("Using default image {} for region {}", image_id, self.config.region());
            params.add(PARAM_IMAGE_ID, &image_id)?;
        }

        params.validate()?;

        tracing::info!("Creating cluster {}", cluster);
        let cluster_id = self
            .clusters
            .create_cluster(cluster)
            .map_err(|e| KeelError::remote("CreateCluster", cluster, e))?;
        tracing::debug!("Cluster {} has id {}", cluster, cluster_id);

        let template = self.template.template_body()?;
        self.stacks.create_stack(&template, &stack_name, &params)?;
        self.stacks.wait_until_create_complete(&stack_name)?;

        tracing::info!("Cluster {} is up", cluster);
        Ok(())
    }

    /// Delete the stack, then the cluster
    pub fn down(&self, request: &DownRequest) -> Result<()> {
        if !request.force {
            return Err(KeelError::MissingFlag("force".to_string()));
        }

        let cluster = self.config.cluster();
        let stack_name = self.ensure_cluster_and_stack()?;

        self.stacks.delete_stack(&stack_name)?;
        self.stacks.wait_until_delete_complete(&stack_name)?;

        tracing::info!("Deleting cluster {}", cluster);
        self.clusters
            .delete_cluster(cluster)
            .map_err(|e| KeelError::remote("DeleteCluster", cluster, e))?;

        tracing::info!("Cluster {} is down", cluster);
        Ok(())
    }

    /// Change the number of instances in the cluster
    pub fn scale(&self, request: &ScaleRequest) -> Result<()> {
        if !request.capability_iam {
            return Err(KeelError::MissingFlag("capability-iam".to_string()));
        }

        let size = request
            .size
            .as_deref()
            .ok_or_else(|| KeelError::MissingFlag("size".to_string()))?;
        let size = parse_size(size)?;

        let stack_name = self.ensure_cluster_and_stack()?;

        let mut params = ParameterSet::for_update(KNOWN_PARAMETERS)?;
        params.add(PARAM_ASG_MAX_SIZE, &size.to_string())?;

        tracing::info!("Scaling cluster {} to {} instances", self.config.cluster(), size);
        self.stacks.update_stack(&stack_name, &params)?;
        self.stacks.wait_until_update_complete(&stack_name)?;

        Ok(())
    }

    /// List running containers with their published ports
    pub fn ps(&self) -> Result<Vec<ContainerRow>> {
        let cluster = self.config.cluster();
        self.ensure_active()?;

        let tasks = self
            .clusters
            .list_tasks(cluster)
            .map_err(|e| KeelError::remote("ListTasks", cluster, e))?;

        let arns = container_instance_arns(&tasks);
        if arns.is_empty() {
            return Ok(container_rows(&tasks, &[], &[]));
        }

        let container_instances = self
            .clusters
            .describe_container_instances(cluster, &arns)
            .map_err(|e| KeelError::remote("DescribeContainerInstances", cluster, e))?;

        let ids: Vec<String> = container_instances
            .iter()
            .map(|ci| ci.compute_instance_id.clone())
            .collect();
        let instances = self
            .compute
            .describe_instances(&ids)
            .map_err(|e| KeelError::remote("DescribeInstances", cluster, e))?;

        Ok(container_rows(&tasks, &container_instances, &instances))
    }

    fn ensure_active(&self) -> Result<()> {
        let cluster = self.config.cluster();
        let active = self
            .clusters
            .is_active_cluster(cluster)
            .map_err(|e| KeelError::remote("DescribeClusters", cluster, e))?;

        if !active {
            return Err(KeelError::ClusterNotActive(cluster.to_string()));
        }
        Ok(())
    }

    /// Guards shared by `down` and `scale`; returns the stack name
    fn ensure_cluster_and_stack(&self) -> Result<String> {
        self.ensure_active()?;
        let stack_name = self.config.stack_name();
        self.stacks.validate_stack_exists(&stack_name)?;
        Ok(stack_name)
    }
}
