//! Scripted service fakes shared by unit tests

use crate::cluster::client::{ComputeInstance, ComputeService, ContainerInstance, OrchestrationService, Task};
use crate::cluster::image::ImageResolver;
use crate::error::{Result, ServiceError, ServiceResult};
use crate::stack::client::{CreateStackInput, StackDescription, StackService, UpdateStackInput};
use crate::stack::controller::Sleeper;
use crate::stack::status::{ResourceStatus, StackEvent, StackEventPage, StackStatus};
use crate::stack::template::TemplateProvider;
use chrono::DateTime;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

/// Build a stack event at `secs` after the epoch; an empty reason means none
pub fn event(secs: i64, logical_id: &str, status: ResourceStatus, reason: &str) -> StackEvent {
    StackEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        stack_name: "keel-setup-dev".to_string(),
        timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
        logical_resource_id: logical_id.to_string(),
        physical_resource_id: None,
        resource_type: format!("Test::{}", logical_id),
        resource_status: status,
        resource_status_reason: (!reason.is_empty()).then(|| reason.to_string()),
    }
}

/// Records requested sleeps instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    durations: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn count(&self) -> usize {
        self.durations.borrow().len()
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.durations.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.durations.borrow_mut().push(duration);
    }
}

/// Stack service answering describe calls from a script.
/// An exhausted script reports the stack as missing.
#[derive(Default)]
pub struct FakeStackService {
    describes: RefCell<VecDeque<ServiceResult<StackStatus>>>,
    event_pages: RefCell<Vec<StackEventPage>>,
    events_error: RefCell<Option<ServiceError>>,
    create_error: RefCell<Option<ServiceError>>,
    created: RefCell<Vec<CreateStackInput>>,
    updated: RefCell<Vec<UpdateStackInput>>,
    deleted: RefCell<Vec<String>>,
    calls: RefCell<Vec<String>>,
    describe_calls: Cell<usize>,
}

impl FakeStackService {
    pub fn with_statuses(statuses: Vec<StackStatus>) -> Self {
        let service = Self::default();
        for status in statuses {
            service.push_describe(Ok(status));
        }
        service
    }

    pub fn push_describe(&self, result: ServiceResult<StackStatus>) {
        self.describes.borrow_mut().push_back(result);
    }

    /// Pages addressed by index; page `n` is requested with token `n`
    pub fn set_event_pages(&self, pages: Vec<StackEventPage>) {
        *self.event_pages.borrow_mut() = pages;
    }

    pub fn set_events_error(&self, err: ServiceError) {
        *self.events_error.borrow_mut() = Some(err);
    }

    pub fn fail_create(&self, err: ServiceError) {
        *self.create_error.borrow_mut() = Some(err);
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.get()
    }

    pub fn created(&self) -> Vec<CreateStackInput> {
        self.created.borrow().clone()
    }

    pub fn updated(&self) -> Vec<UpdateStackInput> {
        self.updated.borrow().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }
}

impl StackService for FakeStackService {
    fn create_stack(&self, input: CreateStackInput) -> ServiceResult<String> {
        self.record("CreateStack");
        if let Some(err) = self.create_error.borrow().clone() {
            return Err(err);
        }
        let id = format!("stack/{}/1", input.stack_name);
        self.created.borrow_mut().push(input);
        Ok(id)
    }

    fn update_stack(&self, input: UpdateStackInput) -> ServiceResult<String> {
        self.record("UpdateStack");
        let id = format!("stack/{}/1", input.stack_name);
        self.updated.borrow_mut().push(input);
        Ok(id)
    }

    fn delete_stack(&self, name: &str) -> ServiceResult<()> {
        self.record("DeleteStack");
        self.deleted.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn describe_stack(&self, name: &str) -> ServiceResult<StackDescription> {
        self.record("DescribeStack");
        self.describe_calls.set(self.describe_calls.get() + 1);

        let next = self
            .describes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::stack_not_found(name)));

        next.map(|status| StackDescription {
            stack_id: format!("stack/{}/1", name),
            stack_name: name.to_string(),
            status,
            status_reason: None,
        })
    }

    fn describe_stack_events(
        &self,
        _name: &str,
        next_token: Option<&str>,
    ) -> ServiceResult<StackEventPage> {
        self.record("DescribeStackEvents");
        if let Some(err) = self.events_error.borrow().clone() {
            return Err(err);
        }

        let pages = self.event_pages.borrow();
        let index = match next_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ServiceError::new("ValidationError", "Invalid token"))?,
        };

        match pages.get(index) {
            Some(page) => Ok(page.clone()),
            None if index == 0 => Ok(StackEventPage::default()),
            None => Err(ServiceError::new("ValidationError", "Invalid token")),
        }
    }
}

/// Orchestration service with in-memory clusters, tasks and instances
#[derive(Default)]
pub struct FakeOrchestration {
    active: RefCell<BTreeSet<String>>,
    tasks: RefCell<Vec<Task>>,
    container_instances: RefCell<Vec<ContainerInstance>>,
    created: RefCell<Vec<String>>,
    deleted: RefCell<Vec<String>>,
    calls: RefCell<Vec<String>>,
}

impl FakeOrchestration {
    pub fn activate(&self, name: &str) {
        self.active.borrow_mut().insert(name.to_string());
    }

    pub fn add_task(&self, task: Task) {
        self.tasks.borrow_mut().push(task);
    }

    pub fn add_container_instance(&self, instance: ContainerInstance) {
        self.container_instances.borrow_mut().push(instance);
    }

    pub fn created(&self) -> Vec<String> {
        self.created.borrow().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }
}

impl OrchestrationService for FakeOrchestration {
    fn create_cluster(&self, name: &str) -> ServiceResult<String> {
        self.record("CreateCluster");
        self.created.borrow_mut().push(name.to_string());
        self.active.borrow_mut().insert(name.to_string());
        Ok(format!("cluster/{}", name))
    }

    fn delete_cluster(&self, name: &str) -> ServiceResult<String> {
        self.record("DeleteCluster");
        self.deleted.borrow_mut().push(name.to_string());
        self.active.borrow_mut().remove(name);
        Ok(format!("cluster/{}", name))
    }

    fn is_active_cluster(&self, name: &str) -> ServiceResult<bool> {
        self.record("DescribeClusters");
        Ok(self.active.borrow().contains(name))
    }

    fn list_tasks(&self, _cluster: &str) -> ServiceResult<Vec<Task>> {
        self.record("ListTasks");
        Ok(self.tasks.borrow().clone())
    }

    fn describe_container_instances(
        &self,
        _cluster: &str,
        arns: &[String],
    ) -> ServiceResult<Vec<ContainerInstance>> {
        self.record("DescribeContainerInstances");
        Ok(self
            .container_instances
            .borrow()
            .iter()
            .filter(|ci| arns.contains(&ci.container_instance_arn))
            .cloned()
            .collect())
    }
}

/// Compute layer with in-memory instances
#[derive(Default)]
pub struct FakeCompute {
    instances: RefCell<Vec<ComputeInstance>>,
    calls: RefCell<Vec<String>>,
}

impl FakeCompute {
    pub fn add_instance(&self, instance: ComputeInstance) {
        self.instances.borrow_mut().push(instance);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ComputeService for FakeCompute {
    fn describe_instances(&self, ids: &[String]) -> ServiceResult<Vec<ComputeInstance>> {
        self.calls.borrow_mut().push("DescribeInstances".to_string());
        Ok(self
            .instances
            .borrow()
            .iter()
            .filter(|i| ids.contains(&i.instance_id))
            .cloned()
            .collect())
    }
}

/// Image resolver returning a fixed id and recording the regions asked for
pub struct FakeImageResolver {
    image_id: String,
    regions: RefCell<Vec<String>>,
}

impl FakeImageResolver {
    pub fn new(image_id: &str) -> Self {
        Self {
            image_id: image_id.to_string(),
            regions: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.regions.borrow().len()
    }

    pub fn regions(&self) -> Vec<String> {
        self.regions.borrow().clone()
    }
}

impl ImageResolver for FakeImageResolver {
    fn resolve(&self, region: &str) -> Result<String> {
        self.regions.borrow_mut().push(region.to_string());
        Ok(self.image_id.clone())
    }
}

/// Template provider returning a fixed body
pub struct StaticTemplate(pub String);

impl TemplateProvider for StaticTemplate {
    fn template_body(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
