//! Stack lifecycle controller
//!
//! Issues create, update and delete requests against the stack service and
//! polls until the stack reaches a terminal state. All three waits share one
//! polling routine parameterized by a [`WaitSpec`]: the status that means
//! success, the statuses that mean terminal failure, the predicate that marks
//! a single event as a failure, and the retry budget.

use super::client::{CreateStackInput, StackService, UpdateStackInput, CAPABILITY_IAM};
use super::params::ParameterSet;
use super::status::{is_newest_first, ResourceStatus, StackEvent, StackStatus};
use crate::error::{KeelError, Result};
use std::collections::HashSet;
use std::time::Duration;

/// Delay between two status checks
pub const POLL_DELAY: Duration = Duration::from_secs(10);

/// Status-check budget while waiting for a create
pub const CREATE_MAX_RETRIES: u32 = 150;

/// Status-check budget while waiting for a delete
pub const DELETE_MAX_RETRIES: u32 = 90;

/// Status-check budget while waiting for an update
pub const UPDATE_MAX_RETRIES: u32 = 60;

/// Blocking suspension between status checks
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Polling delay and per-operation retry budgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    pub delay: Duration,
    pub create_max_retries: u32,
    pub update_max_retries: u32,
    pub delete_max_retries: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            delay: POLL_DELAY,
            create_max_retries: CREATE_MAX_RETRIES,
            update_max_retries: UPDATE_MAX_RETRIES,
            delete_max_retries: DELETE_MAX_RETRIES,
        }
    }
}

/// What a single wait operation treats as success and failure
struct WaitSpec {
    operation: &'static str,
    success: StackStatus,
    is_failure: fn(&StackStatus) -> bool,
    event_failed: fn(&StackEvent) -> bool,
    max_retries: u32,
    /// The stack disappearing completes the operation
    absent_is_success: bool,
}

impl WaitSpec {
    fn create(policy: &WaitPolicy) -> Self {
        Self {
            operation: "create",
            success: StackStatus::CreateComplete,
            is_failure: StackStatus::is_create_failure,
            event_failed: |e| e.resource_status == ResourceStatus::CreateFailed,
            max_retries: policy.create_max_retries,
            absent_is_success: false,
        }
    }

    fn update(policy: &WaitPolicy) -> Self {
        Self {
            operation: "update",
            success: StackStatus::UpdateComplete,
            is_failure: StackStatus::is_update_failure,
            event_failed: |e| e.resource_status == ResourceStatus::UpdateFailed,
            max_retries: policy.update_max_retries,
            absent_is_success: false,
        }
    }

    fn delete(policy: &WaitPolicy) -> Self {
        Self {
            operation: "delete",
            success: StackStatus::DeleteComplete,
            is_failure: StackStatus::is_delete_failure,
            event_failed: |e| e.resource_status == ResourceStatus::DeleteFailed,
            max_retries: policy.delete_max_retries,
            absent_is_success: true,
        }
    }
}

/// Drives stack operations to completion
pub struct StackController<'a> {
    client: &'a dyn StackService,
    sleeper: &'a dyn Sleeper,
    policy: WaitPolicy,
}

impl<'a> StackController<'a> {
    /// Create a controller with the default wait policy
    pub fn new(client: &'a dyn StackService, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            client,
            sleeper,
            policy: WaitPolicy::default(),
        }
    }

    /// Replace the wait policy
    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create a stack from a template, returning the stack id
    pub fn create_stack(&self, template: &str, name: &str, params: &ParameterSet) -> Result<String> {
        params.validate()?;
        tracing::info!("Creating stack {}", name);

        let input = CreateStackInput {
            stack_name: name.to_string(),
            template_body: template.to_string(),
            parameters: params.all(),
            capabilities: vec![CAPABILITY_IAM.to_string()],
        };

        let id = self
            .client
            .create_stack(input)
            .map_err(|e| KeelError::remote("CreateStack", name, e))?;
        tracing::debug!("Stack {} has id {}", name, id);
        Ok(id)
    }

    /// Update a stack with its previous template, returning the stack id
    pub fn update_stack(&self, name: &str, params: &ParameterSet) -> Result<String> {
        params.validate()?;
        tracing::info!("Updating stack {}", name);

        let input = UpdateStackInput {
            stack_name: name.to_string(),
            use_previous_template: true,
            parameters: params.all(),
            capabilities: vec![CAPABILITY_IAM.to_string()],
        };

        self.client
            .update_stack(input)
            .map_err(|e| KeelError::remote("UpdateStack", name, e))
    }

    /// Request deletion of a stack
    pub fn delete_stack(&self, name: &str) -> Result<()> {
        tracing::info!("Deleting stack {}", name);
        self.client
            .delete_stack(name)
            .map_err(|e| KeelError::remote("DeleteStack", name, e))
    }

    /// Succeeds only if the stack can be described
    pub fn validate_stack_exists(&self, name: &str) -> Result<()> {
        match self.client.describe_stack(name) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Err(KeelError::StackNotFound(name.to_string())),
            Err(e) => Err(KeelError::remote("DescribeStacks", name, e)),
        }
    }

    pub fn wait_until_create_complete(&self, name: &str) -> Result<()> {
        self.wait(name, &WaitSpec::create(&self.policy))
    }

    pub fn wait_until_update_complete(&self, name: &str) -> Result<()> {
        self.wait(name, &WaitSpec::update(&self.policy))
    }

    pub fn wait_until_delete_complete(&self, name: &str) -> Result<()> {
        self.wait(name, &WaitSpec::delete(&self.policy))
    }

    fn wait(&self, name: &str, spec: &WaitSpec) -> Result<()> {
        for attempt in 0..spec.max_retries {
            match self.latest_event(name) {
                Ok(Some(event)) if (spec.event_failed)(&event) => {
                    return Err(KeelError::StackFailed {
                        stack: name.to_string(),
                        status: event.resource_status.to_string(),
                        reason: describe_event(&event),
                    });
                }
                Ok(_) => {}
                Err(e) if spec.absent_is_success && is_absent(&e) => {
                    tracing::info!("Stack {} no longer exists", name);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }

            let description = match self.client.describe_stack(name) {
                Ok(description) => description,
                Err(e) if spec.absent_is_success && e.is_not_found() => {
                    tracing::info!("Stack {} no longer exists", name);
                    return Ok(());
                }
                Err(e) => return Err(KeelError::remote("DescribeStacks", name, e)),
            };

            let status = description.status;
            if status == spec.success {
                tracing::info!("Stack {} reached {}", name, status);
                return Ok(());
            }

            if (spec.is_failure)(&status) {
                let root_cause = self.log_first_failure(name);
                let reason = root_cause
                    .or(description.status_reason)
                    .unwrap_or_else(|| "no reason given".to_string());

                return Err(KeelError::StackFailed {
                    stack: name.to_string(),
                    status: status.to_string(),
                    reason,
                });
            }

            if attempt % 2 == 0 {
                tracing::info!("Waiting for {} of stack {} to complete, status {}", spec.operation, name, status);
            } else {
                tracing::debug!("Stack {} status {} (attempt {})", name, status, attempt + 1);
            }

            self.sleeper.sleep(self.policy.delay);
        }

        Err(KeelError::StackTimeout {
            stack: name.to_string(),
            operation: spec.operation,
            attempts: spec.max_retries,
        })
    }

    /// The newest event of the stack, if it has any
    fn latest_event(&self, name: &str) -> Result<Option<StackEvent>> {
        let page = self
            .client
            .describe_stack_events(name, None)
            .map_err(|e| KeelError::remote("DescribeStackEvents", name, e))?;

        if !is_newest_first(&page.events) {
            return Err(KeelError::EventOrder(name.to_string()));
        }

        Ok(page.events.into_iter().next())
    }

    /// Walk the whole event history and return the chronologically first failure
    pub fn first_failure_event(&self, name: &str) -> Result<Option<StackEvent>> {
        let mut oldest_failure = None;
        let mut next_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let page = self
                .client
                .describe_stack_events(name, next_token.as_deref())
                .map_err(|e| KeelError::remote("DescribeStackEvents", name, e))?;

            if !is_newest_first(&page.events) {
                return Err(KeelError::EventOrder(name.to_string()));
            }

            // Pages run newest to oldest, so the last failure seen is the earliest.
            if let Some(event) = page.events.into_iter().filter(|e| e.resource_status.is_failed()).last() {
                oldest_failure = Some(event);
            }

            match page.next_token {
                Some(token) if !seen_tokens.insert(token.clone()) => {
                    tracing::warn!("Event pages of stack {} repeat token {}, stopping scan", name, token);
                    return Ok(oldest_failure);
                }
                Some(token) => next_token = Some(token),
                None => return Ok(oldest_failure),
            }
        }
    }

    /// Log the root cause of a failed operation; a failing scan is only logged
    fn log_first_failure(&self, name: &str) -> Option<String> {
        match self.first_failure_event(name) {
            Ok(Some(event)) => {
                tracing::error!(
                    "Stack {} failed at {} ({}): {}",
                    name,
                    event.logical_resource_id,
                    event.resource_type,
                    event.reason()
                );
                Some(describe_event(&event))
            }
            Ok(None) => {
                tracing::debug!("No failed resource events recorded for stack {}", name);
                None
            }
            Err(e) => {
                tracing::warn!("Unable to scan events of stack {}: {}", name, e);
                None
            }
        }
    }
}

fn describe_event(event: &StackEvent) -> String {
    format!(
        "{} ({}): {}",
        event.logical_resource_id,
        event.resource_type,
        event.reason()
    )
}

fn is_absent(err: &KeelError) -> bool {
    matches!(err, KeelError::Remote { source, .. } if source.is_not_found())
}
