//! Stack service interface

use super::params::StackParameter;
use super::status::{StackEventPage, StackStatus};
use crate::error::ServiceResult;
use serde::{Deserialize, Serialize};

/// Capability acknowledging that a template creates identity resources
pub const CAPABILITY_IAM: &str = "CAPABILITY_IAM";

/// Create request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStackInput {
    pub stack_name: String,
    pub template_body: String,
    pub parameters: Vec<StackParameter>,
    pub capabilities: Vec<String>,
}

/// Update request; the stack keeps its current template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStackInput {
    pub stack_name: String,
    pub use_previous_template: bool,
    pub parameters: Vec<StackParameter>,
    pub capabilities: Vec<String>,
}

/// Current state of a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    pub stack_id: String,
    pub stack_name: String,
    pub status: StackStatus,
    pub status_reason: Option<String>,
}

/// Remote infrastructure stack service
pub trait StackService {
    /// Start creating a stack, returning its id
    fn create_stack(&self, input: CreateStackInput) -> ServiceResult<String>;

    /// Start updating a stack, returning its id
    fn update_stack(&self, input: UpdateStackInput) -> ServiceResult<String>;

    /// Start deleting a stack
    fn delete_stack(&self, name: &str) -> ServiceResult<()>;

    /// Describe a stack; a missing stack is a not-found validation error
    fn describe_stack(&self, name: &str) -> ServiceResult<StackDescription>;

    /// One page of the stack's events. Events are newest first, and
    /// `next_token` pages further back in time.
    fn describe_stack_events(
        &self,
        name: &str,
        next_token: Option<&str>,
    ) -> ServiceResult<StackEventPage>;
}
