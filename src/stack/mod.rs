//! Infrastructure stack management
//!
//! This module provides stack parameters, the stack service interface and
//! the lifecycle controller that waits for stack operations to settle.

pub mod client;
pub mod controller;
pub mod params;
pub mod status;
pub mod template;

pub use client::{CreateStackInput, StackDescription, StackService, UpdateStackInput};
pub use controller::{Sleeper, StackController, ThreadSleeper, WaitPolicy};
pub use params::{ParameterSet, StackParameter};
pub use status::{ResourceStatus, StackEvent, StackEventPage, StackStatus};
pub use template::{EmbeddedTemplate, TemplateProvider};
