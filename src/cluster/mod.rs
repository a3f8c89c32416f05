//! Cluster orchestration
//!
//! This module sequences the orchestration service and the stack controller
//! into the cluster commands.

pub mod client;
pub mod config;
pub mod image;
pub mod orchestrator;
pub mod ps;
pub mod request;

pub use client::{ComputeService, OrchestrationService};
pub use config::ClusterConfig;
pub use image::{ImageResolver, RegionImageResolver};
pub use orchestrator::ClusterOrchestrator;
pub use ps::ContainerRow;
pub use request::{DownRequest, ScaleRequest, UpRequest};
