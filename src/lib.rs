//! Keel - container cluster provisioning from the command line
//!
//! Keel registers a container cluster with an orchestration service and
//! provisions its compute capacity through an infrastructure stack. It
//! provides:
//!
//! - Stack parameters with inherit-previous semantics for updates
//! - Stack lifecycle control with bounded polling and failure diagnosis
//! - Cluster `up`, `down`, `scale` and `ps` commands
//! - A file-backed local backend standing in for the remote services

pub mod backend;
pub mod cluster;
pub mod error;
pub mod stack;

#[cfg(test)]
mod testing;

pub use error::{KeelError, Result};
