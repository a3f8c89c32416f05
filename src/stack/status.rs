//! Stack and resource statuses, stack events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate status of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    CreateInProgress,
    CreateFailed,
    CreateComplete,
    RollbackInProgress,
    RollbackFailed,
    RollbackComplete,
    DeleteInProgress,
    DeleteFailed,
    DeleteComplete,
    UpdateInProgress,
    UpdateCompleteCleanupInProgress,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackInProgress,
    UpdateRollbackFailed,
    UpdateRollbackCompleteCleanupInProgress,
    UpdateRollbackComplete,
    /// Status not recognised by this client
    #[serde(other)]
    Unknown,
}

impl StackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateFailed => "CREATE_FAILED",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            Self::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            Self::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Terminal failure statuses while waiting for a create
    pub fn is_create_failure(&self) -> bool {
        matches!(
            self,
            Self::CreateFailed
                | Self::DeleteComplete
                | Self::DeleteFailed
                | Self::DeleteInProgress
                | Self::RollbackComplete
                | Self::RollbackFailed
                | Self::RollbackInProgress
        )
    }

    /// Terminal failure statuses while waiting for an update
    pub fn is_update_failure(&self) -> bool {
        matches!(
            self,
            Self::UpdateRollbackComplete
                | Self::UpdateRollbackFailed
                | Self::UpdateRollbackInProgress
                | Self::UpdateRollbackCompleteCleanupInProgress
        )
    }

    /// Terminal failure statuses while waiting for a delete
    pub fn is_delete_failure(&self) -> bool {
        matches!(self, Self::DeleteFailed)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single resource inside a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    CreateInProgress,
    CreateFailed,
    CreateComplete,
    DeleteInProgress,
    DeleteFailed,
    DeleteComplete,
    DeleteSkipped,
    UpdateInProgress,
    UpdateFailed,
    UpdateComplete,
    RollbackInProgress,
    RollbackFailed,
    RollbackComplete,
    UpdateRollbackInProgress,
    UpdateRollbackFailed,
    UpdateRollbackComplete,
    #[serde(other)]
    Unknown,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateFailed => "CREATE_FAILED",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteSkipped => "DELETE_SKIPPED",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            Self::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Any `*_FAILED` status
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::CreateFailed
                | Self::DeleteFailed
                | Self::UpdateFailed
                | Self::RollbackFailed
                | Self::UpdateRollbackFailed
        )
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource-level status transition reported by the stack service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    /// Event ID
    pub event_id: String,
    /// Name of the stack the event belongs to
    pub stack_name: String,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
    /// Logical name of the resource in the template
    pub logical_resource_id: String,
    /// Identifier of the provisioned resource, once known
    pub physical_resource_id: Option<String>,
    /// Resource type (e.g. `Cluster::AutoScalingGroup`)
    pub resource_type: String,
    /// Resource status after the transition
    pub resource_status: ResourceStatus,
    /// Failure or progress reason
    pub resource_status_reason: Option<String>,
}

impl StackEvent {
    /// Reason text, or a placeholder when the service gave none
    pub fn reason(&self) -> &str {
        self.resource_status_reason
            .as_deref()
            .unwrap_or("no reason given")
    }
}

/// One page of stack events, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEventPage {
    pub events: Vec<StackEvent>,
    /// Token for the next (older) page
    pub next_token: Option<String>,
}

/// Whether a page honours the newest-first contract
pub fn is_newest_first(events: &[StackEvent]) -> bool {
    events.windows(2).all(|pair| pair[0].timestamp >= pair[1].timestamp)
}
