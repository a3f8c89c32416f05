//! Error types for Keel

use thiserror::Error;

/// Result type for Keel operations
pub type Result<T> = std::result::Result<T, KeelError>;

/// Result type for calls into a remote service
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Error code the stack service uses for request validation failures,
/// including lookups of stacks that do not exist.
pub const VALIDATION_ERROR_CODE: &str = "ValidationError";

/// Error returned by a remote service call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ServiceError {
    /// Service error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Validation error reporting that the named stack does not exist
    pub fn stack_not_found(name: &str) -> Self {
        Self::new(
            VALIDATION_ERROR_CODE,
            format!("Stack with id {} does not exist", name),
        )
    }

    /// Whether the service rejected the call because the resource is gone
    pub fn is_not_found(&self) -> bool {
        self.code == VALIDATION_ERROR_CODE && self.message.contains("does not exist")
    }
}

/// Keel error types
#[derive(Error, Debug)]
pub enum KeelError {
    #[error("Missing required flag: --{0}")]
    MissingFlag(String),

    #[error("Invalid flags: {0}")]
    InvalidFlags(String),

    #[error("Invalid size '{0}': expected a positive integer")]
    InvalidSize(String),

    #[error("A stack already exists for cluster {cluster}: {stack}")]
    StackExists { cluster: String, stack: String },

    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Cluster is not active: {0}")]
    ClusterNotActive(String),

    #[error("Invalid cluster name: {0}")]
    InvalidClusterName(String),

    #[error("Parameter key must not be empty")]
    InvalidParameterKey,

    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Parameter {0} has no value and does not inherit its previous value")]
    InvalidParameter(String),

    #[error("{operation} failed for {resource}: {source}")]
    Remote {
        operation: &'static str,
        resource: String,
        #[source]
        source: ServiceError,
    },

    #[error("Stack {stack} failed with status {status}: {reason}")]
    StackFailed {
        stack: String,
        status: String,
        reason: String,
    },

    #[error("Timed out waiting for {operation} of stack {stack} after {attempts} attempts")]
    StackTimeout {
        stack: String,
        operation: &'static str,
        attempts: u32,
    },

    #[error("Events for stack {0} are not ordered newest first")]
    EventOrder(String),

    #[error("No default image known for region: {0}")]
    UnsupportedRegion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl KeelError {
    /// Wrap a remote failure with the operation and resource it concerned
    pub fn remote(operation: &'static str, resource: &str, source: ServiceError) -> Self {
        Self::Remote {
            operation,
            resource: resource.to_string(),
            source,
        }
    }

    /// Operation was accepted but did not reach a terminal state in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StackTimeout { .. })
    }

    /// A user-correctable precondition was not met
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            Self::MissingFlag(_)
                | Self::InvalidFlags(_)
                | Self::InvalidSize(_)
                | Self::StackExists { .. }
                | Self::StackNotFound(_)
                | Self::ClusterNotActive(_)
        )
    }
}
