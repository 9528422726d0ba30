//! Engine and program error types.

use canopy_types::DeploymentName;
use thiserror::Error;

/// Errors reported by a provisioning engine.
///
/// The taxonomy is deliberately closed: callers branch on exactly these
/// three cases and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("stack already exists: {0}")]
    AlreadyExists(DeploymentName),

    #[error("stack not found: {0}")]
    NotFound(DeploymentName),

    #[error("{operation} failed: {detail}")]
    Failure { operation: String, detail: String },
}

impl EngineError {
    pub(crate) fn failure(operation: &str, detail: impl Into<String>) -> Self {
        Self::Failure {
            operation: operation.to_string(),
            detail: detail.into(),
        }
    }
}

/// Structural problems in a resource program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("program declares no resources")]
    Empty,

    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),

    #[error("output '{name}' references unknown resource '{resource}'")]
    DanglingOutput { name: String, resource: String },

    #[error("resource '{resource}' depends on unknown resource '{dependency}'")]
    UnknownDependency { resource: String, dependency: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
