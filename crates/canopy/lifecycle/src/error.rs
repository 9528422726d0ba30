//! Lifecycle error taxonomy.

use canopy_engine::{EngineError, ProgramError};
use canopy_registry::RegistryError;
use canopy_types::{DeploymentName, OperationKind};
use thiserror::Error;

/// Every way a lifecycle operation can fail.
///
/// The set is closed on purpose. Callers, the REST layer included,
/// branch on exactly these variants; anything the engine reports that is
/// not an existence conflict lands in [`Engine`](Self::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("deployment already exists: {0}")]
    AlreadyExists(DeploymentName),

    #[error("deployment not found: {0}")]
    NotFound(DeploymentName),

    #[error("{running} already in flight for deployment '{name}'")]
    OperationInFlight {
        name: DeploymentName,
        running: OperationKind,
    },

    #[error("engine failure during {phase}: {source}")]
    Engine {
        phase: String,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Program(#[from] ProgramError),
}

impl LifecycleError {
    pub(crate) fn engine(phase: &str, source: EngineError) -> Self {
        Self::Engine {
            phase: phase.to_string(),
            source,
        }
    }
}

impl From<RegistryError> for LifecycleError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyExists(name) => Self::AlreadyExists(name),
            RegistryError::NotFound(name) => Self::NotFound(name),
            RegistryError::Engine(source) => Self::Engine {
                phase: "registry".to_string(),
                source,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
