//! Deployment registry for Canopy.
//!
//! The registry answers one question: which deployment names exist in a
//! project right now. It keeps no table of its own; every call delegates
//! to the engine's stack bookkeeping, so the set of registered names can
//! never drift from what the engine actually tracks.

use std::sync::Arc;

use canopy_engine::{EngineError, ProvisioningEngine, ResourceProgram, StackHandle};
use canopy_types::{DeploymentName, ProjectNamespace};
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("deployment already registered: {0}")]
    AlreadyExists(DeploymentName),

    #[error("deployment not registered: {0}")]
    NotFound(DeploymentName),

    #[error(transparent)]
    Engine(EngineError),
}

impl From<EngineError> for RegistryError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::AlreadyExists(name) => Self::AlreadyExists(name),
            EngineError::NotFound(name) => Self::NotFound(name),
            failure @ EngineError::Failure { .. } => Self::Engine(failure),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Project-scoped view of the engine's registered stacks.
#[derive(Clone)]
pub struct DeploymentRegistry {
    engine: Arc<dyn ProvisioningEngine>,
    project: ProjectNamespace,
}

impl DeploymentRegistry {
    pub fn new(engine: Arc<dyn ProvisioningEngine>, project: ProjectNamespace) -> Self {
        Self { engine, project }
    }

    pub fn project(&self) -> &ProjectNamespace {
        &self.project
    }

    /// Whether a deployment name is currently registered.
    pub async fn exists(&self, name: &DeploymentName) -> Result<bool> {
        match self.engine.select_stack(name, &self.project).await {
            Ok(_) => Ok(true),
            Err(EngineError::NotFound(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Registered names, in engine-reported order. The order is not
    /// guaranteed stable across calls.
    pub async fn list(&self) -> Result<Vec<DeploymentName>> {
        Ok(self.engine.list_stacks(&self.project).await?)
    }

    /// Claims a name by creating its stack.
    pub async fn register(
        &self,
        name: &DeploymentName,
        program: &ResourceProgram,
    ) -> Result<StackHandle> {
        debug!(deployment = %name, project = %self.project, "registering deployment");
        Ok(self.engine.create_stack(name, &self.project, program).await?)
    }

    /// Releases a name by removing its stack record.
    pub async fn unregister(&self, handle: &StackHandle) -> Result<()> {
        debug!(deployment = %handle.name(), project = %self.project, "unregistering deployment");
        Ok(self.engine.remove_stack(handle).await?)
    }
}
