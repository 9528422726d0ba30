//! The provisioning engine trait.

use async_trait::async_trait;
use canopy_types::{DeploymentName, Outputs, ProjectNamespace};
use uuid::Uuid;

use crate::error::Result;
use crate::program::ResourceProgram;

/// Opaque reference to a named stack inside an engine.
///
/// Handles are issued by the engine and passed back to it; callers only
/// ever read the name and project for logging and error reporting.
#[derive(Debug, Clone)]
pub struct StackHandle {
    name: DeploymentName,
    project: ProjectNamespace,
    token: Uuid,
}

impl StackHandle {
    pub fn new(name: DeploymentName, project: ProjectNamespace) -> Self {
        Self {
            name,
            project,
            token: Uuid::new_v4(),
        }
    }

    pub fn name(&self) -> &DeploymentName {
        &self.name
    }

    pub fn project(&self) -> &ProjectNamespace {
        &self.project
    }

    /// Correlation id for tracing an engine session.
    pub fn token(&self) -> Uuid {
        self.token
    }
}

/// Declarative provisioning engine driven by the lifecycle layer.
///
/// Implementations own all durable state: which stacks exist, their last
/// applied program, and their outputs. Canopy never mirrors that state;
/// it asks the engine every time.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Registers a new named stack holding `program`. Fails with
    /// [`EngineError::AlreadyExists`](crate::EngineError::AlreadyExists)
    /// when the name is taken within the project.
    async fn create_stack(
        &self,
        name: &DeploymentName,
        project: &ProjectNamespace,
        program: &ResourceProgram,
    ) -> Result<StackHandle>;

    /// Obtains a handle to an existing stack.
    async fn select_stack(
        &self,
        name: &DeploymentName,
        project: &ProjectNamespace,
    ) -> Result<StackHandle>;

    /// Names of all stacks in a project, in engine-reported order.
    async fn list_stacks(&self, project: &ProjectNamespace) -> Result<Vec<DeploymentName>>;

    /// Sets a stack-level configuration parameter.
    async fn set_parameter(&self, handle: &StackHandle, key: &str, value: &str) -> Result<()>;

    /// Provisions the program's resources. On success the program becomes
    /// the stack's stored program and the returned outputs become its
    /// outputs; on failure the stack keeps whatever it held before.
    async fn apply(&self, handle: &StackHandle, program: &ResourceProgram) -> Result<Outputs>;

    /// Tears down the stack's resources. The stack record itself remains
    /// until [`remove_stack`](Self::remove_stack).
    async fn destroy(&self, handle: &StackHandle) -> Result<()>;

    /// Outputs of the last successful apply, empty if none.
    async fn get_outputs(&self, handle: &StackHandle) -> Result<Outputs>;

    /// Deletes the stack record.
    async fn remove_stack(&self, handle: &StackHandle) -> Result<()>;

    /// Short name of the backing implementation, for diagnostics.
    fn backend_name(&self) -> &'static str;
}
