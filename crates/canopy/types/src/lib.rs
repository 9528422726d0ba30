//! Core types for Canopy, the deployment control plane.
//!
//! This crate defines the vocabulary shared by every other Canopy crate:
//! validated identifiers, the deployment record and its derived state,
//! engine outputs, and provider configuration. It carries no behavior
//! beyond validation and accessors so that the engine, registry, and
//! lifecycle crates can all depend on it without dragging in async
//! machinery.

pub mod deployment;
pub mod ids;
pub mod provider;

pub use deployment::{
    Deployment, DeploymentState, FailureRecord, OperationKind, Outputs,
};
pub use ids::{DeploymentName, NameError, ProjectNamespace};
pub use provider::ProviderConfig;
