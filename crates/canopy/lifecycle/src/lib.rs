//! Lifecycle management for Canopy deployments.
//!
//! Ties the registry, the site template, and the provisioning engine
//! together behind one orchestrator, and enforces the per-deployment
//! exclusivity rule through an explicit lease table.

pub mod error;
pub mod guard;
pub mod orchestrator;

pub use error::{LifecycleError, Result};
pub use guard::{OperationGuard, OperationLease};
pub use orchestrator::LifecycleOrchestrator;
