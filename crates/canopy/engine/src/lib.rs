//! Provisioning engine interface for Canopy.
//!
//! The engine is the external system that turns a declarative
//! [`ResourceProgram`] into live cloud resources. This crate defines the
//! trait Canopy drives it through, the program model and the static-site
//! template that produces programs, and a deterministic in-process
//! backend used for development and tests.

pub mod engine;
pub mod error;
pub mod program;
pub mod simulated;
pub mod template;

pub use engine::{ProvisioningEngine, StackHandle};
pub use error::{EngineError, ProgramError, Result};
pub use program::{OutputSpec, ResourceKind, ResourceProgram, ResourceSpec};
pub use simulated::{ApplyGate, SimulatedEngine};
pub use template::{SiteSpec, SiteTemplate, CONTENT_HASH_OUTPUT};
