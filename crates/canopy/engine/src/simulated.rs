//! Deterministic in-process engine for development and tests.
//!
//! Stacks live in a concurrent map and behave like the real thing:
//! create registers a named slot, apply resolves the program's declared
//! outputs and commits program and outputs together, destroy clears the
//! outputs but keeps the record until it is removed. There is no
//! randomness anywhere; the same call sequence always produces the same
//! outputs. Tests steer failures explicitly through the one-shot fault
//! and gate hooks instead.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canopy_types::{DeploymentName, Outputs, ProjectNamespace};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::engine::{ProvisioningEngine, StackHandle};
use crate::error::{EngineError, Result};
use crate::program::{ResourceProgram, ResourceSpec};

type StackKey = (ProjectNamespace, DeploymentName);

#[derive(Debug)]
struct StackSlot {
    program: ResourceProgram,
    parameters: BTreeMap<String, String>,
    outputs: Option<Outputs>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultOperation {
    Apply,
    Destroy,
}

#[derive(Debug, Clone)]
struct Fault {
    operation: FaultOperation,
    detail: String,
}

#[derive(Debug)]
struct GateInner {
    entered: Semaphore,
    release: Semaphore,
}

/// Handle to a pending apply gate.
///
/// Returned by [`SimulatedEngine::hold_next_apply`]. The next apply on
/// the gated stack signals [`entered`](Self::entered) and then blocks
/// inside the engine until [`release`](Self::release), which lets tests
/// hold an operation in flight for as long as an assertion needs.
#[derive(Debug, Clone)]
pub struct ApplyGate {
    inner: Arc<GateInner>,
}

impl ApplyGate {
    /// Resolves once the gated apply has reached the engine.
    pub async fn entered(&self) {
        if let Ok(permit) = self.inner.entered.acquire().await {
            permit.forget();
        }
    }

    /// Lets the gated apply proceed.
    pub fn release(&self) {
        self.inner.release.add_permits(1);
    }
}

/// In-process [`ProvisioningEngine`] keyed purely on project and name.
///
/// Handles are trusted: the simulation does not verify handle tokens.
#[derive(Debug, Default)]
pub struct SimulatedEngine {
    stacks: DashMap<StackKey, StackSlot>,
    faults: DashMap<DeploymentName, Fault>,
    gates: DashMap<DeploymentName, Arc<GateInner>>,
    apply_delay_ms: AtomicU64,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next apply on `name` fail with the given detail.
    pub fn inject_apply_failure(&self, name: &DeploymentName, detail: impl Into<String>) {
        self.faults.insert(
            name.clone(),
            Fault {
                operation: FaultOperation::Apply,
                detail: detail.into(),
            },
        );
    }

    /// Makes the next destroy on `name` fail with the given detail.
    pub fn inject_destroy_failure(&self, name: &DeploymentName, detail: impl Into<String>) {
        self.faults.insert(
            name.clone(),
            Fault {
                operation: FaultOperation::Destroy,
                detail: detail.into(),
            },
        );
    }

    /// Gates the next apply on `name`; see [`ApplyGate`].
    pub fn hold_next_apply(&self, name: &DeploymentName) -> ApplyGate {
        let inner = Arc::new(GateInner {
            entered: Semaphore::new(0),
            release: Semaphore::new(0),
        });
        self.gates.insert(name.clone(), inner.clone());
        ApplyGate { inner }
    }

    /// Adds a fixed pause to every apply. Zero disables the pause.
    pub fn set_apply_delay(&self, delay: Duration) {
        self.apply_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    fn key(name: &DeploymentName, project: &ProjectNamespace) -> StackKey {
        (project.clone(), name.clone())
    }

    fn take_fault(&self, name: &DeploymentName, operation: FaultOperation) -> Option<Fault> {
        self.faults
            .remove_if(name, |_, fault| fault.operation == operation)
            .map(|(_, fault)| fault)
    }
}

fn resolve_outputs(
    program: &ResourceProgram,
    parameters: &BTreeMap<String, String>,
) -> Result<Outputs> {
    let mut outputs = Outputs::new();
    for spec in &program.outputs {
        let resource = program.resource(&spec.resource).ok_or_else(|| {
            EngineError::failure(
                "apply",
                format!(
                    "output '{}' references unknown resource '{}'",
                    spec.name, spec.resource
                ),
            )
        })?;
        let value = resolve_attribute(resource, &spec.attribute, parameters)?;
        outputs.set(spec.name.clone(), value);
    }
    Ok(outputs)
}

fn resolve_attribute(
    resource: &ResourceSpec,
    attribute: &str,
    parameters: &BTreeMap<String, String>,
) -> Result<serde_json::Value> {
    match attribute {
        "website_endpoint" => {
            let bucket = resource
                .property_str("bucket")
                .unwrap_or(resource.name.as_str());
            // Stack-level provider config wins over the declared region.
            let region = parameters
                .iter()
                .find(|(key, _)| key.ends_with(":region"))
                .map(|(_, value)| value.as_str())
                .or_else(|| resource.property_str("region"))
                .unwrap_or("local");
            Ok(json!(format!("http://{bucket}.{region}.site.test")))
        }
        "etag" => {
            let content = resource.property_str("content").unwrap_or_default();
            Ok(json!(blake3::hash(content.as_bytes()).to_hex().to_string()))
        }
        "id" => Ok(json!(resource
            .property_str("bucket")
            .unwrap_or(resource.name.as_str()))),
        other => Err(EngineError::failure(
            "apply",
            format!("resource '{}' has no attribute '{}'", resource.name, other),
        )),
    }
}

#[async_trait]
impl ProvisioningEngine for SimulatedEngine {
    async fn create_stack(
        &self,
        name: &DeploymentName,
        project: &ProjectNamespace,
        program: &ResourceProgram,
    ) -> Result<StackHandle> {
        program
            .validate()
            .map_err(|err| EngineError::failure("create", err.to_string()))?;
        match self.stacks.entry(Self::key(name, project)) {
            Entry::Occupied(_) => Err(EngineError::AlreadyExists(name.clone())),
            Entry::Vacant(slot) => {
                debug!(stack = %name, project = %project, "registering stack");
                slot.insert(StackSlot {
                    program: program.clone(),
                    parameters: BTreeMap::new(),
                    outputs: None,
                });
                Ok(StackHandle::new(name.clone(), project.clone()))
            }
        }
    }

    async fn select_stack(
        &self,
        name: &DeploymentName,
        project: &ProjectNamespace,
    ) -> Result<StackHandle> {
        if self.stacks.contains_key(&Self::key(name, project)) {
            Ok(StackHandle::new(name.clone(), project.clone()))
        } else {
            Err(EngineError::NotFound(name.clone()))
        }
    }

    async fn list_stacks(&self, project: &ProjectNamespace) -> Result<Vec<DeploymentName>> {
        Ok(self
            .stacks
            .iter()
            .filter(|entry| entry.key().0 == *project)
            .map(|entry| entry.key().1.clone())
            .collect())
    }

    async fn set_parameter(&self, handle: &StackHandle, key: &str, value: &str) -> Result<()> {
        match self.stacks.get_mut(&Self::key(handle.name(), handle.project())) {
            Some(mut slot) => {
                // A stack has one effective region. Switching provider
                // replaces the previous provider's region key.
                if key.ends_with(":region") {
                    slot.parameters.retain(|existing, _| !existing.ends_with(":region"));
                }
                slot.parameters.insert(key.to_string(), value.to_string());
                Ok(())
            }
            None => Err(EngineError::NotFound(handle.name().clone())),
        }
    }

    async fn apply(&self, handle: &StackHandle, program: &ResourceProgram) -> Result<Outputs> {
        let key = Self::key(handle.name(), handle.project());
        if !self.stacks.contains_key(&key) {
            return Err(EngineError::NotFound(handle.name().clone()));
        }

        if let Some((_, gate)) = self.gates.remove(handle.name()) {
            debug!(stack = %handle.name(), "apply holding at gate");
            gate.entered.add_permits(1);
            if let Ok(permit) = gate.release.acquire().await {
                permit.forget();
            }
        }

        let delay = self.apply_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Some(fault) = self.take_fault(handle.name(), FaultOperation::Apply) {
            return Err(EngineError::failure("apply", fault.detail));
        }

        program
            .validate()
            .map_err(|err| EngineError::failure("apply", err.to_string()))?;

        let parameters = self
            .stacks
            .get(&key)
            .map(|slot| slot.parameters.clone())
            .ok_or_else(|| EngineError::NotFound(handle.name().clone()))?;
        let outputs = resolve_outputs(program, &parameters)?;

        match self.stacks.get_mut(&key) {
            Some(mut slot) => {
                slot.program = program.clone();
                slot.outputs = Some(outputs.clone());
            }
            None => return Err(EngineError::NotFound(handle.name().clone())),
        }
        debug!(stack = %handle.name(), session = %handle.token(), resources = program.resources.len(), "apply complete");
        Ok(outputs)
    }

    async fn destroy(&self, handle: &StackHandle) -> Result<()> {
        let key = Self::key(handle.name(), handle.project());
        if !self.stacks.contains_key(&key) {
            return Err(EngineError::NotFound(handle.name().clone()));
        }
        if let Some(fault) = self.take_fault(handle.name(), FaultOperation::Destroy) {
            return Err(EngineError::failure("destroy", fault.detail));
        }
        if let Some(mut slot) = self.stacks.get_mut(&key) {
            slot.outputs = None;
        }
        debug!(stack = %handle.name(), "destroy complete");
        Ok(())
    }

    async fn get_outputs(&self, handle: &StackHandle) -> Result<Outputs> {
        self.stacks
            .get(&Self::key(handle.name(), handle.project()))
            .map(|slot| slot.outputs.clone().unwrap_or_default())
            .ok_or_else(|| EngineError::NotFound(handle.name().clone()))
    }

    async fn remove_stack(&self, handle: &StackHandle) -> Result<()> {
        let key = Self::key(handle.name(), handle.project());
        if self.stacks.remove(&key).is_some() {
            debug!(stack = %handle.name(), "stack removed");
            Ok(())
        } else {
            Err(EngineError::NotFound(handle.name().clone()))
        }
    }

    fn backend_name(&self) -> &'static str {
        "simulated"
    }
}
