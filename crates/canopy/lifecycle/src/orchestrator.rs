//! Deployment lifecycle orchestration.
//!
//! The orchestrator owns the order of engine calls for each lifecycle
//! operation and nothing else: identity lives in the registry, content
//! topology in the template, exclusivity in the operation guard, and
//! resource state in the engine. Engine failures are surfaced once and
//! never retried here; what they leave behind is decided per operation
//! (create rolls its registration back, update and destroy leave the
//! deployment as it was).

use std::future::Future;
use std::sync::Arc;

use canopy_engine::{
    EngineError, ProvisioningEngine, ResourceProgram, SiteSpec, SiteTemplate, StackHandle,
};
use canopy_registry::{DeploymentRegistry, RegistryError};
use canopy_types::{
    Deployment, DeploymentName, DeploymentState, FailureRecord, OperationKind, Outputs,
    ProjectNamespace, ProviderConfig,
};
use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::{LifecycleError, Result};
use crate::guard::{OperationGuard, OperationLease};

/// Drives create, update, destroy, and inspection for one project.
pub struct LifecycleOrchestrator {
    engine: Arc<dyn ProvisioningEngine>,
    registry: DeploymentRegistry,
    guard: OperationGuard,
    template: SiteTemplate,
    provider: ProviderConfig,
    // Records exist only for names the engine still knows.
    failures: Arc<DashMap<DeploymentName, FailureRecord>>,
}

impl LifecycleOrchestrator {
    pub fn new(
        engine: Arc<dyn ProvisioningEngine>,
        project: ProjectNamespace,
        provider: ProviderConfig,
    ) -> Self {
        let registry = DeploymentRegistry::new(Arc::clone(&engine), project);
        Self {
            engine,
            registry,
            guard: OperationGuard::new(),
            template: SiteTemplate::new(),
            provider,
            failures: Arc::new(DashMap::new()),
        }
    }

    pub fn project(&self) -> &ProjectNamespace {
        self.registry.project()
    }

    /// Process-level provider defaults, overridable per request.
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn backend_name(&self) -> &'static str {
        self.engine.backend_name()
    }

    /// Number of mutating operations currently holding a lease.
    pub fn operations_in_flight(&self) -> usize {
        self.guard.in_flight()
    }

    /// Provisions a new deployment from caller content.
    pub async fn create(
        &self,
        name: &DeploymentName,
        content: &str,
        provider: Option<ProviderConfig>,
    ) -> Result<Deployment> {
        let lease = self.acquire(name, OperationKind::Create)?;
        if self.registry.exists(name).await? {
            return Err(LifecycleError::AlreadyExists(name.clone()));
        }
        let provider = self.effective_provider(provider);
        let program = self.bind_site(name, content, &provider)?;

        info!(deployment = %lease.name(), operation = %lease.operation(), provider = %provider, "creating deployment");
        let engine = Arc::clone(&self.engine);
        let registry = self.registry.clone();
        let failures = Arc::clone(&self.failures);
        let name = name.clone();

        // The lease rides inside the task: a caller that goes away
        // cannot cancel an operation the engine was already asked to run.
        run_to_completion("create", async move {
            let _lease = lease;
            let handle = match registry.register(&name, &program).await {
                Ok(handle) => handle,
                Err(RegistryError::AlreadyExists(name)) => {
                    return Err(LifecycleError::AlreadyExists(name));
                }
                Err(err) => {
                    // Registration never took; the name still reads absent.
                    let err = LifecycleError::from(err);
                    warn!(deployment = %name, error = %err, "deployment registration failed");
                    return Err(err);
                }
            };
            match provision(engine.as_ref(), &handle, &program, &provider).await {
                Ok(outputs) => {
                    failures.remove(&name);
                    info!(deployment = %name, url = outputs.url().unwrap_or(""), "deployment created");
                    Ok(Deployment {
                        name,
                        state: DeploymentState::Active,
                        outputs,
                        last_error: None,
                    })
                }
                Err(source) => {
                    let err = LifecycleError::engine("create", source);
                    // Roll the registration back so the name reads
                    // absent instead of half-created. A rolled-back name
                    // carries no failure record; only a name the engine
                    // still knows keeps one.
                    match registry.unregister(&handle).await {
                        Ok(()) => {
                            warn!(deployment = %name, error = %err, "create failed; registration rolled back");
                        }
                        Err(cleanup) => {
                            warn!(
                                deployment = %name,
                                error = %cleanup,
                                "rollback of failed create left a stack record behind"
                            );
                            record_failure(&failures, &name, OperationKind::Create, &err);
                        }
                    }
                    Err(err)
                }
            }
        })
        .await
    }

    /// Replaces a deployment's content in place.
    pub async fn update(
        &self,
        name: &DeploymentName,
        content: &str,
        provider: Option<ProviderConfig>,
    ) -> Result<Deployment> {
        let lease = self.acquire(name, OperationKind::Update)?;
        let handle = self.select(name).await?;
        let provider = self.effective_provider(provider);
        let program = self.bind_site(name, content, &provider)?;

        info!(deployment = %lease.name(), operation = %lease.operation(), provider = %provider, "updating deployment");
        let engine = Arc::clone(&self.engine);
        let failures = Arc::clone(&self.failures);
        let name = name.clone();

        run_to_completion("update", async move {
            let _lease = lease;
            match provision(engine.as_ref(), &handle, &program, &provider).await {
                Ok(outputs) => {
                    failures.remove(&name);
                    info!(deployment = %name, "deployment updated");
                    Ok(Deployment {
                        name,
                        state: DeploymentState::Active,
                        outputs,
                        last_error: None,
                    })
                }
                Err(source) => {
                    // Prior content and outputs stay live in the engine.
                    let err = LifecycleError::engine("update", source);
                    record_failure(&failures, &name, OperationKind::Update, &err);
                    Err(err)
                }
            }
        })
        .await
    }

    /// Tears down a deployment's resources and releases its name.
    pub async fn destroy(&self, name: &DeploymentName) -> Result<()> {
        let lease = self.acquire(name, OperationKind::Destroy)?;
        let handle = self.select(name).await?;

        info!(deployment = %lease.name(), operation = %lease.operation(), "destroying deployment");
        let engine = Arc::clone(&self.engine);
        let registry = self.registry.clone();
        let failures = Arc::clone(&self.failures);
        let name = name.clone();

        run_to_completion("destroy", async move {
            let _lease = lease;
            if let Err(source) = engine.destroy(&handle).await {
                let err = LifecycleError::engine("destroy", source);
                record_failure(&failures, &name, OperationKind::Destroy, &err);
                return Err(err);
            }
            match registry.unregister(&handle).await {
                Ok(()) => {
                    failures.remove(&name);
                    info!(deployment = %name, "deployment destroyed");
                    Ok(())
                }
                Err(err) => {
                    // Resources are gone but the name is still taken.
                    let err = LifecycleError::from(err);
                    record_failure(&failures, &name, OperationKind::Destroy, &err);
                    Err(err)
                }
            }
        })
        .await
    }

    /// Current view of one deployment.
    pub async fn get(&self, name: &DeploymentName) -> Result<Deployment> {
        let handle = self.select(name).await?;
        let outputs = match self.engine.get_outputs(&handle).await {
            Ok(outputs) => outputs,
            Err(EngineError::NotFound(name)) => return Err(LifecycleError::NotFound(name)),
            Err(err) => return Err(LifecycleError::engine("outputs", err)),
        };
        Ok(Deployment {
            name: name.clone(),
            state: self.observed_state(name),
            outputs,
            last_error: self.failures.get(name).map(|record| record.value().clone()),
        })
    }

    /// Names of all deployments in the project, in engine order.
    pub async fn list(&self) -> Result<Vec<DeploymentName>> {
        Ok(self.registry.list().await?)
    }

    fn acquire(&self, name: &DeploymentName, operation: OperationKind) -> Result<OperationLease> {
        match self.guard.try_acquire(name, operation) {
            Some(lease) => Ok(lease),
            None => Err(LifecycleError::OperationInFlight {
                name: name.clone(),
                running: self.guard.current(name).unwrap_or(operation),
            }),
        }
    }

    async fn select(&self, name: &DeploymentName) -> Result<StackHandle> {
        match self.engine.select_stack(name, self.registry.project()).await {
            Ok(handle) => Ok(handle),
            Err(EngineError::NotFound(name)) => Err(LifecycleError::NotFound(name)),
            Err(err) => Err(LifecycleError::engine("select", err)),
        }
    }

    fn effective_provider(&self, provider: Option<ProviderConfig>) -> ProviderConfig {
        provider.unwrap_or_else(|| self.provider.clone())
    }

    fn bind_site(
        &self,
        name: &DeploymentName,
        content: &str,
        provider: &ProviderConfig,
    ) -> Result<ResourceProgram> {
        let spec = SiteSpec {
            name: name.clone(),
            content: content.to_string(),
            project: self.registry.project().clone(),
            region: provider.region.clone(),
        };
        Ok(self.template.bind(&spec)?)
    }

    fn observed_state(&self, name: &DeploymentName) -> DeploymentState {
        match self.guard.current(name) {
            Some(operation) => operation.running_state(),
            None => DeploymentState::Active,
        }
    }
}

/// Sets provider parameters and applies the program, requiring the url
/// output every successful apply must report.
async fn provision(
    engine: &dyn ProvisioningEngine,
    handle: &StackHandle,
    program: &ResourceProgram,
    provider: &ProviderConfig,
) -> std::result::Result<Outputs, EngineError> {
    let (key, value) = provider.region_parameter();
    engine.set_parameter(handle, &key, &value).await?;
    let outputs = engine.apply(handle, program).await?;
    if outputs.url().is_none() {
        return Err(EngineError::Failure {
            operation: "apply".to_string(),
            detail: format!("engine outputs missing '{}'", Outputs::URL),
        });
    }
    Ok(outputs)
}

fn record_failure(
    failures: &DashMap<DeploymentName, FailureRecord>,
    name: &DeploymentName,
    operation: OperationKind,
    error: &LifecycleError,
) {
    warn!(deployment = %name, operation = %operation, error = %error, "deployment operation failed");
    failures.insert(name.clone(), FailureRecord::new(operation, error.to_string()));
}

/// Runs the engine phase of an operation in its own task so that caller
/// cancellation cannot abandon a dispatched operation mid-flight.
async fn run_to_completion<T, F>(phase: &'static str, task: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    match tokio::spawn(task).await {
        Ok(result) => result,
        Err(err) => Err(LifecycleError::engine(
            phase,
            EngineError::Failure {
                operation: "operation task".to_string(),
                detail: err.to_string(),
            },
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_engine::SimulatedEngine;

    fn name(value: &str) -> DeploymentName {
        DeploymentName::new(value).unwrap()
    }

    fn orchestrator(engine: Arc<SimulatedEngine>) -> LifecycleOrchestrator {
        LifecycleOrchestrator::new(
            engine,
            ProjectNamespace::new("testing").unwrap(),
            ProviderConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_applies_default_region() {
        let orchestrator = orchestrator(Arc::new(SimulatedEngine::new()));
        let deployment = orchestrator
            .create(&name("site-a"), "<h1>a</h1>", None)
            .await
            .unwrap();
        assert_eq!(deployment.state, DeploymentState::Active);
        assert!(deployment.url().unwrap().contains("us-east-1"));
    }

    #[tokio::test]
    async fn test_create_honors_provider_override() {
        let orchestrator = orchestrator(Arc::new(SimulatedEngine::new()));
        let deployment = orchestrator
            .create(
                &name("site-a"),
                "<h1>a</h1>",
                Some(ProviderConfig::new("gcp", "europe-west1")),
            )
            .await
            .unwrap();
        assert!(deployment.url().unwrap().contains("europe-west1"));
    }

    #[tokio::test]
    async fn test_update_provider_override_moves_url_region() {
        let orchestrator = orchestrator(Arc::new(SimulatedEngine::new()));
        let created = orchestrator
            .create(&name("site-a"), "<h1>a</h1>", None)
            .await
            .unwrap();
        assert!(created.url().unwrap().contains("us-east-1"));

        let updated = orchestrator
            .update(
                &name("site-a"),
                "<h1>b</h1>",
                Some(ProviderConfig::new("gcp", "europe-west1")),
            )
            .await
            .unwrap();
        let url = updated.url().unwrap();
        assert!(url.contains("europe-west1"), "stale region in {url}");
        assert!(!url.contains("us-east-1"), "stale region in {url}");

        let fetched = orchestrator.get(&name("site-a")).await.unwrap();
        assert_eq!(fetched.outputs, updated.outputs);
    }

    #[tokio::test]
    async fn test_failed_create_keeps_no_record_for_absent_name() {
        let engine = Arc::new(SimulatedEngine::new());
        let orchestrator = orchestrator(engine.clone());

        engine.inject_apply_failure(&name("site-a"), "provisioning denied");
        let failed = orchestrator.create(&name("site-a"), "<h1>a</h1>", None).await;
        assert!(matches!(failed, Err(LifecycleError::Engine { .. })));

        // The rollback left the name absent, so nothing is retained for it.
        assert!(orchestrator.failures.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_state_reflects_operation_in_flight() {
        let engine = Arc::new(SimulatedEngine::new());
        let orchestrator = Arc::new(orchestrator(engine.clone()));
        orchestrator
            .create(&name("site-a"), "<h1>a</h1>", None)
            .await
            .unwrap();

        let gate = engine.hold_next_apply(&name("site-a"));
        let task = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.update(&name("site-a"), "<h1>b</h1>", None).await }
        });
        gate.entered().await;

        let observed = orchestrator.get(&name("site-a")).await.unwrap();
        assert_eq!(observed.state, DeploymentState::Updating);
        assert_eq!(orchestrator.operations_in_flight(), 1);

        gate.release();
        task.await.unwrap().unwrap();
        let settled = orchestrator.get(&name("site-a")).await.unwrap();
        assert_eq!(settled.state, DeploymentState::Active);
        assert_eq!(orchestrator.operations_in_flight(), 0);
    }
}
