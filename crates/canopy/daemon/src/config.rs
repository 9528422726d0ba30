//! Daemon configuration.
//!
//! Settings resolve in three layers: built-in defaults, then an optional
//! TOML file, then `CANOPY_`-prefixed environment variables. Command
//! line flags are applied on top by `main`.

use std::net::SocketAddr;

use canopy_types::{ProjectNamespace, ProviderConfig};
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, DaemonResult};

/// Engine backend selector. Only the simulated backend ships today.
pub const SIMULATED_BACKEND: &str = "simulated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address the REST listener binds to.
    pub bind: String,
    /// Project namespace all deployments live in.
    pub project: String,
    /// Default cloud provider for new deployments.
    pub provider: String,
    /// Default region for new deployments.
    pub region: String,
    /// Provisioning engine backend.
    pub engine: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7878".to_string(),
            project: "canopy".to_string(),
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            engine: SIMULATED_BACKEND.to_string(),
        }
    }
}

impl DaemonConfig {
    /// Loads configuration, layering an optional file and the
    /// environment over the defaults.
    pub fn load(path: Option<&str>) -> DaemonResult<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("bind", defaults.bind)?
            .set_default("project", defaults.project)?
            .set_default("provider", defaults.provider)?
            .set_default("region", defaults.region)?
            .set_default("engine", defaults.engine)?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("CANOPY"));
        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn socket_addr(&self) -> DaemonResult<SocketAddr> {
        self.bind
            .parse()
            .map_err(|_| DaemonError::BindAddress(self.bind.clone()))
    }

    pub fn namespace(&self) -> DaemonResult<ProjectNamespace> {
        ProjectNamespace::new(self.project.clone())
            .map_err(|err| DaemonError::Config(format!("invalid project namespace: {err}")))
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(self.provider.clone(), self.region.clone())
    }
}
