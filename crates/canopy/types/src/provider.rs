//! Provider configuration applied to every apply.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cloud provider and region a deployment is provisioned into.
///
/// The pair is pushed to the engine as a stack parameter immediately
/// before every apply, so a stack never runs with stale provider
/// settings left over from an earlier operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    pub region: String,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            region: region.into(),
        }
    }

    /// The stack parameter carrying the region, namespaced by provider
    /// the way engine configuration keys are (`aws:region`).
    pub fn region_parameter(&self) -> (String, String) {
        (format!("{}:region", self.provider), self.region.clone())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

impl fmt::Display for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.region)
    }
}
