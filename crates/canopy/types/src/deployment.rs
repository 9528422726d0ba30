//! Deployment records, derived state, and engine outputs.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::DeploymentName;

/// Observable state of a deployment.
///
/// State is never stored anywhere. It is derived on demand from two facts:
/// whether the engine knows the deployment, and whether a mutating
/// operation currently holds the deployment's lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// Unknown to the engine.
    Absent,
    /// A create is in flight.
    Creating,
    /// Provisioned and idle.
    Active,
    /// An update is in flight.
    Updating,
    /// A destroy is in flight.
    Destroying,
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Updating => "updating",
            Self::Destroying => "destroying",
        };
        f.write_str(name)
    }
}

/// The three mutating operations a deployment lease can guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Destroy,
}

impl OperationKind {
    /// The transitional state observed while this operation runs.
    pub fn running_state(&self) -> DeploymentState {
        match self {
            Self::Create => DeploymentState::Creating,
            Self::Update => DeploymentState::Updating,
            Self::Destroy => DeploymentState::Destroying,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// Named values reported by the engine after a successful apply.
///
/// Keys are ordered so that serialized outputs are stable across calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outputs(BTreeMap<String, serde_json::Value>);

impl Outputs {
    /// Well-known output carrying the deployment's endpoint.
    pub const URL: &'static str = "url";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    /// The endpoint URL, when the engine reported one.
    pub fn url(&self) -> Option<&str> {
        self.get(Self::URL).and_then(serde_json::Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, serde_json::Value)> for Outputs {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Record of the most recent engine failure for a deployment.
///
/// Kept until the next successful operation on the same deployment
/// replaces or clears it. Not persisted across daemon restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub operation: OperationKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(operation: OperationKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Point-in-time view of a deployment.
///
/// The authoritative copy of the deployed content lives in the engine's
/// stored program; this record carries only what callers observe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub name: DeploymentName,
    pub state: DeploymentState,
    pub outputs: Outputs,
    pub last_error: Option<FailureRecord>,
}

impl Deployment {
    /// The endpoint URL, when known.
    pub fn url(&self) -> Option<&str> {
        self.outputs.url()
    }
}
