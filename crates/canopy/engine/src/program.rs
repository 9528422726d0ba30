//! Declarative resource programs.
//!
//! A [`ResourceProgram`] is the unit of work handed to a provisioning
//! engine: a small set of named resources, their properties, the edges
//! between them, and the outputs the engine must report back once the
//! resources exist. Programs are plain data, so binding one is free of
//! side effects and two binds from the same inputs compare equal.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProgramError;

/// The resource kinds the site template provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    StorageBucket,
    BucketObject,
    AccessPolicy,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StorageBucket => "storage-bucket",
            Self::BucketObject => "bucket-object",
            Self::AccessPolicy => "access-policy",
        };
        f.write_str(name)
    }
}

/// One declared resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ResourceSpec {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_dependency(mut self, resource: impl Into<String>) -> Self {
        self.depends_on.push(resource.into());
        self
    }

    /// String-valued property accessor.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(serde_json::Value::as_str)
    }
}

/// An output the engine must resolve from a provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub resource: String,
    pub attribute: String,
}

/// A complete declarative topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceProgram {
    pub description: String,
    pub resources: Vec<ResourceSpec>,
    pub outputs: Vec<OutputSpec>,
}

impl ResourceProgram {
    /// Checks the structural constraints every engine assumes: at least
    /// one resource, unique resource names, and outputs and dependency
    /// edges that reference declared resources.
    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.resources.is_empty() {
            return Err(ProgramError::Empty);
        }

        let mut names = HashSet::new();
        for resource in &self.resources {
            if !names.insert(resource.name.as_str()) {
                return Err(ProgramError::DuplicateResource(resource.name.clone()));
            }
        }

        for resource in &self.resources {
            for dependency in &resource.depends_on {
                if !names.contains(dependency.as_str()) {
                    return Err(ProgramError::UnknownDependency {
                        resource: resource.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        for output in &self.outputs {
            if !names.contains(output.resource.as_str()) {
                return Err(ProgramError::DanglingOutput {
                    name: output.name.clone(),
                    resource: output.resource.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.name == name)
    }
}
