//! Strongly-typed identifiers for Canopy entities.
//!
//! Deployment names and project namespaces are caller-chosen strings that
//! end up embedded in resource names and endpoint hostnames, so both are
//! validated on construction: non-empty, at most 63 bytes, lowercase
//! ASCII letters, digits, and `-`, starting and ending with a letter or
//! digit. Validation also runs on deserialization, so a name that made it
//! into the system is always well-formed.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum identifier length in bytes, matching the DNS label limit.
pub const MAX_NAME_LEN: usize = 63;

/// Why an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name must not be empty")]
    Empty,

    #[error("name must be at most {MAX_NAME_LEN} bytes, got {0}")]
    TooLong(usize),

    #[error("name must start and end with a lowercase letter or digit")]
    BadBoundary,

    #[error("name contains '{0}'; allowed are lowercase letters, digits, and '-'")]
    BadCharacter(char),
}

fn validate_label(value: &str) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty);
    }
    if value.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong(value.len()));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-')
    {
        return Err(NameError::BadCharacter(bad));
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(NameError::BadBoundary);
    }
    Ok(())
}

/// Caller-chosen identity of a deployment, unique within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeploymentName(String);

impl DeploymentName {
    /// Validates and wraps a deployment name.
    pub fn new(value: impl Into<String>) -> Result<Self, NameError> {
        let value = value.into();
        validate_label(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeploymentName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeploymentName> for String {
    fn from(name: DeploymentName) -> Self {
        name.0
    }
}

impl AsRef<str> for DeploymentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Project namespace that scopes deployment names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectNamespace(String);

impl ProjectNamespace {
    /// Validates and wraps a project namespace.
    pub fn new(value: impl Into<String>) -> Result<Self, NameError> {
        let value = value.into();
        validate_label(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectNamespace {
    fn default() -> Self {
        Self("canopy".to_string())
    }
}

impl fmt::Display for ProjectNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProjectNamespace {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectNamespace> for String {
    fn from(namespace: ProjectNamespace) -> Self {
        namespace.0
    }
}

impl AsRef<str> for ProjectNamespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
