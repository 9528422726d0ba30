//! Static-site template.
//!
//! Binds caller content into the three-resource topology Canopy
//! provisions for every site: a storage bucket configured for website
//! hosting, the index document holding the content verbatim, and a
//! public-read access policy. Binding is a pure function of the
//! [`SiteSpec`]; it never reads ambient or process-level state, so the
//! same spec always produces the same program.

use canopy_types::{DeploymentName, Outputs, ProjectNamespace};
use serde_json::json;

use crate::error::ProgramError;
use crate::program::{OutputSpec, ResourceKind, ResourceProgram, ResourceSpec};

/// Resource names within a bound site program.
pub const BUCKET_RESOURCE: &str = "site-bucket";
pub const INDEX_RESOURCE: &str = "index-document";
pub const ACCESS_RESOURCE: &str = "public-access";

/// Output carrying the hash of the deployed content.
pub const CONTENT_HASH_OUTPUT: &str = "content_hash";

/// Everything a site bind depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSpec {
    pub name: DeploymentName,
    pub content: String,
    pub project: ProjectNamespace,
    pub region: String,
}

/// Produces static-site programs.
#[derive(Debug, Clone, Default)]
pub struct SiteTemplate {
    error_document: Option<String>,
}

impl SiteTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves the given object key for missing paths. Not set by default.
    pub fn with_error_document(mut self, key: impl Into<String>) -> Self {
        self.error_document = Some(key.into());
        self
    }

    /// Binds a spec into a validated resource program.
    pub fn bind(&self, spec: &SiteSpec) -> Result<ResourceProgram, ProgramError> {
        let bucket_name = format!("{}-{}", spec.project, spec.name);

        let mut bucket = ResourceSpec::new(BUCKET_RESOURCE, ResourceKind::StorageBucket)
            .with_property("bucket", json!(bucket_name))
            .with_property("region", json!(spec.region))
            .with_property("website_index_document", json!("index.html"));
        if let Some(key) = &self.error_document {
            bucket = bucket.with_property("website_error_document", json!(key));
        }

        let index = ResourceSpec::new(INDEX_RESOURCE, ResourceKind::BucketObject)
            .with_property("key", json!("index.html"))
            .with_property("content", json!(spec.content))
            .with_property("content_type", json!("text/html"))
            .with_dependency(BUCKET_RESOURCE);

        let access = ResourceSpec::new(ACCESS_RESOURCE, ResourceKind::AccessPolicy)
            .with_property("principal", json!("*"))
            .with_property("actions", json!(["read"]))
            .with_dependency(BUCKET_RESOURCE);

        let program = ResourceProgram {
            description: format!("static site '{}'", spec.name),
            resources: vec![bucket, index, access],
            outputs: vec![
                OutputSpec {
                    name: Outputs::URL.to_string(),
                    resource: BUCKET_RESOURCE.to_string(),
                    attribute: "website_endpoint".to_string(),
                },
                OutputSpec {
                    name: CONTENT_HASH_OUTPUT.to_string(),
                    resource: INDEX_RESOURCE.to_string(),
                    attribute: "etag".to_string(),
                },
            ],
        };
        program.validate()?;
        Ok(program)
    }
}
