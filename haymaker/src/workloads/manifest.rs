//! Workload package manifests (`workload.yaml`)

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::HaymakerError;
use crate::filesys::dir::Dir;
use crate::workloads::ids::validate_workload_name;

/// File name of the manifest inside a workload package
pub const MANIFEST_FILE: &str = "workload.yaml";

/// Kind of workload a package provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadType {
    Prompt,
    Runtime,
}

fn default_source() -> String {
    ".".to_string()
}

/// How to install the package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package location relative to the manifest's directory
    #[serde(default = "default_source")]
    pub source: String,

    /// Other installer hints, passed through untouched
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

/// Manifest describing an installable workload package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadManifest {
    /// Unique workload name
    pub name: String,

    /// Package version
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type", alias = "workload_type")]
    pub workload_type: WorkloadType,

    #[serde(default)]
    pub package: Option<PackageSpec>,

    /// Executable or module reference that provides the implementation
    #[serde(default)]
    pub entrypoint: Option<String>,

    /// Workload-declared extensions
    #[serde(default)]
    pub extensions: HashMap<String, Value>,

    /// Target requirements
    #[serde(default)]
    pub targets: Vec<HashMap<String, Value>>,
}

impl WorkloadManifest {
    /// Parse and validate manifest text
    pub fn from_yaml(text: &str) -> Result<Self, HaymakerError> {
        let manifest: WorkloadManifest = serde_yaml::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), HaymakerError> {
        validate_workload_name(&self.name)?;
        if self.version.trim().is_empty() {
            return Err(HaymakerError::ValidationError(format!(
                "manifest for {} has an empty version",
                self.name
            )));
        }
        Ok(())
    }
}

/// Load the manifest from a package directory.
///
/// A missing file or invalid content is reported as an installation error.
pub async fn load_manifest(dir: &Path) -> Result<WorkloadManifest, HaymakerError> {
    let file = Dir::new(dir).file(MANIFEST_FILE);
    if !file.exists().await {
        return Err(HaymakerError::InstallError(format!(
            "no {} found in {}",
            MANIFEST_FILE,
            dir.display()
        )));
    }

    let text = file.read_string().await?;
    WorkloadManifest::from_yaml(&text).map_err(|e| {
        HaymakerError::InstallError(format!(
            "invalid manifest {}: {}",
            file.path().display(),
            e
        ))
    })
}
