//! Error types for the haymaker core

use thiserror::Error;

/// Main error type for the haymaker core
#[derive(Error, Debug)]
pub enum HaymakerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Deployment not found: {0}")]
    NotFound(String),

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Installation failed: {0}")]
    InstallError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Plugin error: {0}")]
    PluginError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HaymakerError {
    /// Whether this error means the queried workload does not know the deployment
    pub fn is_not_found(&self) -> bool {
        matches!(self, HaymakerError::NotFound(_))
    }
}

impl From<anyhow::Error> for HaymakerError {
    fn from(err: anyhow::Error) -> Self {
        HaymakerError::Internal(err.to_string())
    }
}
