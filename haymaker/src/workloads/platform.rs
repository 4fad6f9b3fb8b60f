//! Platform services available to workloads

use async_trait::async_trait;

use crate::errors::HaymakerError;
use crate::logs::LogLevel;
use crate::workloads::models::DeploymentState;

/// State persistence, credentials and logging, injected into every workload
#[async_trait]
pub trait Platform: Send + Sync {
    /// Persist a deployment state, replacing any previous record for its id
    async fn save_deployment_state(&self, state: &DeploymentState) -> Result<(), HaymakerError>;

    /// Load a deployment state. `Ok(None)` if no record exists.
    async fn load_deployment_state(
        &self,
        deployment_id: &str,
    ) -> Result<Option<DeploymentState>, HaymakerError>;

    /// All readable states belonging to a workload
    async fn list_deployments(
        &self,
        workload_name: &str,
    ) -> Result<Vec<DeploymentState>, HaymakerError>;

    /// Remove a deployment state. Idempotent.
    async fn delete_deployment_state(&self, deployment_id: &str) -> Result<(), HaymakerError>;

    /// Look up a credential by name; missing credentials are `None`, never an error
    async fn get_credential(&self, name: &str) -> Option<String>;

    /// Log a message on the workload's channel
    fn log(&self, message: &str, level: LogLevel, workload: &str);

    /// Directory holding state records, for platforms backed by the filesystem
    fn state_dir(&self) -> Option<&std::path::Path> {
        None
    }
}

/// Environment variable a credential name maps to (`azure-tenant-id` -> `AZURE_TENANT_ID`)
pub fn credential_env_key(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '-' | '.' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}
