//! File-backed platform
//!
//! Deployment states live as one pretty-printed JSON document per deployment
//! in a state directory. Credentials come from environment variables and
//! logging goes through `tracing`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::HaymakerError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::logs::{self, LogLevel};
use crate::workloads::ids::sanitize_deployment_id;
use crate::workloads::models::DeploymentState;
use crate::workloads::platform::{credential_env_key, Platform};

const STATE_EXTENSION: &str = "json";

/// Platform storing deployment state as JSON files
#[derive(Debug, Clone)]
pub struct FilePlatform {
    state_dir: Dir,
}

impl FilePlatform {
    /// Open (and create if needed) a state directory
    pub async fn open(state_dir: impl Into<PathBuf>) -> Result<Self, HaymakerError> {
        let state_dir = Dir::new(state_dir);
        state_dir.create().await?;
        Ok(Self { state_dir })
    }

    /// File holding a deployment's state; the id is validated first
    fn state_file(&self, deployment_id: &str) -> Result<File, HaymakerError> {
        let safe_id = sanitize_deployment_id(deployment_id)?;
        Ok(self
            .state_dir
            .file(&format!("{}.{}", safe_id, STATE_EXTENSION)))
    }
}

#[async_trait]
impl Platform for FilePlatform {
    async fn save_deployment_state(&self, state: &DeploymentState) -> Result<(), HaymakerError> {
        let file = self.state_file(&state.deployment_id)?;
        state.check()?;
        file.write_json(state).await?;
        debug!("Saved deployment state to {}", file.path().display());
        Ok(())
    }

    async fn load_deployment_state(
        &self,
        deployment_id: &str,
    ) -> Result<Option<DeploymentState>, HaymakerError> {
        let file = self.state_file(deployment_id)?;
        if !file.exists().await {
            debug!("No state file found at {}", file.path().display());
            return Ok(None);
        }

        let state: DeploymentState = file.read_json().await.map_err(|e| {
            HaymakerError::StorageError(format!(
                "unreadable state record {}: {}",
                file.path().display(),
                e
            ))
        })?;
        Ok(Some(state))
    }

    async fn list_deployments(
        &self,
        workload_name: &str,
    ) -> Result<Vec<DeploymentState>, HaymakerError> {
        if !self.state_dir.exists().await {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for path in self
            .state_dir
            .list_files_with_extension(STATE_EXTENSION)
            .await?
        {
            match File::new(&path).read_json::<DeploymentState>().await {
                Ok(state) if state.workload_name == workload_name => results.push(state),
                Ok(_) => {}
                Err(e) => warn!("Failed to read state file {}: {}", path.display(), e),
            }
        }

        Ok(results)
    }

    async fn delete_deployment_state(&self, deployment_id: &str) -> Result<(), HaymakerError> {
        let file = self.state_file(deployment_id)?;
        file.delete().await?;
        debug!("Deleted deployment state {}", file.path().display());
        Ok(())
    }

    async fn get_credential(&self, name: &str) -> Option<String> {
        let env_key = credential_env_key(name);
        let value = std::env::var(&env_key).ok();
        if value.is_none() {
            debug!("Credential {:?} (env: {}) not found", name, env_key);
        }
        value
    }

    fn log(&self, message: &str, level: LogLevel, workload: &str) {
        logs::emit(level, &logs::workload_channel(workload), message);
    }

    fn state_dir(&self) -> Option<&Path> {
        Some(self.state_dir.path())
    }
}
