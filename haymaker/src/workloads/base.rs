//! The workload contract
//!
//! Every workload implements [`Workload`]. The platform drives all lifecycle
//! commands through this trait, so one set of commands works for any
//! workload:
//!
//! ```text
//! deploy <workload>   -> Workload::deploy
//! status <id>         -> Workload::get_status
//! list                -> Workload::list_deployments
//! logs <id>           -> Workload::get_logs
//! stop <id>           -> Workload::stop
//! start <id>          -> Workload::start
//! cleanup <id>        -> Workload::cleanup
//! ```
//!
//! A workload's name and its platform services arrive together in a
//! [`WorkloadContext`], which refuses placeholder or unsafe names.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::HaymakerError;
use crate::logs::{self, LogLevel};
use crate::workloads::ids::validate_workload_name;
use crate::workloads::models::{CleanupReport, DeploymentConfig, DeploymentState};
use crate::workloads::platform::Platform;
use crate::workloads::stream::LogStream;

/// Name and platform services handed to a workload at construction
#[derive(Clone)]
pub struct WorkloadContext {
    name: String,
    platform: Option<Arc<dyn Platform>>,
}

impl fmt::Debug for WorkloadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadContext")
            .field("name", &self.name)
            .field("platform", &self.platform.is_some())
            .finish()
    }
}

impl WorkloadContext {
    /// Build a context; fails for the placeholder name or unsafe names
    pub fn new(
        name: impl Into<String>,
        platform: Option<Arc<dyn Platform>>,
    ) -> Result<Self, HaymakerError> {
        let name = name.into();
        validate_workload_name(&name)?;
        Ok(Self { name, platform })
    }

    /// Context without platform services, for unit-testing a workload
    pub fn detached(name: impl Into<String>) -> Result<Self, HaymakerError> {
        Self::new(name, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> Option<&Arc<dyn Platform>> {
        self.platform.as_ref()
    }

    /// Persist deployment state via the platform
    pub async fn save_state(&self, state: &DeploymentState) -> Result<(), HaymakerError> {
        match &self.platform {
            Some(platform) => platform.save_deployment_state(state).await,
            None => {
                debug!(
                    "No platform configured, state not persisted for {}",
                    state.deployment_id
                );
                Ok(())
            }
        }
    }

    /// Load deployment state from the platform
    pub async fn load_state(
        &self,
        deployment_id: &str,
    ) -> Result<Option<DeploymentState>, HaymakerError> {
        match &self.platform {
            Some(platform) => platform.load_deployment_state(deployment_id).await,
            None => {
                debug!(
                    "No platform configured, cannot load state for {}",
                    deployment_id
                );
                Ok(None)
            }
        }
    }

    /// Load deployment state, turning a missing record into `NotFound`
    pub async fn require_state(
        &self,
        deployment_id: &str,
    ) -> Result<DeploymentState, HaymakerError> {
        self.load_state(deployment_id)
            .await?
            .filter(|state| state.workload_name == self.name)
            .ok_or_else(|| HaymakerError::NotFound(deployment_id.to_string()))
    }

    /// Remove deployment state from the platform
    pub async fn delete_state(&self, deployment_id: &str) -> Result<(), HaymakerError> {
        match &self.platform {
            Some(platform) => platform.delete_deployment_state(deployment_id).await,
            None => Ok(()),
        }
    }

    /// Every stored deployment owned by this workload
    pub async fn list_deployments(&self) -> Result<Vec<DeploymentState>, HaymakerError> {
        match &self.platform {
            Some(platform) => platform.list_deployments(&self.name).await,
            None => {
                debug!("No platform configured, cannot list deployments");
                Ok(Vec::new())
            }
        }
    }

    /// Look up a credential through the platform
    pub async fn get_credential(&self, name: &str) -> Option<String> {
        match &self.platform {
            Some(platform) => platform.get_credential(name).await,
            None => {
                debug!("No platform configured, credential {} unavailable", name);
                None
            }
        }
    }

    /// Log on this workload's channel
    pub fn log(&self, message: &str, level: LogLevel) {
        match &self.platform {
            Some(platform) => platform.log(message, level, &self.name),
            None => logs::emit(level, &logs::workload_channel(&self.name), message),
        }
    }
}

/// Lifecycle contract every workload implements
#[async_trait]
pub trait Workload: Send + Sync {
    /// Name and platform services this instance was built with
    fn context(&self) -> &WorkloadContext;

    /// Registered workload name
    fn name(&self) -> &str {
        self.context().name()
    }

    /// Start a new deployment and return its id.
    ///
    /// Persists an initial state before returning. If setup fails the
    /// implementation rolls back, or leaves the state failed with an error,
    /// and returns `DeployError`.
    async fn deploy(&self, config: &DeploymentConfig) -> Result<String, HaymakerError>;

    /// Current state; `NotFound` for ids this workload does not own
    async fn get_status(&self, deployment_id: &str) -> Result<DeploymentState, HaymakerError>;

    /// Stop a running deployment. Returns whether it stopped.
    ///
    /// Calling this on a deployment that is not running must be a no-op or a
    /// reported failure.
    async fn stop(&self, deployment_id: &str) -> Result<bool, HaymakerError>;

    /// Delete every resource owned by the deployment. Cannot be undone.
    async fn cleanup(&self, deployment_id: &str) -> Result<CleanupReport, HaymakerError>;

    /// Log lines: up to `lines` historical lines, then new ones if `follow`
    async fn get_logs(
        &self,
        deployment_id: &str,
        follow: bool,
        lines: usize,
    ) -> Result<LogStream, HaymakerError>;

    /// Resume a stopped deployment.
    ///
    /// Resuming needs knowledge of what was torn down, so there is no generic
    /// behaviour; workloads that can resume override this.
    async fn start(&self, deployment_id: &str) -> Result<bool, HaymakerError> {
        Err(HaymakerError::Unsupported(format!(
            "workload {} does not implement start/resume (deployment {})",
            self.name(),
            deployment_id
        )))
    }

    /// Deployments owned by this workload, read from platform storage
    async fn list_deployments(&self) -> Result<Vec<DeploymentState>, HaymakerError> {
        self.context().list_deployments().await
    }

    /// Workload-specific config problems; empty means valid
    async fn validate_config(&self, _config: &DeploymentConfig) -> Vec<String> {
        Vec::new()
    }
}
