//! In-memory platform for tests and embedders that bring their own persistence

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::HaymakerError;
use crate::logs::{self, LogLevel};
use crate::workloads::ids::sanitize_deployment_id;
use crate::workloads::models::DeploymentState;
use crate::workloads::platform::{credential_env_key, Platform};

/// Platform keeping states and credentials in process memory
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    states: RwLock<HashMap<String, DeploymentState>>,
    credentials: RwLock<HashMap<String, String>>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a credential available under `name`, keyed the same way
    /// `FilePlatform` maps names to environment variables
    pub fn set_credential(&self, name: &str, value: impl Into<String>) {
        let mut credentials = self.credentials.write().unwrap_or_else(|e| e.into_inner());
        credentials.insert(credential_env_key(name), value.into());
    }

    /// Number of stored states
    pub fn len(&self) -> usize {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn save_deployment_state(&self, state: &DeploymentState) -> Result<(), HaymakerError> {
        let id = sanitize_deployment_id(&state.deployment_id)?;
        state.check()?;
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        states.insert(id.to_string(), state.clone());
        Ok(())
    }

    async fn load_deployment_state(
        &self,
        deployment_id: &str,
    ) -> Result<Option<DeploymentState>, HaymakerError> {
        let id = sanitize_deployment_id(deployment_id)?;
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        Ok(states.get(id).cloned())
    }

    async fn list_deployments(
        &self,
        workload_name: &str,
    ) -> Result<Vec<DeploymentState>, HaymakerError> {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<_> = states
            .values()
            .filter(|s| s.workload_name == workload_name)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.deployment_id.cmp(&b.deployment_id));
        Ok(matching)
    }

    async fn delete_deployment_state(&self, deployment_id: &str) -> Result<(), HaymakerError> {
        let id = sanitize_deployment_id(deployment_id)?;
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        states.remove(id);
        Ok(())
    }

    async fn get_credential(&self, name: &str) -> Option<String> {
        let credentials = self.credentials.read().unwrap_or_else(|e| e.into_inner());
        credentials.get(&credential_env_key(name)).cloned()
    }

    fn log(&self, message: &str, level: LogLevel, workload: &str) {
        logs::emit(level, &logs::workload_channel(workload), message);
    }
}
