//! Finding the workload that owns a deployment

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::errors::HaymakerError;
use crate::workloads::base::Workload;
use crate::workloads::models::DeploymentState;
use crate::workloads::registry::WorkloadRegistry;

/// Process-lifetime cache of deployment id to workload name
#[derive(Debug, Default)]
pub struct DeploymentLocator {
    owners: RwLock<HashMap<String, String>>,
}

impl DeploymentLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the workload owning `deployment_id`, with its current state.
    ///
    /// A cached owner is asked first. If it no longer knows the deployment
    /// (or is no longer registered) the entry is evicted and every workload
    /// is asked in registry order. Errors other than not-found are returned
    /// as they are.
    pub async fn resolve(
        &self,
        registry: &WorkloadRegistry,
        deployment_id: &str,
    ) -> Result<(Box<dyn Workload>, DeploymentState), HaymakerError> {
        if let Some(name) = self.cached(deployment_id) {
            match registry.get(&name).await {
                Some(workload) => match workload.get_status(deployment_id).await {
                    Ok(state) => return Ok((workload, state)),
                    Err(e) if e.is_not_found() => {
                        debug!("Cached owner {} no longer knows {}", name, deployment_id);
                    }
                    Err(e) => return Err(e),
                },
                None => debug!("Cached owner {} is no longer registered", name),
            }
            self.forget(deployment_id);
        }

        for name in registry.list().await {
            let Some(workload) = registry.get(&name).await else {
                continue;
            };
            match workload.get_status(deployment_id).await {
                Ok(state) => {
                    self.owners
                        .write()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(deployment_id.to_string(), name);
                    return Ok((workload, state));
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        Err(HaymakerError::NotFound(deployment_id.to_string()))
    }

    fn cached(&self, deployment_id: &str) -> Option<String> {
        self.owners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(deployment_id)
            .cloned()
    }

    /// Drop the cached owner of a deployment
    pub fn forget(&self, deployment_id: &str) {
        self.owners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(deployment_id);
    }

    pub fn len(&self) -> usize {
        self.owners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
