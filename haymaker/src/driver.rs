//! Lifecycle commands over the registry
//!
//! The operations behind the `haymaker` command line. Each one resolves the
//! owning workload and delegates, checking the preconditions the platform
//! can check on its own first.

use std::path::Path;

use tracing::{info, warn};

use crate::errors::HaymakerError;
use crate::workloads::ids::sanitize_deployment_id;
use crate::workloads::locator::DeploymentLocator;
use crate::workloads::models::{
    CleanupReport, DeploymentConfig, DeploymentState, DeploymentStatus,
};
use crate::workloads::registry::WorkloadRegistry;
use crate::workloads::stream::LogStream;

/// Default number of deployments `list` returns
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Which deployments `list` returns
#[derive(Debug, Clone)]
pub struct ListFilter {
    pub workload: Option<String>,
    pub status: Option<DeploymentStatus>,
    pub limit: usize,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            workload: None,
            status: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Result of `cleanup`
#[derive(Debug, Clone)]
pub enum CleanupOutcome {
    /// Nothing was deleted; this is the deployment that would be cleaned up
    DryRun(DeploymentState),

    Done(CleanupReport),
}

/// Current state of a deployment
pub async fn status(
    registry: &WorkloadRegistry,
    locator: &DeploymentLocator,
    deployment_id: &str,
) -> Result<DeploymentState, HaymakerError> {
    let deployment_id = sanitize_deployment_id(deployment_id)?;
    let (_, state) = locator.resolve(registry, deployment_id).await?;
    Ok(state)
}

/// Deployments of one or all workloads
pub async fn list(
    registry: &WorkloadRegistry,
    filter: &ListFilter,
) -> Result<Vec<DeploymentState>, HaymakerError> {
    let names = match &filter.workload {
        Some(name) => vec![name.clone()],
        None => registry.list().await,
    };

    let mut deployments = Vec::new();
    for name in names {
        let Some(workload) = registry.get(&name).await else {
            if filter.workload.is_some() {
                return Err(HaymakerError::NotFound(format!("workload {}", name)));
            }
            continue;
        };

        match workload.list_deployments().await {
            Ok(states) => deployments.extend(states),
            Err(e) if e.is_not_found() => continue,
            // Listing a single workload reports its failure
            Err(e) if filter.workload.is_some() => return Err(e),
            Err(e) => warn!("Failed to list deployments of {}: {}", name, e),
        }
    }

    Ok(deployments
        .into_iter()
        .filter(|state| filter.status.map_or(true, |s| state.status == s))
        .take(filter.limit)
        .collect())
}

/// Validate a config and start a deployment; returns the new id
pub async fn deploy(
    registry: &WorkloadRegistry,
    config: &DeploymentConfig,
) -> Result<String, HaymakerError> {
    let workload = registry
        .get(&config.workload_name)
        .await
        .ok_or_else(|| HaymakerError::NotFound(format!("workload {}", config.workload_name)))?;

    let mut problems = config.shape_errors();
    problems.extend(workload.validate_config(config).await);
    if !problems.is_empty() {
        return Err(HaymakerError::ValidationError(problems.join("; ")));
    }

    let deployment_id = workload.deploy(config).await?;
    info!("Deployed {} as {}", config.workload_name, deployment_id);
    Ok(deployment_id)
}

/// Stop a running deployment
pub async fn stop(
    registry: &WorkloadRegistry,
    locator: &DeploymentLocator,
    deployment_id: &str,
) -> Result<bool, HaymakerError> {
    let deployment_id = sanitize_deployment_id(deployment_id)?;
    let (workload, state) = locator.resolve(registry, deployment_id).await?;
    if state.status != DeploymentStatus::Running {
        return Err(HaymakerError::InvalidTransition(format!(
            "deployment {} is {}, only running deployments can be stopped",
            deployment_id, state.status
        )));
    }

    let stopped = workload.stop(deployment_id).await?;
    info!("Stop of {} returned {}", deployment_id, stopped);
    Ok(stopped)
}

/// Resume a stopped deployment
pub async fn start(
    registry: &WorkloadRegistry,
    locator: &DeploymentLocator,
    deployment_id: &str,
) -> Result<bool, HaymakerError> {
    let deployment_id = sanitize_deployment_id(deployment_id)?;
    let (workload, state) = locator.resolve(registry, deployment_id).await?;
    if state.status == DeploymentStatus::Running {
        info!("Deployment {} is already running", deployment_id);
        return Ok(true);
    }

    workload.start(deployment_id).await
}

/// Delete a deployment's resources, or only report what would be deleted
pub async fn cleanup(
    registry: &WorkloadRegistry,
    locator: &DeploymentLocator,
    deployment_id: &str,
    dry_run: bool,
) -> Result<CleanupOutcome, HaymakerError> {
    let deployment_id = sanitize_deployment_id(deployment_id)?;
    let (workload, state) = locator.resolve(registry, deployment_id).await?;
    if dry_run {
        return Ok(CleanupOutcome::DryRun(state));
    }

    let report = workload.cleanup(deployment_id).await?;
    locator.forget(deployment_id);
    info!(
        "Cleaned up {}: {} deleted, {} failed",
        deployment_id, report.resources_deleted, report.resources_failed
    );
    Ok(CleanupOutcome::Done(report))
}

/// Log lines of a deployment
pub async fn logs(
    registry: &WorkloadRegistry,
    locator: &DeploymentLocator,
    deployment_id: &str,
    follow: bool,
    lines: usize,
) -> Result<LogStream, HaymakerError> {
    let deployment_id = sanitize_deployment_id(deployment_id)?;
    let (workload, _) = locator.resolve(registry, deployment_id).await?;
    workload.get_logs(deployment_id, follow, lines).await
}

/// Whether an install source names a remote repository
pub fn is_remote_source(source: &str) -> bool {
    let source = source.trim();
    ["https://", "git@", "ssh://"]
        .iter()
        .any(|prefix| source.starts_with(prefix))
}

/// Install from a repository url or a local directory; returns the workload name
pub async fn install(registry: &WorkloadRegistry, source: &str) -> Result<String, HaymakerError> {
    let name = if is_remote_source(source) {
        registry.install_from_source_url(source).await?
    } else {
        registry.install_from_path(Path::new(source)).await?
    };
    info!("Installed workload {}", name);
    Ok(name)
}
