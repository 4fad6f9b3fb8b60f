//! Shared fixtures: a simulated workload and scripted install steps

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use haymaker::errors::HaymakerError;
use haymaker::install::git::SourceFetcher;
use haymaker::install::package::PackageInstaller;
use haymaker::install::process::{CommandOutcome, ExitOutcome};
use haymaker::utils::new_deployment_id;
use haymaker::workloads::lifecycle::DeploymentEvent;
use haymaker::workloads::stream::{self, LogStream};
use haymaker::workloads::{
    CleanupReport, DeploymentConfig, DeploymentState, DeploymentStatus, Platform, Workload,
    WorkloadContext, WorkloadRegistry,
};

/// Workload keeping everything in platform storage
pub struct SimWorkload {
    ctx: WorkloadContext,
    status_calls: Arc<AtomicUsize>,
}

impl SimWorkload {
    pub fn new(ctx: WorkloadContext, status_calls: Arc<AtomicUsize>) -> Self {
        Self { ctx, status_calls }
    }
}

#[async_trait]
impl Workload for SimWorkload {
    fn context(&self) -> &WorkloadContext {
        &self.ctx
    }

    async fn deploy(&self, config: &DeploymentConfig) -> Result<String, HaymakerError> {
        let mut state = DeploymentState::new(new_deployment_id(), self.name())
            .with_phase("simulating")
            .with_config(config.workload_config.clone());
        state.apply(DeploymentEvent::Start)?;
        self.ctx.save_state(&state).await?;
        Ok(state.deployment_id)
    }

    async fn get_status(&self, deployment_id: &str) -> Result<DeploymentState, HaymakerError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.ctx.require_state(deployment_id).await
    }

    async fn stop(&self, deployment_id: &str) -> Result<bool, HaymakerError> {
        let mut state = self.ctx.require_state(deployment_id).await?;
        if state.status != DeploymentStatus::Running {
            return Ok(false);
        }
        state.apply(DeploymentEvent::Stop)?;
        self.ctx.save_state(&state).await?;
        Ok(true)
    }

    async fn start(&self, deployment_id: &str) -> Result<bool, HaymakerError> {
        let mut state = self.ctx.require_state(deployment_id).await?;
        state.apply(DeploymentEvent::Resume)?;
        self.ctx.save_state(&state).await?;
        Ok(true)
    }

    async fn cleanup(&self, deployment_id: &str) -> Result<CleanupReport, HaymakerError> {
        self.ctx.require_state(deployment_id).await?;
        self.ctx.delete_state(deployment_id).await?;
        let mut report = CleanupReport::new(deployment_id);
        report.deleted("state record");
        Ok(report)
    }

    async fn get_logs(
        &self,
        deployment_id: &str,
        _follow: bool,
        lines: usize,
    ) -> Result<LogStream, HaymakerError> {
        self.ctx.require_state(deployment_id).await?;
        let all: Vec<String> = (1..=3).map(|n| format!("{} line {}", deployment_id, n)).collect();
        let skip = all.len().saturating_sub(lines);
        Ok(stream::from_lines(all.into_iter().skip(skip)))
    }

    async fn validate_config(&self, config: &DeploymentConfig) -> Vec<String> {
        if config.workload_config.contains_key("reject") {
            vec!["config asks to be rejected".to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Registry with one `SimWorkload` per name, all sharing a status call counter
pub fn sim_registry(
    platform: Arc<dyn Platform>,
    names: &[&str],
    status_calls: &Arc<AtomicUsize>,
) -> WorkloadRegistry {
    let registry = WorkloadRegistry::empty(Some(platform));
    for name in names {
        let calls = status_calls.clone();
        registry
            .register(name, move |ctx| {
                Ok(Box::new(SimWorkload::new(ctx, calls.clone())) as Box<dyn Workload>)
            })
            .unwrap();
    }
    registry
}

fn outcome(program: &str, exit: ExitOutcome) -> CommandOutcome {
    CommandOutcome {
        program: program.to_string(),
        exit,
        stdout: String::new(),
        stderr: String::new(),
        elapsed: Duration::from_millis(1),
    }
}

/// Fetcher that writes a repository with a given manifest instead of cloning
pub struct ScriptedFetcher {
    manifest: Option<String>,
    exit: ExitOutcome,
    pub destinations: Mutex<Vec<PathBuf>>,
}

impl ScriptedFetcher {
    pub fn with_manifest(manifest: impl Into<String>) -> Self {
        Self {
            manifest: Some(manifest.into()),
            exit: ExitOutcome::Exited(Some(0)),
            destinations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(exit: ExitOutcome) -> Self {
        Self {
            manifest: None,
            exit,
            destinations: Mutex::new(Vec::new()),
        }
    }

    pub fn last_destination(&self) -> Option<PathBuf> {
        self.destinations.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _url: &str,
        dest: &Path,
        _limit: Duration,
    ) -> Result<CommandOutcome, HaymakerError> {
        self.destinations.lock().unwrap().push(dest.to_path_buf());
        if let Some(manifest) = &self.manifest {
            std::fs::create_dir_all(dest.join("pkg/inner"))?;
            std::fs::write(dest.join("workload.yaml"), manifest)?;
            // A sibling of the clone a malicious manifest might point at
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent.join("evil"))?;
            }
        }
        Ok(outcome("git", self.exit.clone()))
    }
}

/// Installer that records what it was asked to install
pub struct RecordingInstaller {
    exit: ExitOutcome,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl RecordingInstaller {
    pub fn new() -> Self {
        Self::exiting(ExitOutcome::Exited(Some(0)))
    }

    pub fn exiting(exit: ExitOutcome) -> Self {
        Self {
            exit,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PackageInstaller for RecordingInstaller {
    async fn install(
        &self,
        path: &Path,
        _limit: Duration,
    ) -> Result<CommandOutcome, HaymakerError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        Ok(outcome("cargo", self.exit.clone()))
    }
}

/// Manifest text with the given package source, or no package at all
pub fn manifest(name: &str, source: Option<&str>) -> String {
    let mut text = format!("name: {}\nversion: 1.0.0\ntype: runtime\n", name);
    if let Some(source) = source {
        text.push_str(&format!("package:\n  source: {:?}\n", source));
    }
    text
}
