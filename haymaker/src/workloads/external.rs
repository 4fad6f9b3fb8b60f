//! Workloads implemented by an external executable
//!
//! The executable is invoked once per operation as `<exe> <op> [args]`:
//!
//! ```text
//! deploy              stdin: DeploymentConfig   stdout: {"deployment_id": "..."}
//! status <id>                                   stdout: DeploymentState
//! stop <id>                                     stdout: {"ok": true}
//! start <id>                                    stdout: {"ok": true}
//! cleanup <id>                                  stdout: CleanupReport
//! validate            stdin: DeploymentConfig   stdout: ["problem", ...]
//! logs <id> --lines N [--follow]                stdout: raw log lines
//! ```
//!
//! Exit code 0 is success, 2 means the deployment is unknown, 3 means the
//! operation is not supported. Anything else is an error and stderr is
//! reported.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::errors::HaymakerError;
use crate::install::process::{CommandOutcome, CommandSpec};
use crate::workloads::base::{Workload, WorkloadContext};
use crate::workloads::ids::sanitize_deployment_id;
use crate::workloads::models::{CleanupReport, DeploymentConfig, DeploymentState};
use crate::workloads::stream::{self, LogStream};

/// Set to the state directory when the platform is file backed
pub const STATE_DIR_ENV: &str = "HAYMAKER_STATE_DIR";

/// Set to the workload's registered name
pub const WORKLOAD_ENV: &str = "HAYMAKER_WORKLOAD";

const EXIT_NOT_FOUND: i32 = 2;
const EXIT_UNSUPPORTED: i32 = 3;

#[derive(Debug, Deserialize)]
struct DeployResponse {
    deployment_id: String,
}

#[derive(Debug, Deserialize)]
struct OkResponse {
    ok: bool,
}

/// Adapter from the workload contract to an executable
#[derive(Debug)]
pub struct ExternalWorkload {
    ctx: WorkloadContext,
    executable: PathBuf,
    timeout: Duration,
}

impl ExternalWorkload {
    pub fn new(ctx: WorkloadContext, executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ctx,
            executable: executable.into(),
            timeout,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(&self, op: &str) -> CommandSpec {
        let mut spec = CommandSpec::new(self.executable.to_string_lossy())
            .arg(op)
            .env(WORKLOAD_ENV, self.ctx.name());
        if let Some(dir) = self.ctx.platform().and_then(|p| p.state_dir()) {
            spec = spec.env(STATE_DIR_ENV, dir.to_string_lossy());
        }
        spec
    }

    fn config_input(config: &DeploymentConfig) -> Result<Vec<u8>, HaymakerError> {
        Ok(serde_json::to_vec(config)?)
    }

    async fn run(&self, spec: CommandSpec, op: &str) -> Result<CommandOutcome, HaymakerError> {
        let outcome = spec.run(self.timeout).await.map_err(|e| {
            HaymakerError::PluginError(format!(
                "failed to run {}: {}",
                self.executable.display(),
                e
            ))
        })?;
        if outcome.timed_out() {
            return Err(HaymakerError::PluginError(format!(
                "{} {} timed out after {}s",
                self.ctx.name(),
                op,
                self.timeout.as_secs()
            )));
        }
        Ok(outcome)
    }

    /// Run an operation and decode its JSON answer
    async fn call<T: DeserializeOwned>(
        &self,
        spec: CommandSpec,
        op: &str,
        target: &str,
    ) -> Result<T, HaymakerError> {
        let outcome = self.run(spec, op).await?;
        match outcome.code() {
            Some(0) => serde_json::from_str(outcome.stdout.trim()).map_err(|e| {
                HaymakerError::PluginError(format!(
                    "{} {} returned an invalid response: {}",
                    self.ctx.name(),
                    op,
                    e
                ))
            }),
            Some(EXIT_NOT_FOUND) => Err(HaymakerError::NotFound(target.to_string())),
            Some(EXIT_UNSUPPORTED) => Err(HaymakerError::Unsupported(format!(
                "workload {} does not support {}",
                self.ctx.name(),
                op
            ))),
            code => {
                debug!("{} {} stdout: {}", self.ctx.name(), op, outcome.stdout);
                Err(HaymakerError::PluginError(format!(
                    "{} {} failed (exit code {:?}): {}",
                    self.ctx.name(),
                    op,
                    code,
                    outcome.stderr.trim()
                )))
            }
        }
    }
}

#[async_trait]
impl Workload for ExternalWorkload {
    fn context(&self) -> &WorkloadContext {
        &self.ctx
    }

    async fn deploy(&self, config: &DeploymentConfig) -> Result<String, HaymakerError> {
        let spec = self.command("deploy").stdin(Self::config_input(config)?);
        let response: DeployResponse = self
            .call(spec, "deploy", &config.workload_name)
            .await
            .map_err(|e| match e {
                HaymakerError::PluginError(msg) => HaymakerError::DeployError(msg),
                other => other,
            })?;
        sanitize_deployment_id(&response.deployment_id).map_err(|e| {
            HaymakerError::DeployError(format!(
                "{} returned an unusable deployment id: {}",
                self.executable.display(),
                e
            ))
        })?;
        Ok(response.deployment_id)
    }

    async fn get_status(&self, deployment_id: &str) -> Result<DeploymentState, HaymakerError> {
        let spec = self.command("status").arg(deployment_id);
        let state: DeploymentState = self.call(spec, "status", deployment_id).await?;
        if state.workload_name != self.ctx.name() || state.deployment_id != deployment_id {
            return Err(HaymakerError::NotFound(deployment_id.to_string()));
        }
        Ok(state)
    }

    async fn stop(&self, deployment_id: &str) -> Result<bool, HaymakerError> {
        let spec = self.command("stop").arg(deployment_id);
        let response: OkResponse = self.call(spec, "stop", deployment_id).await?;
        Ok(response.ok)
    }

    async fn start(&self, deployment_id: &str) -> Result<bool, HaymakerError> {
        let spec = self.command("start").arg(deployment_id);
        let response: OkResponse = self.call(spec, "start", deployment_id).await?;
        Ok(response.ok)
    }

    async fn cleanup(&self, deployment_id: &str) -> Result<CleanupReport, HaymakerError> {
        let spec = self.command("cleanup").arg(deployment_id);
        self.call(spec, "cleanup", deployment_id).await
    }

    async fn get_logs(
        &self,
        deployment_id: &str,
        follow: bool,
        lines: usize,
    ) -> Result<LogStream, HaymakerError> {
        let mut spec = self
            .command("logs")
            .arg(deployment_id)
            .arg("--lines")
            .arg(lines.to_string());
        if follow {
            spec = spec.arg("--follow");
        }

        let child = spec
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                HaymakerError::PluginError(format!(
                    "failed to run {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;
        stream::child_lines(child)
    }

    async fn validate_config(&self, config: &DeploymentConfig) -> Vec<String> {
        let spec = match Self::config_input(config) {
            Ok(input) => self.command("validate").stdin(input),
            Err(e) => return vec![e.to_string()],
        };
        match self
            .call::<Vec<String>>(spec, "validate", &config.workload_name)
            .await
        {
            Ok(problems) => problems,
            Err(HaymakerError::Unsupported(_)) => Vec::new(),
            Err(e) => vec![e.to_string()],
        }
    }
}
