//! Package installation step
//!
//! The registry treats installing a package as an opaque external step with a
//! success, failure or timeout outcome. The default runs a configurable
//! command (`cargo install --path {path} --root {root}`), which puts
//! `haymaker-workload-*` executables where executable discovery looks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::errors::HaymakerError;
use crate::install::process::{CommandOutcome, CommandSpec};

/// Installs a workload package from a local directory
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(&self, path: &Path, limit: Duration) -> Result<CommandOutcome, HaymakerError>;
}

/// Runs an install command with `{path}` and `{root}` placeholders
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
    root: PathBuf,
}

impl CommandInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            root: root.into(),
        }
    }

    /// `cargo install --path {path} --root {root}`
    pub fn cargo(root: impl Into<PathBuf>) -> Self {
        Self::new("cargo", default_install_args(), root)
    }

    /// Command for one package path, placeholders substituted
    pub fn command_for(&self, path: &Path) -> CommandSpec {
        let path = path.to_string_lossy();
        let root = self.root.to_string_lossy();
        let args = self
            .args
            .iter()
            .map(|arg| arg.replace("{path}", &path).replace("{root}", &root));
        CommandSpec::new(&self.program).args(args)
    }
}

/// Default installer arguments
pub fn default_install_args() -> Vec<String> {
    ["install", "--path", "{path}", "--root", "{root}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[async_trait]
impl PackageInstaller for CommandInstaller {
    async fn install(&self, path: &Path, limit: Duration) -> Result<CommandOutcome, HaymakerError> {
        info!("Installing workload package from {}", path.display());
        self.command_for(path).run(limit).await.map_err(|e| {
            HaymakerError::InstallError(format!("failed to run {}: {}", self.program, e))
        })
    }
}
