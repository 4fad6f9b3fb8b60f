//! Fetching workload sources with git

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::HaymakerError;
use crate::install::process::{CommandOutcome, CommandSpec};

/// Fetches a remote source into a local directory
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Clone `url` into `dest` (which must not exist yet) within `limit`
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        limit: Duration,
    ) -> Result<CommandOutcome, HaymakerError>;
}

/// Shallow `git clone`
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: String,
}

impl GitFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Clone command; `--` keeps the url from being read as an option
    pub fn clone_command(&self, url: &str, dest: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(["clone", "--depth", "1", "--"])
            .arg(url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        limit: Duration,
    ) -> Result<CommandOutcome, HaymakerError> {
        info!("Cloning workload source {}", url);
        let outcome = self
            .clone_command(url, dest)
            .run(limit)
            .await
            .map_err(|e| HaymakerError::InstallError(format!("failed to run git: {}", e)))?;
        if !outcome.success() {
            debug!("git clone stderr: {}", outcome.stderr);
        }
        Ok(outcome)
    }
}
