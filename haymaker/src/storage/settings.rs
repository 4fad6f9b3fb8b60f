//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::HaymakerError;
use crate::install::package::default_install_args;
use crate::logs::LogLevel;
use crate::storage::layout::StorageLayout;

/// Haymaker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Deployment state directory; defaults to `<home>/state`
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Package install root; defaults to `<home>`. Workload executables
    /// are installed to and discovered in `<install_root>/bin`
    #[serde(default)]
    pub install_root: Option<PathBuf>,

    /// Time limit for one call into a workload executable, in seconds
    #[serde(default = "default_plugin_timeout")]
    pub plugin_timeout_secs: u64,

    /// Package installation
    #[serde(default)]
    pub install: InstallSettings,
}

fn default_plugin_timeout() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            state_dir: None,
            install_root: None,
            plugin_timeout_secs: default_plugin_timeout(),
            install: InstallSettings::default(),
        }
    }
}

impl Settings {
    /// Read the settings file, falling back to defaults when it does not exist
    pub async fn load(layout: &StorageLayout) -> Result<Self, HaymakerError> {
        let file = layout.settings_file();
        if !file.exists().await {
            debug!("No settings file at {}, using defaults", file.path().display());
            return Ok(Self::default());
        }
        file.read_json::<Settings>().await.map_err(|e| {
            HaymakerError::ConfigError(format!(
                "invalid settings file {}: {}",
                file.path().display(),
                e
            ))
        })
    }

    pub fn state_dir(&self, layout: &StorageLayout) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| layout.state_dir().path().to_path_buf())
    }

    pub fn install_root(&self, layout: &StorageLayout) -> PathBuf {
        self.install_root
            .clone()
            .unwrap_or_else(|| layout.base_dir.clone())
    }

    /// `cargo install --root R` writes binaries to `R/bin`
    pub fn bin_dir(&self, layout: &StorageLayout) -> PathBuf {
        match &self.install_root {
            Some(root) => root.join("bin"),
            None => layout.bin_dir().path().to_path_buf(),
        }
    }
}

/// Package installation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallSettings {
    /// Git executable used to clone workload repositories
    #[serde(default = "default_git_program")]
    pub git_program: String,

    #[serde(default = "default_clone_timeout")]
    pub clone_timeout_secs: u64,

    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,

    /// Installer executable
    #[serde(default = "default_installer_program")]
    pub installer_program: String,

    /// Installer arguments; `{path}` and `{root}` are substituted
    #[serde(default = "default_install_args")]
    pub installer_args: Vec<String>,
}

fn default_git_program() -> String {
    "git".to_string()
}

fn default_clone_timeout() -> u64 {
    120
}

fn default_install_timeout() -> u64 {
    300
}

fn default_installer_program() -> String {
    "cargo".to_string()
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            git_program: default_git_program(),
            clone_timeout_secs: default_clone_timeout(),
            install_timeout_secs: default_install_timeout(),
            installer_program: default_installer_program(),
            installer_args: default_install_args(),
        }
    }
}
