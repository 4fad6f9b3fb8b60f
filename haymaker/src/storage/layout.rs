//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::HaymakerError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "HAYMAKER_HOME";

/// Where haymaker keeps its files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Layout rooted at `HAYMAKER_HOME`, or `~/.haymaker`
    pub fn from_env() -> Self {
        match std::env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => Self::new(home),
            _ => Self::default(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the deployment state directory
    pub fn state_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("state"))
    }

    /// Get the directory installed workload executables land in
    pub fn bin_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("bin"))
    }

    /// Create the directories
    pub async fn setup(&self) -> Result<(), HaymakerError> {
        self.state_dir().create().await?;
        self.bin_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".haymaker");
        Self::new(base_dir)
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }
}
