//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::HaymakerError;
use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), HaymakerError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// List regular files whose extension matches `extension`.
    ///
    /// Dot-files are skipped, which hides in-flight atomic writes.
    pub async fn list_files_with_extension(
        &self,
        extension: &str,
    ) -> Result<Vec<PathBuf>, HaymakerError> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(true);
            if hidden || path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// List entries (files, symlinks or directories) in the directory
    pub async fn list_entries(&self) -> Result<Vec<PathBuf>, HaymakerError> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }
}
