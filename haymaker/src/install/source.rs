//! Resolution of a manifest's package source inside a cloned repository

use std::path::{Path, PathBuf};

use url::Url;

use crate::errors::HaymakerError;

/// Whether a package source string names a network location rather than a path
pub fn looks_like_url(source: &str) -> bool {
    let lowered = source.trim().to_ascii_lowercase();
    if lowered.contains("://")
        || ["http:", "https:", "ftp:", "ssh:", "git:", "file:", "git@"]
            .iter()
            .any(|prefix| lowered.starts_with(prefix))
    {
        return true;
    }
    // `scheme:rest` forms such as `mailto:x`; single letters are drive prefixes
    match Url::parse(source.trim()) {
        Ok(url) => url.scheme().len() > 1,
        Err(_) => false,
    }
}

/// Resolve `source` relative to `root`, refusing anything outside it.
///
/// URLs are rejected outright. Paths are canonicalized, so `..` segments,
/// absolute paths and symbolic links pointing elsewhere are all caught. The
/// resolved path must exist.
pub fn resolve_package_source(root: &Path, source: &str) -> Result<PathBuf, HaymakerError> {
    if looks_like_url(source) {
        return Err(HaymakerError::InstallError(format!(
            "manifest package source must be a local path, not a URL: {:?}",
            source
        )));
    }

    let root = root.canonicalize().map_err(|e| {
        HaymakerError::InstallError(format!("cannot resolve clone directory: {}", e))
    })?;

    let candidate = root.join(source);
    let resolved = candidate.canonicalize().map_err(|e| {
        HaymakerError::InstallError(format!(
            "manifest package source {:?} cannot be resolved: {}",
            source, e
        ))
    })?;

    if !resolved.starts_with(&root) {
        return Err(HaymakerError::InstallError(format!(
            "manifest package source escapes the clone directory: {:?}",
            source
        )));
    }

    if !resolved.is_dir() {
        return Err(HaymakerError::InstallError(format!(
            "manifest package source is not a directory: {:?}",
            source
        )));
    }

    Ok(resolved)
}
