//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the haymaker binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Generate a fresh deployment identifier (`dep-` followed by 12 hex characters).
///
/// The result always satisfies the storage identifier rules.
pub fn new_deployment_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("dep-{}", &id[..12])
}
