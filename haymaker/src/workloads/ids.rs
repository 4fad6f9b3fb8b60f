//! Identifier validation
//!
//! Deployment ids become file names and workload names become executable
//! suffixes, so both are checked against the same restrictive pattern before
//! they are allowed anywhere near the filesystem.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::HaymakerError;

/// Alphanumeric first character, then alphanumerics, dots, hyphens, underscores
static SAFE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("identifier pattern is valid")
});

/// Longest identifier accepted (file name limits leave room for the extension)
pub const MAX_ID_LEN: usize = 200;

/// Name a workload implementation gets if it never declares its own
pub const PLACEHOLDER_WORKLOAD_NAME: &str = "base";

fn check_identifier<'a>(kind: &str, value: &'a str) -> Result<&'a str, HaymakerError> {
    if value.is_empty() {
        return Err(HaymakerError::ValidationError(format!(
            "{} must not be empty",
            kind
        )));
    }

    if value.len() > MAX_ID_LEN {
        return Err(HaymakerError::ValidationError(format!(
            "{} is longer than {} bytes",
            kind, MAX_ID_LEN
        )));
    }

    if value.contains('/') || value.contains('\\') {
        return Err(HaymakerError::ValidationError(format!(
            "{} contains path separators: {:?}",
            kind, value
        )));
    }

    if value.contains("..") {
        return Err(HaymakerError::ValidationError(format!(
            "{} contains path traversal: {:?}",
            kind, value
        )));
    }

    if !SAFE_ID_PATTERN.is_match(value) {
        return Err(HaymakerError::ValidationError(format!(
            "{} contains invalid characters: {:?}. \
             Only alphanumerics, hyphens, underscores and dots are allowed, \
             and it must not start with a dot",
            kind, value
        )));
    }

    Ok(value)
}

/// Validate a deployment id before it is used to address storage
pub fn sanitize_deployment_id(deployment_id: &str) -> Result<&str, HaymakerError> {
    check_identifier("deployment_id", deployment_id)
}

/// Validate a workload name; the placeholder name is rejected as well
pub fn validate_workload_name(name: &str) -> Result<&str, HaymakerError> {
    check_identifier("workload name", name)?;
    if name == PLACEHOLDER_WORKLOAD_NAME {
        return Err(HaymakerError::ValidationError(format!(
            "workload name {:?} is a placeholder; workloads must declare a unique name",
            name
        )));
    }
    Ok(name)
}
