//! Workload data models
//!
//! Deployment state and configuration shared by every workload type.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::HaymakerError;

/// Deployment status, identical for all workloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Created, external setup not finished
    Pending,

    /// Executing
    Running,

    /// Stopped, may be resumed by workloads that support it
    Stopped,

    /// Finished on its own
    Completed,

    /// Failed, see the error message
    Failed,

    /// Resources are being deleted
    CleaningUp,
}

impl DeploymentStatus {
    pub const ALL: [DeploymentStatus; 6] = [
        DeploymentStatus::Pending,
        DeploymentStatus::Running,
        DeploymentStatus::Stopped,
        DeploymentStatus::Completed,
        DeploymentStatus::Failed,
        DeploymentStatus::CleaningUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Stopped => "stopped",
            DeploymentStatus::Completed => "completed",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::CleaningUp => "cleaning_up",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = HaymakerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeploymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                HaymakerError::ValidationError(format!("Invalid deployment status: {:?}", s))
            })
    }
}

fn default_phase() -> String {
    "unknown".to_string()
}

/// Persisted state of one deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Platform-wide unique deployment id
    pub deployment_id: String,

    /// Registered name of the owning workload
    pub workload_name: String,

    /// Current status
    pub status: DeploymentStatus,

    /// Workload-defined sub-state
    #[serde(default = "default_phase")]
    pub phase: String,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Workload-specific configuration, opaque to the platform
    #[serde(default)]
    pub config: Map<String, Value>,

    /// Auxiliary facts such as region or resource ids
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Error message, only while failed
    #[serde(default)]
    pub error: Option<String>,
}

impl DeploymentState {
    /// Create a pending deployment state
    pub fn new(deployment_id: impl Into<String>, workload_name: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            workload_name: workload_name.into(),
            status: DeploymentStatus::Pending,
            phase: default_phase(),
            started_at: None,
            stopped_at: None,
            completed_at: None,
            config: Map::new(),
            metadata: Map::new(),
            error: None,
        }
    }

    /// Set the phase
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    /// Set the workload config
    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    /// Check the invariants a persisted state must satisfy
    pub fn check(&self) -> Result<(), HaymakerError> {
        if self.workload_name.is_empty() {
            return Err(HaymakerError::ValidationError(format!(
                "deployment {} has no workload name",
                self.deployment_id
            )));
        }

        match (self.status, &self.error) {
            (DeploymentStatus::Failed, None) => {
                return Err(HaymakerError::ValidationError(format!(
                    "deployment {} is failed but carries no error message",
                    self.deployment_id
                )));
            }
            (status, Some(_)) if status != DeploymentStatus::Failed => {
                return Err(HaymakerError::ValidationError(format!(
                    "deployment {} carries an error message while {}",
                    self.deployment_id, status
                )));
            }
            _ => {}
        }

        // Timestamps that are present must be in lifecycle order
        let ordered = [self.started_at, self.stopped_at, self.completed_at];
        let mut latest: Option<DateTime<Utc>> = None;
        for ts in ordered.into_iter().flatten() {
            if let Some(prev) = latest {
                if ts < prev {
                    return Err(HaymakerError::ValidationError(format!(
                        "deployment {} has timestamps out of order",
                        self.deployment_id
                    )));
                }
            }
            latest = Some(ts);
        }

        Ok(())
    }
}

/// Input for starting a deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Name of the workload to deploy
    pub workload_name: String,

    /// Duration in hours, `None` means indefinite
    #[serde(default)]
    pub duration_hours: Option<u32>,

    /// Caller labels, no platform semantics
    #[serde(default)]
    pub tags: HashMap<String, String>,

    /// Passed through verbatim to the workload
    #[serde(default)]
    pub workload_config: Map<String, Value>,
}

impl DeploymentConfig {
    pub fn new(workload_name: impl Into<String>) -> Self {
        Self {
            workload_name: workload_name.into(),
            ..Default::default()
        }
    }

    /// Structural problems with the config itself, independent of any workload
    pub fn shape_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.workload_name.trim().is_empty() {
            errors.push("workload_name must not be empty".to_string());
        }
        if self.duration_hours == Some(0) {
            errors.push("duration_hours must be positive when set".to_string());
        }
        if self.tags.keys().any(|k| k.trim().is_empty()) {
            errors.push("tag keys must not be empty".to_string());
        }
        errors
    }
}

/// Report returned by a cleanup, never persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deployment_id: String,

    #[serde(default)]
    pub resources_deleted: u32,

    #[serde(default)]
    pub resources_failed: u32,

    #[serde(default)]
    pub details: Vec<String>,

    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default)]
    pub duration_seconds: f64,
}

impl CleanupReport {
    pub fn new(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            ..Default::default()
        }
    }

    /// Record a deleted resource
    pub fn deleted(&mut self, detail: impl Into<String>) {
        self.resources_deleted += 1;
        self.details.push(detail.into());
    }

    /// Record a resource that could not be deleted
    pub fn failed(&mut self, error: impl Into<String>) {
        self.resources_failed += 1;
        self.errors.push(error.into());
    }

    pub fn is_clean(&self) -> bool {
        self.resources_failed == 0 && self.errors.is_empty()
    }
}
