//! Deployment lifecycle state machine
//!
//! Workloads move their `DeploymentState` through these events instead of
//! writing `status` directly, which keeps the timestamp and error invariants
//! intact.

use chrono::{DateTime, Utc};

use crate::errors::HaymakerError;
use crate::workloads::models::{DeploymentState, DeploymentStatus};

/// Lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// External setup finished, execution begins
    Start,

    /// Execution halted on request
    Stop,

    /// Stopped deployment continues
    Resume,

    /// Execution finished on its own
    Complete,

    /// Something went wrong
    Fail(String),

    /// Resource deletion begins
    Cleanup,
}

/// Status a deployment ends up in after `event`, if the move is legal
pub fn next_status(
    current: DeploymentStatus,
    event: &DeploymentEvent,
) -> Option<DeploymentStatus> {
    use DeploymentEvent as E;
    use DeploymentStatus as S;

    let next = match (current, event) {
        // From Pending
        (S::Pending, E::Start) => S::Running,
        (S::Pending, E::Fail(_)) => S::Failed,

        // From Running
        (S::Running, E::Stop) => S::Stopped,
        (S::Running, E::Complete) => S::Completed,
        (S::Running, E::Fail(_)) => S::Failed,

        // From Stopped
        (S::Stopped, E::Resume) => S::Running,
        (S::Stopped, E::Fail(_)) => S::Failed,

        // Cleanup can begin from anywhere except itself
        (S::CleaningUp, E::Cleanup) => return None,
        (_, E::Cleanup) => S::CleaningUp,
        (S::CleaningUp, E::Fail(_)) => S::Failed,

        _ => return None,
    };
    Some(next)
}

impl DeploymentState {
    /// Apply a lifecycle event using the current time
    pub fn apply(&mut self, event: DeploymentEvent) -> Result<(), HaymakerError> {
        self.apply_at(event, Utc::now())
    }

    /// Apply a lifecycle event at a given instant.
    ///
    /// Illegal moves leave the state untouched.
    pub fn apply_at(
        &mut self,
        event: DeploymentEvent,
        now: DateTime<Utc>,
    ) -> Result<(), HaymakerError> {
        let next = next_status(self.status, &event).ok_or_else(|| {
            HaymakerError::InvalidTransition(format!(
                "deployment {}: {} -> {:?}",
                self.deployment_id, self.status, event
            ))
        })?;

        // Never stamp earlier than a timestamp already recorded
        let stamp = [self.started_at, self.stopped_at, self.completed_at]
            .into_iter()
            .flatten()
            .fold(now, |acc, ts| acc.max(ts));

        match next {
            DeploymentStatus::Running => {
                self.started_at.get_or_insert(stamp);
            }
            DeploymentStatus::Stopped => {
                self.stopped_at.get_or_insert(stamp);
            }
            DeploymentStatus::Completed => {
                self.completed_at.get_or_insert(stamp);
            }
            _ => {}
        }

        self.error = match event {
            DeploymentEvent::Fail(message) => Some(message),
            _ => None,
        };
        self.status = next;
        Ok(())
    }
}
