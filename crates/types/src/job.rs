//! Cluster jobs and their status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`Job`].
///
/// Legal transitions: `Queued -> Accepted`, `Accepted -> Completed`,
/// `Accepted -> Failed`. Everything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Posted but not yet picked up by the assigned node.
    #[default]
    Queued,
    /// Picked up by the assigned node.
    Accepted,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl JobStatus {
    /// Whether transitioning from `self` to `next` is legal.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Accepted)
                | (JobStatus::Accepted, JobStatus::Completed)
                | (JobStatus::Accepted, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Accepted => write!(f, "accepted"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A job posted on the cluster and replicated through the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier across the cluster.
    pub id: String,
    /// Job kind (e.g. `"NodeOnboarding"`); drives apply-time side effects.
    pub kind: String,
    /// Opaque payload interpreted by the assigned node.
    pub payload: String,
    /// Ledger address of the party that posted the job.
    pub issuer: String,
    /// Reference to the license artifact backing the job.
    pub license_ref: String,
    /// Node the scheduler assigned the job to.
    pub assigned_address: String,
    /// Current lifecycle status.
    pub status: JobStatus,
}

impl Job {
    /// Create a new job in the `Queued` state.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        payload: impl Into<String>,
        issuer: impl Into<String>,
        license_ref: impl Into<String>,
        assigned_address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            payload: payload.into(),
            issuer: issuer.into(),
            license_ref: license_ref.into(),
            assigned_address: assigned_address.into(),
            status: JobStatus::Queued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Accepted));
        assert!(JobStatus::Accepted.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Accepted.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Accepted.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Accepted));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Queued).unwrap(),
            "\"queued\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Accepted).unwrap(),
            "\"accepted\""
        );
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new("j1", "Render", "p", "iss", "cid", "node-b");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.assigned_address, "node-b");
    }
}
