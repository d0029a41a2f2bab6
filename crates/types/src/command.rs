//! Replicated commands and the domain records they carry.
//!
//! Every non-sentinel log entry carries exactly one [`Command`]. The variant
//! tag travels on the wire as a `"type"` field so that dispatch on the apply
//! path is exhaustive rather than guessed from the payload shape.

use serde::{Deserialize, Serialize};

use crate::job::Job;

/// A network declared on the cluster, bound to an external ledger license.
///
/// The master license is verified by an external collaborator before the
/// descriptor ever reaches the log; the descriptor only records the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// Unique network identifier.
    pub id: String,
    /// Ledger address of the token issuer that registered the network.
    pub issuer_address: String,
    /// Identifier of the verified master license transaction.
    pub master_license_id: String,
}

impl NetworkDescriptor {
    /// Create a new network descriptor.
    pub fn new(
        id: impl Into<String>,
        issuer_address: impl Into<String>,
        master_license_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            issuer_address: issuer_address.into(),
            master_license_id: master_license_id.into(),
        }
    }
}

/// Container-level state reported through the log.
///
/// Replication gives these updates a total order; the applier keeps the last
/// writer per container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    /// Identifier of the container the state belongs to.
    pub container_id: String,
    /// Hash of the container's current state.
    pub state_hash: String,
    /// Unix timestamp (seconds) at which the state was recorded.
    pub timestamp_secs: i64,
}

impl ContainerState {
    /// Create a new container state record.
    pub fn new(
        container_id: impl Into<String>,
        state_hash: impl Into<String>,
        timestamp_secs: i64,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            state_hash: state_hash.into(),
            timestamp_secs,
        }
    }
}

/// A command carried by a replicated log entry.
///
/// Dispatch over the three cases is exhaustive in the command applier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// A new network was declared on the cluster.
    NetworkDeclared(NetworkDescriptor),
    /// A job was posted (or its status updated) on the cluster.
    JobPosted(Job),
    /// A container reported a new state hash.
    ContainerStateUpdated(ContainerState),
}

impl Command {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::NetworkDeclared(_) => "network_declared",
            Command::JobPosted(_) => "job_posted",
            Command::ContainerStateUpdated(_) => "container_state_updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[test]
    fn test_command_json_roundtrip() {
        let commands = vec![
            Command::NetworkDeclared(NetworkDescriptor::new("net-1", "rIssuer", "lic-tx")),
            Command::JobPosted(Job::new("j1", "Render", "p", "iss", "cid", "node-b")),
            Command::ContainerStateUpdated(ContainerState::new("c1", "abcd", 1_700_000_000)),
        ];

        for cmd in commands {
            let json = serde_json::to_string(&cmd).unwrap();
            let back: Command = serde_json::from_str(&json).unwrap();
            assert_eq!(cmd, back);
            // Re-serializing the parsed value must be byte-equal.
            assert_eq!(json, serde_json::to_string(&back).unwrap());
        }
    }

    #[test]
    fn test_command_tagged_encoding() {
        let cmd = Command::NetworkDeclared(NetworkDescriptor::new("net-1", "rIssuer", "lic-tx"));
        let value: serde_json::Value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["type"], "NetworkDeclared");
        assert_eq!(value["id"], "net-1");
        assert_eq!(value["issuer_address"], "rIssuer");
        assert_eq!(value["master_license_id"], "lic-tx");
    }

    #[test]
    fn test_job_posted_carries_status() {
        let mut job = Job::new("j1", "NodeOnboarding", "", "iss", "cid", "node-b");
        job.status = JobStatus::Accepted;
        let cmd = Command::JobPosted(job);
        let value: serde_json::Value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["status"], "accepted");
    }
}
