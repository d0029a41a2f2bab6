//! Consensus roles, RPC messages and timing configuration.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use cirrus_types::LogEntry;

/// A node's role in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Passive: responds to leader and candidate RPCs.
    #[default]
    Follower,
    /// Running an election for the current term.
    Candidate,
    /// Replicating the log and driving commits.
    Leader,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Follower => write!(f, "follower"),
            Role::Candidate => write!(f, "candidate"),
            Role::Leader => write!(f, "leader"),
        }
    }
}

/// RequestVote RPC payload.
///
/// The three proof fields are normally left empty by the engine and filled
/// by the transport from the proof oracle before transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRequest {
    /// Candidate's term.
    pub term: u64,
    /// Candidate requesting the vote.
    pub candidate_id: String,
    /// Index of the candidate's last log entry.
    pub last_log_index: u64,
    /// Term of the candidate's last log entry.
    pub last_log_term: u64,
    /// Sender's service identity (64 hex chars).
    #[serde(default)]
    pub service_id: String,
    /// Sender's proof-key hash (64 hex chars).
    #[serde(default)]
    pub proof_key_hash: String,
    /// SHA-256 combination of the two fields above.
    #[serde(default)]
    pub combined_proof: String,
}

/// RequestVote RPC response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    /// Receiver's current term, for the candidate to update itself.
    pub term: u64,
    /// Whether the receiver granted its vote.
    pub vote_granted: bool,
}

/// AppendEntries RPC payload (also the heartbeat when `entries` is empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    /// Leader's term.
    pub term: u64,
    /// Leader's node id, so followers can redirect callers.
    pub leader_id: String,
    /// Index of the entry immediately preceding the new ones.
    pub prev_log_index: u64,
    /// Term of the entry at `prev_log_index`.
    pub prev_log_term: u64,
    /// Entries to store (empty for heartbeat), in ascending index order.
    pub entries: Vec<LogEntry>,
    /// Leader's commit index.
    pub leader_commit: u64,
    /// Sender's service identity (64 hex chars).
    #[serde(default)]
    pub service_id: String,
    /// Sender's proof-key hash (64 hex chars).
    #[serde(default)]
    pub proof_key_hash: String,
    /// SHA-256 combination of the two fields above.
    #[serde(default)]
    pub combined_proof: String,
}

/// AppendEntries RPC response.
///
/// Success deliberately carries no follower log index; the leader backs off
/// `next_index` by one per failed round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    /// Receiver's current term, for the leader to update itself.
    pub term: u64,
    /// Whether the follower's log matched `prev_log_index`/`prev_log_term`
    /// and the entries were stored.
    pub success: bool,
}

/// Timing parameters for elections, heartbeats and peer RPCs.
#[derive(Debug, Clone)]
pub struct RaftTiming {
    /// Lower bound of the randomized election timeout.
    pub election_timeout_min: Duration,
    /// Upper bound of the randomized election timeout.
    pub election_timeout_max: Duration,
    /// Leader heartbeat interval; a small fraction of the election floor.
    pub heartbeat_interval: Duration,
    /// Per-attempt timeout for a peer RPC.
    pub rpc_timeout: Duration,
    /// Attempts per peer RPC before the peer counts as unreachable.
    pub rpc_attempts: u32,
}

impl Default for RaftTiming {
    fn default() -> Self {
        Self {
            election_timeout_min: Duration::from_millis(150),
            election_timeout_max: Duration::from_millis(300),
            heartbeat_interval: Duration::from_millis(50),
            rpc_timeout: Duration::from_millis(100),
            rpc_attempts: 3,
        }
    }
}

impl RaftTiming {
    /// A fast configuration for tests.
    pub fn fast() -> Self {
        Self {
            election_timeout_min: Duration::from_millis(40),
            election_timeout_max: Duration::from_millis(80),
            heartbeat_interval: Duration::from_millis(15),
            rpc_timeout: Duration::from_millis(25),
            rpc_attempts: 3,
        }
    }

    /// Draw a randomized election timeout in the configured range.
    pub fn random_election_timeout(&self) -> Duration {
        let min = self.election_timeout_min.as_millis() as u64;
        let max = self.election_timeout_max.as_millis() as u64;
        if max <= min {
            return self.election_timeout_min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_types::{Command, Job};

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Follower.to_string(), "follower");
        assert_eq!(Role::Candidate.to_string(), "candidate");
        assert_eq!(Role::Leader.to_string(), "leader");
    }

    #[test]
    fn test_random_election_timeout_in_range() {
        let timing = RaftTiming::default();
        for _ in 0..100 {
            let t = timing.random_election_timeout();
            assert!(t >= timing.election_timeout_min);
            assert!(t <= timing.election_timeout_max);
        }
    }

    #[test]
    fn test_vote_request_wire_format() {
        let req = VoteRequest {
            term: 2,
            candidate_id: "node-a".into(),
            last_log_index: 5,
            last_log_term: 1,
            service_id: "a".repeat(64),
            proof_key_hash: "b".repeat(64),
            combined_proof: "c".repeat(64),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["term"], 2);
        assert_eq!(value["candidate_id"], "node-a");
        assert_eq!(value["last_log_index"], 5);
        assert_eq!(value["last_log_term"], 1);
        assert_eq!(value["service_id"], "a".repeat(64));
        assert_eq!(value["proof_key_hash"], "b".repeat(64));
        assert_eq!(value["combined_proof"], "c".repeat(64));

        let back: VoteRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_proof_fields_default_empty() {
        let req: VoteRequest = serde_json::from_str(
            r#"{"term":1,"candidate_id":"n","last_log_index":0,"last_log_term":0}"#,
        )
        .unwrap();
        assert!(req.service_id.is_empty());
        assert!(req.proof_key_hash.is_empty());
        assert!(req.combined_proof.is_empty());
    }

    #[test]
    fn test_append_entries_wire_format() {
        let job = Job::new("j1", "Render", "p", "iss", "cid", "node-b");
        let req = AppendEntriesRequest {
            term: 3,
            leader_id: "node-a".into(),
            prev_log_index: 0,
            prev_log_term: 0,
            entries: vec![LogEntry::new(1, 3, Command::JobPosted(job))],
            leader_commit: 0,
            service_id: String::new(),
            proof_key_hash: String::new(),
            combined_proof: String::new(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: AppendEntriesRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
        assert_eq!(back.entries[0].index, 1);
    }
}
