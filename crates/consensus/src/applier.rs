//! Applying committed commands to local state.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};

use cirrus_types::{ContainerState, Job, LogEntry, NetworkDescriptor};

use crate::jobs::JobStore;

/// Job kind whose commit triggers license issuance.
pub const KIND_NODE_ONBOARDING: &str = "NodeOnboarding";

/// External collaborator that mints license artifacts for onboarded nodes.
///
/// Issuance failures are logged by the engine and never retried
/// automatically; a commit is not rolled back because an external call
/// failed.
#[async_trait]
pub trait LicenseIssuer: Send + Sync {
    /// Issue a license artifact for `issuer` referencing `license_ref`.
    async fn issue_license(&self, issuer: &str, license_ref: &str) -> Result<(), String>;
}

/// A side effect that must run outside the consensus mutex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalEffect {
    /// Trigger license issuance for an onboarded node.
    IssueLicense {
        /// Ledger address of the onboarding issuer.
        issuer: String,
        /// Reference to the license artifact.
        license_ref: String,
    },
}

/// Local state derived purely from committed log entries.
#[derive(Debug, Default, Clone)]
pub struct AppliedState {
    networks: HashMap<String, NetworkDescriptor>,
    containers: HashMap<String, ContainerState>,
}

impl AppliedState {
    /// Look up a declared network.
    pub fn network(&self, id: &str) -> Option<&NetworkDescriptor> {
        self.networks.get(id)
    }

    /// Number of declared networks.
    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Look up the last reported state of a container.
    pub fn container(&self, id: &str) -> Option<&ContainerState> {
        self.containers.get(id)
    }

    /// Number of tracked containers.
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }
}

/// Demultiplexes committed commands into domain effects.
///
/// Apply is idempotent: replaying the same committed log against a fresh
/// applier reproduces identical state.
#[derive(Debug, Default)]
pub struct CommandApplier {
    state: AppliedState,
}

impl CommandApplier {
    /// Create an applier with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one committed entry. Pure state mutations happen inline; any
    /// external effect is returned for the caller to run outside the lock.
    pub fn apply(&mut self, entry: &LogEntry, jobs: &mut JobStore) -> Option<ExternalEffect> {
        use cirrus_types::Command::*;
        let command = entry.command.as_ref()?;
        match command {
            NetworkDeclared(network) => {
                info!(
                    network_id = %network.id,
                    issuer = %network.issuer_address,
                    master_license = %network.master_license_id,
                    "network declared"
                );
                self.state
                    .networks
                    .insert(network.id.clone(), network.clone());
                None
            }
            JobPosted(job) => self.apply_job(entry.index, job, jobs),
            ContainerStateUpdated(container) => {
                debug!(
                    container_id = %container.container_id,
                    state_hash = %container.state_hash,
                    "container state updated"
                );
                // Last writer wins; the log provides the total order.
                self.state
                    .containers
                    .insert(container.container_id.clone(), container.clone());
                None
            }
        }
    }

    fn apply_job(&mut self, index: u64, job: &Job, jobs: &mut JobStore) -> Option<ExternalEffect> {
        debug!(index, job_id = %job.id, kind = %job.kind, status = %job.status, "job applied");
        let effect = if job.kind == KIND_NODE_ONBOARDING {
            Some(ExternalEffect::IssueLicense {
                issuer: job.issuer.clone(),
                license_ref: job.license_ref.clone(),
            })
        } else {
            None
        };
        // The store ends up reflecting the status the command declared.
        jobs.record(job.clone());
        effect
    }

    /// Snapshot of the applied network/container state.
    pub fn state(&self) -> &AppliedState {
        &self.state
    }
}
