//! The consensus engine: role state machine, election timers, heartbeat
//! replication, commit advancement and the apply loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use cirrus_interconnect::{Coordinate, CoordinateRegistry, Topology};
use cirrus_storage::{LogStore, StorageError};
use cirrus_types::{Command, ContainerState, Job, JobStatus, NetworkDescriptor, NodeId, PeerAddress};

use crate::applier::{CommandApplier, ExternalEffect, LicenseIssuer};
use crate::jobs::JobStore;
use crate::log::ReplicatedLog;
use crate::types::{
    AppendEntriesRequest, AppendEntriesResponse, RaftTiming, Role, VoteRequest, VoteResponse,
};

/// Errors that can occur during consensus operations.
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    /// A leader-only operation was invoked on a non-leader.
    #[error("not the leader (current role: {0})")]
    NotLeader(Role),

    /// A job with this id already exists.
    #[error("job already exists: {0}")]
    JobExists(String),

    /// No job with this id is known.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The requested job status transition is illegal.
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidJobStatus {
        /// The job in question.
        id: String,
        /// Its current status.
        from: JobStatus,
        /// The rejected target status.
        to: JobStatus,
    },

    /// The local node has no interconnect coordinate registered.
    #[error("node {0} has no interconnect coordinate")]
    NoCoordinate(NodeId),

    /// No other reachable node is registered on the interconnect.
    #[error("no reachable peer registered on the interconnect")]
    NoPeersAvailable,

    /// The persistent store failed; the node is stopping.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Error returned by a [`PeerClient`] call.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// The outbound proof failed local validation; the send was aborted.
    #[error("proof rejected locally: {0}")]
    Proof(String),

    /// The peer could not be reached this round (connection error, timeout
    /// after all attempts, or undecodable response).
    #[error("peer unreachable: {0}")]
    Unreachable(String),
}

/// Outbound side of the peer transport.
///
/// Implementations retry with per-attempt timeouts and attach the node's
/// consensus proof. The engine treats any error as "peer unreachable this
/// round" -- never as a granted vote or a successful append.
#[async_trait]
pub trait PeerClient: Send + Sync + 'static {
    /// Send a RequestVote RPC to `peer`.
    async fn request_vote(
        &self,
        peer: &str,
        request: VoteRequest,
    ) -> Result<VoteResponse, PeerError>;

    /// Send an AppendEntries RPC to `peer`.
    async fn append_entries(
        &self,
        peer: &str,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse, PeerError>;
}

/// Inbound side of the peer transport: the RPC handlers the server exposes.
pub trait RaftRpc: Send + Sync {
    /// Handle a RequestVote RPC.
    fn request_vote(&self, request: VoteRequest) -> Result<VoteResponse, ConsensusError>;

    /// Handle an AppendEntries RPC.
    fn append_entries(
        &self,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse, ConsensusError>;
}

/// Point-in-time summary of the engine, for status logging.
#[derive(Debug, Clone)]
pub struct RaftStatus {
    /// This node's id.
    pub node_id: NodeId,
    /// Current role.
    pub role: Role,
    /// Current term.
    pub term: u64,
    /// Log length including the sentinel.
    pub log_len: u64,
    /// Highest committed index.
    pub commit_index: u64,
    /// Highest applied index.
    pub last_applied: u64,
}

impl std::fmt::Display for RaftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "role: {}, term: {}, log length: {}, commit index: {}",
            self.role, self.term, self.log_len, self.commit_index
        )
    }
}

/// All mutable per-node state, guarded by the single consensus mutex.
pub struct NodeState {
    /// Current role.
    pub role: Role,
    /// Monotone non-decreasing election term.
    pub current_term: u64,
    /// Vote cast in the current term, if any.
    pub voted_for: Option<NodeId>,
    /// The replicated log.
    pub log: ReplicatedLog,
    /// Highest index known committed.
    pub commit_index: u64,
    /// Highest index handed to the applier.
    pub last_applied: u64,
    /// Per-peer next replication index (leader only).
    pub next_index: HashMap<PeerAddress, u64>,
    /// Per-peer highest replicated index (leader only).
    pub match_index: HashMap<PeerAddress, u64>,
    /// The job table.
    pub jobs: JobStore,
    /// Applied network/container state.
    pub applier: CommandApplier,
    /// Interconnect coordinates of known members.
    pub coordinates: CoordinateRegistry,
    /// When the election timer fires next.
    pub election_deadline: Instant,
}

/// The consensus engine.
///
/// Generic over the outbound peer transport and the license issuer so tests
/// can inject in-process implementations.
pub struct RaftEngine<C: PeerClient, L: LicenseIssuer> {
    node_id: NodeId,
    peers: Vec<PeerAddress>,
    timing: RaftTiming,
    topology: Topology,
    state: Mutex<NodeState>,
    store: Arc<LogStore>,
    client: Arc<C>,
    issuer: Arc<L>,
    apply_notify: Notify,
    shutdown: broadcast::Sender<()>,
}

impl<C: PeerClient, L: LicenseIssuer + 'static> RaftEngine<C, L> {
    /// Create an engine, restoring term, vote and log from the store.
    pub fn new(
        node_id: impl Into<NodeId>,
        peers: Vec<PeerAddress>,
        timing: RaftTiming,
        topology: Topology,
        store: Arc<LogStore>,
        client: Arc<C>,
        issuer: Arc<L>,
    ) -> Result<Arc<Self>, ConsensusError> {
        let node_id = node_id.into();
        let log = ReplicatedLog::open(Arc::clone(&store))?;
        let current_term = store.current_term()?;
        let voted_for = store.voted_for()?;
        let (shutdown, _) = broadcast::channel(1);

        info!(
            node_id = %node_id,
            peers = peers.len(),
            term = current_term,
            log_len = log.len(),
            "consensus engine restored"
        );

        let deadline = Instant::now() + timing.random_election_timeout();
        Ok(Arc::new(Self {
            node_id,
            peers,
            timing,
            topology,
            state: Mutex::new(NodeState {
                role: Role::Follower,
                current_term,
                voted_for,
                log,
                commit_index: 0,
                last_applied: 0,
                next_index: HashMap::new(),
                match_index: HashMap::new(),
                jobs: JobStore::new(),
                applier: CommandApplier::new(),
                coordinates: CoordinateRegistry::new(),
                election_deadline: deadline,
            }),
            store,
            client,
            issuer,
            apply_notify: Notify::new(),
            shutdown,
        }))
    }

    /// Spawn the role-dispatching loop and the applier loop.
    pub fn start(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let role_engine = Arc::clone(self);
        let role_task = tokio::spawn(async move { RaftEngine::role_loop(role_engine).await });
        let apply_engine = Arc::clone(self);
        let apply_task = tokio::spawn(async move { apply_engine.apply_loop().await });
        vec![role_task, apply_task]
    }

    /// Signal every loop to drain and stop.
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }

    /// Subscribe to the engine's stop signal (shared with the HTTP surface).
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// This node's id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    // ------------------------------------------------------------------
    // Role loops
    // ------------------------------------------------------------------

    async fn role_loop(engine: Arc<Self>) {
        let mut shutdown = engine.shutdown.subscribe();
        loop {
            let role = engine.state.lock().role;
            let stopped = match role {
                Role::Follower => engine.run_follower(&mut shutdown).await,
                Role::Candidate => engine.run_candidate(&mut shutdown).await,
                Role::Leader => Self::run_leader(&engine, &mut shutdown).await,
            };
            if stopped {
                break;
            }
        }
        info!(node_id = %engine.node_id, "consensus loop drained");
    }

    /// Block until the election timer fires without a valid heartbeat or
    /// vote grant, then become candidate. Returns true on shutdown.
    async fn run_follower(&self, shutdown: &mut broadcast::Receiver<()>) -> bool {
        loop {
            let deadline = self.state.lock().election_deadline;
            tokio::select! {
                _ = shutdown.recv() => return true,
                _ = tokio::time::sleep_until(deadline) => {
                    let mut st = self.state.lock();
                    // Heartbeats move the deadline; only a stale one counts.
                    if st.role == Role::Follower && Instant::now() >= st.election_deadline {
                        info!(node_id = %self.node_id, term = st.current_term, "election timeout, becoming candidate");
                        st.role = Role::Candidate;
                        return false;
                    }
                }
            }
        }
    }

    /// Run one election: bump the term, vote for self, solicit votes.
    /// Returns true on shutdown.
    async fn run_candidate(&self, shutdown: &mut broadcast::Receiver<()>) -> bool {
        let (term, last_log_index, last_log_term, deadline) = {
            let mut st = self.state.lock();
            st.current_term += 1;
            st.voted_for = Some(self.node_id.clone());
            st.election_deadline = Instant::now() + self.timing.random_election_timeout();
            if let Err(e) = self.persist_hard_state(st.current_term, Some(self.node_id.as_str())) {
                drop(st);
                self.fail(e);
                return true;
            }
            (
                st.current_term,
                st.log.last_index(),
                st.log.last_term(),
                st.election_deadline,
            )
        };

        info!(node_id = %self.node_id, term, "starting election");

        let (vote_tx, mut vote_rx) = mpsc::channel(self.peers.len().max(1));
        for peer in &self.peers {
            let request = VoteRequest {
                term,
                candidate_id: self.node_id.clone(),
                last_log_index,
                last_log_term,
                service_id: String::new(),
                proof_key_hash: String::new(),
                combined_proof: String::new(),
            };
            let client = Arc::clone(&self.client);
            let peer = peer.clone();
            let vote_tx = vote_tx.clone();
            tokio::spawn(async move {
                match client.request_vote(&peer, request).await {
                    Ok(response) => {
                        let _ = vote_tx.send(response).await;
                    }
                    Err(e) => debug!(peer = %peer, error = %e, "vote request failed"),
                }
            });
        }
        drop(vote_tx);

        let mut votes: usize = 1; // self-vote
        loop {
            if votes > self.peers.len() / 2 {
                self.become_leader(term);
                return false;
            }
            tokio::select! {
                _ = shutdown.recv() => return true,
                _ = tokio::time::sleep_until(deadline) => {
                    // Election timed out; the role loop starts a new one
                    // with an incremented term.
                    debug!(node_id = %self.node_id, term, votes, "election timed out");
                    return false;
                }
                Some(response) = vote_rx.recv() => {
                    let mut st = self.state.lock();
                    if response.term > st.current_term {
                        if self.step_down(&mut st, response.term).is_err() {
                            return true;
                        }
                        return false;
                    }
                    if response.term < term {
                        trace!(term = response.term, "discarding stale vote response");
                        continue;
                    }
                    if response.vote_granted && st.role == Role::Candidate && st.current_term == term {
                        votes += 1;
                        debug!(node_id = %self.node_id, term, votes, "vote granted");
                    }
                }
            }
        }
    }

    fn become_leader(&self, term: u64) {
        let mut st = self.state.lock();
        if st.role != Role::Candidate || st.current_term != term {
            return;
        }
        st.role = Role::Leader;
        let next = st.log.len();
        for peer in &self.peers {
            st.next_index.insert(peer.clone(), next);
            st.match_index.insert(peer.clone(), 0);
        }
        st.election_deadline = Instant::now() + self.timing.random_election_timeout();
        info!(node_id = %self.node_id, term, "elected leader");
    }

    /// Tick heartbeats and drive commit advancement. Returns true on
    /// shutdown.
    async fn run_leader(engine: &Arc<Self>, shutdown: &mut broadcast::Receiver<()>) -> bool {
        let mut ticker = tokio::time::interval(engine.timing.heartbeat_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.recv() => return true,
                _ = ticker.tick() => {
                    {
                        let mut st = engine.state.lock();
                        if st.role != Role::Leader {
                            return false;
                        }
                        if engine.advance_commit(&mut st) {
                            engine.apply_notify.notify_one();
                        }
                    }
                    Self::broadcast_append_entries(engine);
                }
            }
        }
    }

    /// Send one AppendEntries round to every peer. State needed for each
    /// request is snapshotted under the lock; transmission happens in
    /// per-peer tasks without it.
    fn broadcast_append_entries(engine: &Arc<Self>) {
        for peer in &engine.peers {
            let (request, dispatch_term, log_len) = {
                let st = engine.state.lock();
                if st.role != Role::Leader {
                    return;
                }
                let next = st.next_index.get(peer).copied().unwrap_or(st.log.len());
                let prev_log_index = next.saturating_sub(1);
                let prev_log_term = st.log.get(prev_log_index).map(|e| e.term).unwrap_or(0);
                let request = AppendEntriesRequest {
                    term: st.current_term,
                    leader_id: engine.node_id.clone(),
                    prev_log_index,
                    prev_log_term,
                    entries: st.log.tail_from(next),
                    leader_commit: st.commit_index,
                    service_id: String::new(),
                    proof_key_hash: String::new(),
                    combined_proof: String::new(),
                };
                (request, st.current_term, st.log.len())
            };

            let this = Arc::clone(engine);
            let peer = peer.clone();
            tokio::spawn(async move {
                match this.client.append_entries(&peer, request).await {
                    Ok(response) => {
                        this.on_append_entries_response(&peer, dispatch_term, log_len, response)
                    }
                    Err(e) => debug!(peer = %peer, error = %e, "append entries failed"),
                }
            });
        }
    }

    fn on_append_entries_response(
        &self,
        peer: &str,
        dispatch_term: u64,
        log_len: u64,
        response: AppendEntriesResponse,
    ) {
        let mut st = self.state.lock();
        if response.term > st.current_term {
            let _ = self.step_down(&mut st, response.term);
            return;
        }
        if st.role != Role::Leader || st.current_term != dispatch_term {
            return;
        }
        if response.success {
            st.next_index.insert(peer.to_string(), log_len);
            st.match_index
                .insert(peer.to_string(), log_len.saturating_sub(1));
            if self.advance_commit(&mut st) {
                self.apply_notify.notify_one();
            }
        } else {
            // No conflict hint on the wire; back off one index per round.
            let next = st.next_index.entry(peer.to_string()).or_insert(1);
            *next = next.saturating_sub(1).max(1);
            trace!(peer = %peer, next_index = *next, "follower rejected entries, backing off");
        }
    }

    /// Advance `commit_index` over every index replicated on a majority and
    /// appended in the current term. Returns whether it moved.
    fn advance_commit(&self, st: &mut NodeState) -> bool {
        let mut advanced = false;
        for n in (st.commit_index + 1)..st.log.len() {
            let replicas = 1 + self
                .peers
                .iter()
                .filter(|p| st.match_index.get(*p).copied().unwrap_or(0) >= n)
                .count();
            if replicas <= self.peers.len() / 2 {
                continue;
            }
            // Entries from prior terms are never committed by counting;
            // they commit implicitly under a current-term entry.
            match st.log.get(n) {
                Some(entry) if entry.term == st.current_term => {
                    st.commit_index = n;
                    advanced = true;
                }
                _ => {}
            }
        }
        if advanced {
            debug!(node_id = %self.node_id, commit_index = st.commit_index, "commit index advanced");
        }
        advanced
    }

    // ------------------------------------------------------------------
    // Apply loop
    // ------------------------------------------------------------------

    async fn apply_loop(&self) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = self.apply_notify.notified() => {}
            }
            self.apply_committed().await;
        }
    }

    /// Hand committed entries to the applier in strictly ascending index
    /// order. External effects run after the lock is released; their errors
    /// are logged and never roll back the commit.
    async fn apply_committed(&self) {
        loop {
            let effect = {
                let mut st = self.state.lock();
                if st.last_applied >= st.commit_index {
                    break;
                }
                st.last_applied += 1;
                let index = st.last_applied;
                let entry = st.log.get(index).cloned();
                match entry {
                    Some(entry) => {
                        let NodeState { applier, jobs, .. } = &mut *st;
                        applier.apply(&entry, jobs)
                    }
                    None => {
                        error!(index, "committed entry missing from log");
                        None
                    }
                }
            };
            if let Some(ExternalEffect::IssueLicense { issuer, license_ref }) = effect {
                if let Err(e) = self.issuer.issue_license(&issuer, &license_ref).await {
                    warn!(issuer = %issuer, error = %e, "license issuance failed");
                } else {
                    info!(issuer = %issuer, license_ref = %license_ref, "node onboarded");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // RPC handlers (inbound)
    // ------------------------------------------------------------------

    /// Handle a RequestVote RPC from a candidate.
    pub fn handle_request_vote(
        &self,
        request: VoteRequest,
    ) -> Result<VoteResponse, ConsensusError> {
        let mut st = self.state.lock();
        if request.term > st.current_term {
            self.step_down(&mut st, request.term)?;
        }

        let mut vote_granted = false;
        if request.term == st.current_term {
            let up_to_date = (request.last_log_term, request.last_log_index)
                >= (st.log.last_term(), st.log.last_index());
            let can_vote = match &st.voted_for {
                None => true,
                Some(candidate) => *candidate == request.candidate_id,
            };
            if can_vote && up_to_date {
                st.voted_for = Some(request.candidate_id.clone());
                self.persist_hard_state(st.current_term, Some(request.candidate_id.as_str()))
                    .map_err(|e| self.fail(e))?;
                st.election_deadline = Instant::now() + self.timing.random_election_timeout();
                vote_granted = true;
            }
        }

        debug!(
            node_id = %self.node_id,
            candidate = %request.candidate_id,
            term = request.term,
            granted = vote_granted,
            "vote request handled"
        );
        Ok(VoteResponse {
            term: st.current_term,
            vote_granted,
        })
    }

    /// Handle an AppendEntries RPC from a leader.
    pub fn handle_append_entries(
        &self,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse, ConsensusError> {
        let mut notify_apply = false;
        let response = {
            let mut st = self.state.lock();
            if request.term < st.current_term {
                return Ok(AppendEntriesResponse {
                    term: st.current_term,
                    success: false,
                });
            }
            if request.term > st.current_term {
                self.step_down(&mut st, request.term)?;
            }
            // A valid AppendEntries for the current term asserts leadership.
            st.role = Role::Follower;
            st.election_deadline = Instant::now() + self.timing.random_election_timeout();

            let consistent = st
                .log
                .get(request.prev_log_index)
                .map(|e| e.term == request.prev_log_term)
                .unwrap_or(false);
            if !consistent {
                trace!(
                    node_id = %self.node_id,
                    prev_log_index = request.prev_log_index,
                    prev_log_term = request.prev_log_term,
                    "log consistency check failed"
                );
                return Ok(AppendEntriesResponse {
                    term: st.current_term,
                    success: false,
                });
            }

            for entry in request.entries {
                let existing_term = st.log.get(entry.index).map(|e| e.term);
                match existing_term {
                    // Already present with the same term; never rewritten.
                    Some(term) if term == entry.term => continue,
                    Some(_) => {
                        st.log
                            .truncate_after(entry.index - 1)
                            .map_err(|e| self.fail(e))?;
                        st.log.append_entry(entry).map_err(|e| self.fail(e))?;
                    }
                    None => st.log.append_entry(entry).map_err(|e| self.fail(e))?,
                }
            }

            let new_commit = request.leader_commit.min(st.log.last_index());
            if new_commit > st.commit_index {
                st.commit_index = new_commit;
                notify_apply = true;
            }
            AppendEntriesResponse {
                term: st.current_term,
                success: true,
            }
        };
        if notify_apply {
            self.apply_notify.notify_one();
        }
        Ok(response)
    }

    // ------------------------------------------------------------------
    // Leader operations
    // ------------------------------------------------------------------

    /// Append a command to the log (leader only). Returns the new index.
    pub fn append_command(&self, command: Command) -> Result<u64, ConsensusError> {
        let mut st = self.state.lock();
        self.append_command_locked(&mut st, command)
    }

    fn append_command_locked(
        &self,
        st: &mut NodeState,
        command: Command,
    ) -> Result<u64, ConsensusError> {
        if st.role != Role::Leader {
            return Err(ConsensusError::NotLeader(st.role));
        }
        let term = st.current_term;
        let index = st
            .log
            .append_command(term, command)
            .map_err(|e| self.fail(e))?;
        debug!(node_id = %self.node_id, index, term, "command appended");
        Ok(index)
    }

    /// Post a new job and replicate it. The store only receives the record
    /// after the posting command is accepted into the local log.
    pub fn post_job(&self, mut job: Job) -> Result<(), ConsensusError> {
        let mut st = self.state.lock();
        self.post_job_locked(&mut st, &mut job)
    }

    fn post_job_locked(&self, st: &mut NodeState, job: &mut Job) -> Result<(), ConsensusError> {
        if st.jobs.contains(&job.id) {
            return Err(ConsensusError::JobExists(job.id.clone()));
        }
        job.status = JobStatus::Queued;
        self.append_command_locked(st, Command::JobPosted(job.clone()))?;
        st.jobs.post(job.clone())?;
        info!(job_id = %job.id, kind = %job.kind, assigned = %job.assigned_address, "job posted");
        Ok(())
    }

    /// Transition a queued job to accepted and replicate the update.
    pub fn accept_job(&self, job_id: &str) -> Result<(), ConsensusError> {
        let mut st = self.state.lock();
        if st.role != Role::Leader {
            return Err(ConsensusError::NotLeader(st.role));
        }
        let updated = st.jobs.accept(job_id)?;
        self.append_command_locked(&mut st, Command::JobPosted(updated))?;
        info!(job_id = %job_id, "job accepted");
        Ok(())
    }

    /// Declare a network on the cluster (leader only). The descriptor's
    /// master license has already been verified by an external collaborator.
    pub fn declare_network(&self, network: NetworkDescriptor) -> Result<u64, ConsensusError> {
        let index = self.append_command(Command::NetworkDeclared(network.clone()))?;
        info!(network_id = %network.id, index, "network declared");
        Ok(index)
    }

    /// Record a container's state hash (leader only), stamped with the
    /// current Unix time.
    pub fn update_container_state(
        &self,
        container_id: impl Into<String>,
        state_hash: impl Into<String>,
    ) -> Result<u64, ConsensusError> {
        let timestamp_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let state = ContainerState::new(container_id, state_hash, timestamp_secs);
        self.append_command(Command::ContainerStateUpdated(state))
    }

    /// Construct a job for the nearest peer on the interconnect and post it.
    pub fn schedule_job(
        &self,
        job_id: impl Into<String>,
        kind: impl Into<String>,
        payload: impl Into<String>,
        issuer: impl Into<String>,
        license_ref: impl Into<String>,
    ) -> Result<Job, ConsensusError> {
        let mut st = self.state.lock();
        let assigned = {
            if st.coordinates.get(&self.node_id).is_none() {
                return Err(ConsensusError::NoCoordinate(self.node_id.clone()));
            }
            let (best, distance) = st
                .coordinates
                .nearest(&self.topology, &self.node_id)
                .ok_or(ConsensusError::NoPeersAvailable)?;
            debug!(assigned = %best, distance, mode = %self.topology.mode(), "job placement selected");
            best.to_string()
        };
        let mut job = Job::new(job_id, kind, payload, issuer, license_ref, assigned);
        self.post_job_locked(&mut st, &mut job)?;
        Ok(job)
    }

    // ------------------------------------------------------------------
    // Coordinates and read accessors
    // ------------------------------------------------------------------

    /// Record or update a member's interconnect coordinate.
    pub fn set_coordinate(&self, node_id: impl Into<String>, coord: Coordinate) {
        self.state.lock().coordinates.set(node_id, coord);
    }

    /// Look up a member's interconnect coordinate.
    pub fn coordinate(&self, node_id: &str) -> Option<Coordinate> {
        self.state.lock().coordinates.get(node_id).cloned()
    }

    /// Current role.
    pub fn role(&self) -> Role {
        self.state.lock().role
    }

    /// Current term.
    pub fn current_term(&self) -> u64 {
        self.state.lock().current_term
    }

    /// Highest committed index.
    pub fn commit_index(&self) -> u64 {
        self.state.lock().commit_index
    }

    /// Highest applied index.
    pub fn last_applied(&self) -> u64 {
        self.state.lock().last_applied
    }

    /// Look up a job by id.
    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.state.lock().jobs.get(job_id).cloned()
    }

    /// Look up a declared network by id.
    pub fn network(&self, network_id: &str) -> Option<NetworkDescriptor> {
        self.state.lock().applier.state().network(network_id).cloned()
    }

    /// Look up the last reported container state.
    pub fn container_state(&self, container_id: &str) -> Option<ContainerState> {
        self.state
            .lock()
            .applier
            .state()
            .container(container_id)
            .cloned()
    }

    /// Point-in-time status summary.
    pub fn status(&self) -> RaftStatus {
        let st = self.state.lock();
        RaftStatus {
            node_id: self.node_id.clone(),
            role: st.role,
            term: st.current_term,
            log_len: st.log.len(),
            commit_index: st.commit_index,
            last_applied: st.last_applied,
        }
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    /// Adopt a higher term: clear the vote, fall back to follower, persist.
    fn step_down(&self, st: &mut NodeState, term: u64) -> Result<(), ConsensusError> {
        debug!(node_id = %self.node_id, old_term = st.current_term, new_term = term, "stepping down");
        st.current_term = term;
        st.voted_for = None;
        st.role = Role::Follower;
        st.election_deadline = Instant::now() + self.timing.random_election_timeout();
        self.persist_hard_state(term, None).map_err(|e| self.fail(e))?;
        Ok(())
    }

    fn persist_hard_state(
        &self,
        term: u64,
        voted_for: Option<&str>,
    ) -> Result<(), StorageError> {
        self.store.set_current_term(term)?;
        self.store.set_voted_for(voted_for)
    }

    /// A persistence failure is fatal: log it, signal shutdown, and surface
    /// the error to the caller.
    fn fail(&self, e: StorageError) -> ConsensusError {
        error!(node_id = %self.node_id, error = %e, "persistent store failed, stopping node");
        let _ = self.shutdown.send(());
        ConsensusError::Storage(e)
    }
}

impl<C: PeerClient, L: LicenseIssuer + 'static> RaftRpc for RaftEngine<C, L> {
    fn request_vote(&self, request: VoteRequest) -> Result<VoteResponse, ConsensusError> {
        self.handle_request_vote(request)
    }

    fn append_entries(
        &self,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse, ConsensusError> {
        self.handle_append_entries(request)
    }
}
