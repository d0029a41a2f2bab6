//! Outbound peer client: JSON over HTTP with bounded retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use cirrus_consensus::{
    AppendEntriesRequest, AppendEntriesResponse, PeerClient, PeerError, RaftTiming, VoteRequest,
    VoteResponse,
};
use cirrus_identity::{combine_proof, validate_proof, ProofOracle};

use crate::TransportError;

/// HTTP implementation of the consensus peer client.
///
/// Each RPC makes up to `attempts` tries with a fixed per-attempt timeout,
/// waiting one timeout interval between attempts. Both RPCs are idempotent
/// by construction, so retrying is safe.
pub struct HttpPeerClient {
    http: reqwest::Client,
    oracle: Arc<ProofOracle>,
    attempts: u32,
    attempt_timeout: Duration,
}

impl HttpPeerClient {
    /// Build a client using the timing's RPC attempt budget.
    pub fn new(oracle: Arc<ProofOracle>, timing: &RaftTiming) -> Result<Self, TransportError> {
        Self::with_retry(oracle, timing.rpc_attempts, timing.rpc_timeout)
    }

    /// Build a client with an explicit attempt count and per-attempt timeout.
    pub fn with_retry(
        oracle: Arc<ProofOracle>,
        attempts: u32,
        attempt_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(attempt_timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            http,
            oracle,
            attempts: attempts.max(1),
            attempt_timeout,
        })
    }

    /// Fill empty proof fields from the oracle, then validate the triple.
    /// Runs before every transmission; a failure aborts the send locally.
    fn seal_proof(
        &self,
        service_id: &mut String,
        proof_key_hash: &mut String,
        combined_proof: &mut String,
    ) -> Result<(), TransportError> {
        if service_id.is_empty() || proof_key_hash.is_empty() {
            let snapshot = self.oracle.snapshot();
            *service_id = snapshot.service_id;
            *proof_key_hash = snapshot.proof_key_hash;
        }
        if combined_proof.is_empty() {
            *combined_proof = combine_proof(service_id, proof_key_hash);
        }
        validate_proof(service_id, proof_key_hash, combined_proof)?;
        Ok(())
    }

    async fn post_json<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp, TransportError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let mut last_error = String::from("no attempts made");
        for attempt in 1..=self.attempts {
            match self.try_once(url, request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    debug!(url = %url, attempt, error = %e, "rpc attempt failed");
                    last_error = e;
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.attempt_timeout).await;
            }
        }
        Err(TransportError::Exhausted {
            peer: url.to_string(),
            attempts: self.attempts,
            last_error,
        })
    }

    async fn try_once<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp, String>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        response.json::<Resp>().await.map_err(|e| e.to_string())
    }
}

fn to_peer_error(e: TransportError) -> PeerError {
    match e {
        TransportError::Proof(p) => PeerError::Proof(p.to_string()),
        other => PeerError::Unreachable(other.to_string()),
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn request_vote(
        &self,
        peer: &str,
        mut request: VoteRequest,
    ) -> Result<VoteResponse, PeerError> {
        let VoteRequest {
            service_id,
            proof_key_hash,
            combined_proof,
            ..
        } = &mut request;
        self.seal_proof(service_id, proof_key_hash, combined_proof)
            .map_err(to_peer_error)?;
        let url = format!("{}/requestVote", peer.trim_end_matches('/'));
        self.post_json(&url, &request).await.map_err(to_peer_error)
    }

    async fn append_entries(
        &self,
        peer: &str,
        mut request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse, PeerError> {
        let AppendEntriesRequest {
            service_id,
            proof_key_hash,
            combined_proof,
            ..
        } = &mut request;
        self.seal_proof(service_id, proof_key_hash, combined_proof)
            .map_err(to_peer_error)?;
        let url = format!("{}/appendEntries", peer.trim_end_matches('/'));
        self.post_json(&url, &request).await.map_err(to_peer_error)
    }
}
