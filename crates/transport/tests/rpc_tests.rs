//! Integration tests for the HTTP transport: a real listener on an
//! ephemeral port, a recording RPC handler, and the retrying client.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use cirrus_consensus::{
    AppendEntriesRequest, AppendEntriesResponse, ConsensusError, PeerClient, PeerError, RaftRpc,
    VoteRequest, VoteResponse,
};
use cirrus_identity::{combine_proof, ProofOracle, ProofSnapshot};
use cirrus_transport::{HttpPeerClient, RpcServer, RpcServerConfig};

/// Records every request and answers with canned responses.
#[derive(Default)]
struct RecordingHandler {
    votes: Mutex<Vec<VoteRequest>>,
    appends: Mutex<Vec<AppendEntriesRequest>>,
}

impl RaftRpc for RecordingHandler {
    fn request_vote(&self, request: VoteRequest) -> Result<VoteResponse, ConsensusError> {
        let term = request.term;
        self.votes.lock().push(request);
        Ok(VoteResponse {
            term,
            vote_granted: true,
        })
    }

    fn append_entries(
        &self,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse, ConsensusError> {
        let term = request.term;
        self.appends.lock().push(request);
        Ok(AppendEntriesResponse {
            term,
            success: true,
        })
    }
}

fn test_oracle() -> Arc<ProofOracle> {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("svc"), "service bytes").unwrap();
    let oracle = Arc::new(ProofOracle::new(dir.path()).unwrap());
    // The oracle only reads the tree at construction and on refresh; the
    // tempdir can go away afterwards.
    oracle
}

struct TestServer {
    url: String,
    handler: Arc<RecordingHandler>,
    shutdown: broadcast::Sender<()>,
}

async fn spawn_server(oracle: Arc<ProofOracle>) -> TestServer {
    let handler = Arc::new(RecordingHandler::default());
    let server = RpcServer::bind(
        RpcServerConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
        },
        Arc::clone(&handler),
        oracle,
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let (shutdown, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        server.run(shutdown_rx).await.unwrap();
    });
    TestServer {
        url: format!("http://{addr}"),
        handler,
        shutdown,
    }
}

fn vote_request(term: u64) -> VoteRequest {
    VoteRequest {
        term,
        candidate_id: "n1".into(),
        last_log_index: 0,
        last_log_term: 0,
        service_id: String::new(),
        proof_key_hash: String::new(),
        combined_proof: String::new(),
    }
}

#[tokio::test]
async fn test_request_vote_roundtrip_fills_proof() {
    let oracle = test_oracle();
    let server = spawn_server(Arc::clone(&oracle)).await;
    let client = HttpPeerClient::with_retry(Arc::clone(&oracle), 3, Duration::from_millis(200)).unwrap();

    let response = client.request_vote(&server.url, vote_request(7)).await.unwrap();
    assert_eq!(response.term, 7);
    assert!(response.vote_granted);

    // The transport filled and validated the proof before transmission.
    let seen = server.handler.votes.lock();
    assert_eq!(seen.len(), 1);
    let snapshot = oracle.snapshot();
    assert_eq!(seen[0].service_id, snapshot.service_id);
    assert_eq!(seen[0].proof_key_hash, snapshot.proof_key_hash);
    assert_eq!(
        seen[0].combined_proof,
        combine_proof(&snapshot.service_id, &snapshot.proof_key_hash)
    );

    let _ = server.shutdown.send(());
}

#[tokio::test]
async fn test_append_entries_roundtrip() {
    let oracle = test_oracle();
    let server = spawn_server(Arc::clone(&oracle)).await;
    let client = HttpPeerClient::with_retry(oracle, 3, Duration::from_millis(200)).unwrap();

    let request = AppendEntriesRequest {
        term: 3,
        leader_id: "n1".into(),
        prev_log_index: 0,
        prev_log_term: 0,
        entries: vec![],
        leader_commit: 0,
        service_id: String::new(),
        proof_key_hash: String::new(),
        combined_proof: String::new(),
    };
    let response = client.append_entries(&server.url, request).await.unwrap();
    assert!(response.success);
    assert_eq!(server.handler.appends.lock().len(), 1);

    let _ = server.shutdown.send(());
}

#[tokio::test]
async fn test_tampered_proof_aborts_send_locally() {
    let oracle = test_oracle();
    let server = spawn_server(Arc::clone(&oracle)).await;
    let client = HttpPeerClient::with_retry(oracle, 3, Duration::from_millis(200)).unwrap();

    let mut request = vote_request(1);
    request.service_id = "a".repeat(64);
    request.proof_key_hash = "b".repeat(64);
    request.combined_proof = "0".repeat(64); // wrong on purpose

    let err = client.request_vote(&server.url, request).await.unwrap_err();
    assert!(matches!(err, PeerError::Proof(_)));
    // Nothing went over the wire.
    assert!(server.handler.votes.lock().is_empty());

    let _ = server.shutdown.send(());
}

#[tokio::test]
async fn test_server_rejects_invalid_inbound_proof() {
    let oracle = test_oracle();
    let server = spawn_server(Arc::clone(&oracle)).await;

    // Hand-built request bypassing the client's proof sealing.
    let mut request = vote_request(1);
    request.service_id = "a".repeat(64);
    request.proof_key_hash = "b".repeat(64);
    request.combined_proof = "0".repeat(64);

    let http = reqwest::Client::new();
    let response = http
        .post(format!("{}/requestVote", server.url))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    // The handler never saw the request.
    assert!(server.handler.votes.lock().is_empty());

    let _ = server.shutdown.send(());
}

#[tokio::test]
async fn test_consensus_endpoint_serves_snapshot() {
    let oracle = test_oracle();
    let server = spawn_server(Arc::clone(&oracle)).await;

    let http = reqwest::Client::new();
    let snapshot: ProofSnapshot = http
        .get(format!("{}/consensus", server.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot, oracle.snapshot());

    let _ = server.shutdown.send(());
}

#[tokio::test]
async fn test_unreachable_peer_exhausts_attempts() {
    let oracle = test_oracle();
    // Nothing listens on this port.
    let client = HttpPeerClient::with_retry(oracle, 2, Duration::from_millis(50)).unwrap();

    let started = tokio::time::Instant::now();
    let err = client
        .request_vote("http://127.0.0.1:1", vote_request(1))
        .await
        .unwrap_err();
    assert!(matches!(err, PeerError::Unreachable(_)));
    // Two attempts with one back-off interval between them.
    assert!(started.elapsed() >= Duration::from_millis(50));
}
