//! Inbound RPC surface: the two consensus RPCs plus the proof endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use cirrus_consensus::{AppendEntriesRequest, RaftRpc, VoteRequest};
use cirrus_identity::{validate_proof, ProofOracle, ProofSnapshot};

use crate::TransportError;

/// RPC server configuration.
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Address the listener binds to.
    pub listen_addr: SocketAddr,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".parse().unwrap(),
        }
    }
}

struct ServerState<R> {
    handler: Arc<R>,
    oracle: Arc<ProofOracle>,
}

impl<R> Clone for ServerState<R> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            oracle: Arc::clone(&self.oracle),
        }
    }
}

/// The bound RPC server. Construction binds the listener so callers can
/// observe the local address before the accept loop starts.
pub struct RpcServer {
    listener: TcpListener,
    router: Router,
}

impl RpcServer {
    /// Bind the listener and assemble the router.
    pub async fn bind<R: RaftRpc + 'static>(
        config: RpcServerConfig,
        handler: Arc<R>,
        oracle: Arc<ProofOracle>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|e| TransportError::Server(e.to_string()))?;

        let state = ServerState { handler, oracle };
        let router = Router::new()
            .route("/requestVote", post(handle_request_vote::<R>))
            .route("/appendEntries", post(handle_append_entries::<R>))
            .route("/consensus", get(handle_consensus::<R>))
            .with_state(state);

        Ok(Self { listener, router })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(|e| TransportError::Server(e.to_string()))
    }

    /// Serve until the shutdown signal fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), TransportError> {
        let addr = self.local_addr()?;
        info!(addr = %addr, "rpc server listening");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("rpc server shutting down");
            })
            .await
            .map_err(|e| TransportError::Server(e.to_string()))
    }
}

/// Reject the request unless its proof triple validates. A failed proof
/// never reaches the consensus engine.
fn check_proof(service_id: &str, proof_key_hash: &str, combined_proof: &str) -> Result<(), Response> {
    validate_proof(service_id, proof_key_hash, combined_proof).map_err(|e| {
        warn!(error = %e, "rejected rpc with invalid proof");
        (StatusCode::BAD_REQUEST, e.to_string()).into_response()
    })
}

async fn handle_request_vote<R: RaftRpc>(
    State(state): State<ServerState<R>>,
    Json(request): Json<VoteRequest>,
) -> Response {
    if let Err(rejection) = check_proof(
        &request.service_id,
        &request.proof_key_hash,
        &request.combined_proof,
    ) {
        return rejection;
    }
    match state.handler.request_vote(request) {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            warn!(error = %e, "request vote handler failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn handle_append_entries<R: RaftRpc>(
    State(state): State<ServerState<R>>,
    Json(request): Json<AppendEntriesRequest>,
) -> Response {
    if let Err(rejection) = check_proof(
        &request.service_id,
        &request.proof_key_hash,
        &request.combined_proof,
    ) {
        return rejection;
    }
    match state.handler.append_entries(request) {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            warn!(error = %e, "append entries handler failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn handle_consensus<R: RaftRpc>(State(state): State<ServerState<R>>) -> Json<ProofSnapshot> {
    Json(state.oracle.snapshot())
}
