//! Node assembly: wiring the store, oracle, engine and RPC surface.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use cirrus_consensus::{LicenseIssuer, RaftEngine};
use cirrus_identity::ProofOracle;
use cirrus_storage::{LogStore, LogStoreConfig};
use cirrus_transport::{HttpPeerClient, RpcServer, RpcServerConfig};

use crate::config::Config;

/// License issuance stub wired into the node binary.
///
/// Minting the actual artifact is the license service's job; the node only
/// records that the onboarding commit requested it.
pub struct LogLicenseIssuer;

#[async_trait]
impl LicenseIssuer for LogLicenseIssuer {
    async fn issue_license(&self, issuer: &str, license_ref: &str) -> std::result::Result<(), String> {
        info!(issuer = %issuer, license_ref = %license_ref, "license issuance requested");
        Ok(())
    }
}

type NodeEngine = RaftEngine<HttpPeerClient, LogLicenseIssuer>;

/// A fully wired Cirrus node.
pub struct Node {
    config: Config,
    store: Arc<LogStore>,
    oracle: Arc<ProofOracle>,
    engine: Arc<NodeEngine>,
    handles: Vec<JoinHandle<()>>,
}

impl Node {
    /// Build a node from a validated configuration. Opens the store,
    /// computes the initial service identity, and wires the engine.
    pub async fn new(config: Config) -> Result<Self> {
        info!(node_id = %config.node.node_id, "initializing cirrus node");

        let store = Arc::new(
            LogStore::open(LogStoreConfig {
                path: config.storage.path.clone(),
                sync_writes: config.storage.sync_writes,
            })
            .context("failed to open log store")?,
        );

        let oracle = Arc::new(
            ProofOracle::new(&config.node.base_dir)
                .context("failed to compute service identity")?,
        );

        let timing = config.consensus.timing();
        let client = Arc::new(
            HttpPeerClient::new(Arc::clone(&oracle), &timing)
                .context("failed to build peer client")?,
        );

        let topology = config.interconnect.topology()?;
        let engine = RaftEngine::new(
            config.node.node_id.clone(),
            config.node.peers.clone(),
            timing,
            topology,
            Arc::clone(&store),
            client,
            Arc::new(LogLicenseIssuer),
        )?;

        if let Some(coord) = &config.interconnect.coordinate {
            engine.set_coordinate(config.node.node_id.clone(), coord.clone());
        }

        Ok(Self {
            config,
            store,
            oracle,
            engine,
            handles: Vec::new(),
        })
    }

    /// The consensus engine handle (for tests and embedding).
    pub fn engine(&self) -> &Arc<NodeEngine> {
        &self.engine
    }

    /// Run the node until Ctrl-C or an internal fatal error stops it.
    pub async fn run(&mut self) -> Result<()> {
        // Consensus loops.
        self.handles.extend(self.engine.start());

        // RPC surface, sharing the engine's stop signal.
        let server = RpcServer::bind(
            RpcServerConfig {
                listen_addr: self.config.node.listen_addr(),
            },
            Arc::clone(&self.engine),
            Arc::clone(&self.oracle),
        )
        .await
        .context("failed to bind rpc listener")?;
        let server_shutdown = self.engine.subscribe_shutdown();
        self.handles.push(tokio::spawn(async move {
            if let Err(e) = server.run(server_shutdown).await {
                warn!(error = %e, "rpc server exited with error");
            }
        }));

        // Periodic status line.
        let status_engine = Arc::clone(&self.engine);
        let mut status_shutdown = self.engine.subscribe_shutdown();
        self.handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            loop {
                tokio::select! {
                    _ = ticker.tick() => info!("{}", status_engine.status()),
                    _ = status_shutdown.recv() => break,
                }
            }
        }));

        info!(
            node_id = %self.config.node.node_id,
            listen = %self.config.node.listen_addr,
            peers = self.config.node.peers.len(),
            "node is running"
        );

        // Block until Ctrl-C or an internal stop (fatal persistence error).
        let mut shutdown = self.engine.subscribe_shutdown();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
            }
            _ = shutdown.recv() => {
                info!("stop signal received, shutting down");
            }
        }

        self.shutdown().await
    }

    /// Drain every loop, then flush and close the store.
    async fn shutdown(&mut self) -> Result<()> {
        self.engine.stop();

        let timeout = Duration::from_secs(10);
        for handle in self.handles.drain(..) {
            if tokio::time::timeout(timeout, handle).await.is_err() {
                warn!("component did not stop within {timeout:?}");
            }
        }

        self.store.flush().context("final store flush failed")?;
        info!("node shutdown complete");
        Ok(())
    }
}
