//! The ConcordKV topology node binary: wires C1 through C4 together behind
//! an admin REST surface.
//!
//! Grounded overall on `ledger-core`'s server binary shape (tracing init →
//! config → construct → `tokio::signal::ctrl_c` shutdown) combined with
//! `gateway-rust::main`'s axum `Router`/`AppState` wiring.

mod config;
mod error;
mod http;
mod probe;
mod state;

use std::sync::Arc;

use clap::Parser;
use topology_store::{MutationOp, StandaloneConsensus};
use topology_types::{KeyRange, NodeDescriptor, NodeId, ShardId, Topology};

use crate::config::Config;
use crate::probe::TcpProbe;
use crate::state::AppState;

/// ConcordKV topology node: shard-aware routing and topology distribution
/// for a distributed key-value store.
#[derive(Debug, Parser)]
#[command(name = "concordkv-node", version)]
struct Args {
    /// Path to a TOML config file. Missing keys fall back to defaults.
    #[arg(long, env = "CONCORDKV_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Bootstrap a fresh single-node cluster instead of joining an existing
    /// one. This node becomes the sole shard primary for every shard.
    #[arg(long)]
    bootstrap: bool,

    /// Addresses of existing peers to join. Real multi-node `openraft`
    /// transport is out of this crate's scope (the spec treats the Raft
    /// log's peer-to-peer wiring as a black box); passing peers without
    /// `--bootstrap` currently logs a warning and still runs standalone.
    #[arg(long, value_delimiter = ',')]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if !args.peers.is_empty() && !args.bootstrap {
        tracing::warn!(
            peers = ?args.peers,
            "real multi-node raft transport is not wired in this binary; running standalone"
        );
    }

    tracing::info!(node_id = %config.node.id, address = %config.node.address, "starting concordkv-node");

    let consensus = Arc::new(StandaloneConsensus::new());
    let store_metrics = Arc::new(topology_store::Metrics::new()?);
    let handle = topology_store::spawn(Topology::empty(), config.node.shard_count, consensus, 256, store_metrics.clone());

    if args.bootstrap {
        bootstrap(&handle, &config).await?;
    }

    let service_metrics = Arc::new(topology_service::Metrics::new()?);
    let service = Arc::new(topology_service::TopologyService::new(
        handle.clone(),
        config.service.clone(),
        service_metrics.clone(),
    ));

    let health_monitor = topology_service::HealthMonitor::new(
        handle.clone(),
        Arc::new(TcpProbe),
        config.service.health,
        service_metrics.clone(),
    );
    tokio::spawn(health_monitor.run());

    let notifier_metrics = Arc::new(change_notifier::Metrics::new()?);
    let notifier = change_notifier::ChangeNotifier::new(handle.clone(), config.notifier.clone(), notifier_metrics.clone());

    let state = AppState {
        topology: handle,
        service,
        notifier,
        store_metrics,
        service_metrics,
        notifier_metrics,
    };

    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(&config.node.admin_bind).await?;
    tracing::info!(bind = %config.node.admin_bind, "admin surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Register this node and create every shard, all owned by this node, so a
/// single-process cluster is immediately usable.
async fn bootstrap(handle: &topology_store::TopologyHandle, config: &Config) -> anyhow::Result<()> {
    let node_id = NodeId::new(config.node.id.clone());
    handle
        .propose(MutationOp::RegisterNode {
            descriptor: NodeDescriptor::new(node_id.clone(), config.node.address.clone()),
        })
        .await?;

    for (i, range) in KeyRange::bootstrap_ranges(config.node.shard_count).into_iter().enumerate() {
        handle
            .propose(MutationOp::CreateShard {
                id: ShardId::new(i as u16),
                key_range: range,
                replicas: vec![node_id.clone()],
            })
            .await?;
    }

    tracing::info!(shard_count = config.node.shard_count, "bootstrapped single-node cluster");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
