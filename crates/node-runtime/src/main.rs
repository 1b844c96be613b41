//! # PoW-Chain Node
//!
//! Runs a single proof-of-work node over the in-process transport. Rounds
//! fire every `POW_ROUND_INTERVAL_MS`; Ctrl+C stops after the current round.

use std::sync::Arc;

use anyhow::{Context, Result};
use node_runtime::telemetry::init_logging;
use node_runtime::{build_in_memory_node, NodeConfig};
use shared_bus::{InMemoryNetwork, P2pNetwork};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = NodeConfig::from_env().context("failed to load configuration")?;
    let network: Arc<dyn P2pNetwork> = Arc::new(InMemoryNetwork::new());
    let node = build_in_memory_node(&config, network).context("failed to wire node")?;

    node.runtime
        .start()
        .await
        .context("failed to initialize chain")?;

    let runtime = Arc::new(node.runtime);
    let scheduler = {
        let runtime = runtime.clone();
        tokio::spawn(async move { runtime.run().await })
    };

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown();
    scheduler.await?;
    node.consensus.shutdown();

    let stats = node.consensus.metrics().snapshot();
    info!(
        committed = stats.blocks_committed,
        mined = stats.blocks_mined,
        adopted = stats.blocks_adopted,
        "Node stopped"
    );
    Ok(())
}
