//! # Node Wiring
//!
//! Assembles a node from in-memory collaborators and a shared transport.

use crate::config::NodeConfig;
use crate::runtime::{NodeRuntime, RuntimeError};
use pow_consensus::adapters::{InMemoryChain, InMemoryTxPool, NoopExecutor};
use pow_consensus::{ChainEnv, PowConsensus};
use shared_bus::P2pNetwork;
use shared_types::ModuleRegistry;
use std::sync::Arc;
use tracing::info;

/// A fully wired node plus handles to its collaborators.
pub struct InMemoryNode {
    /// Round scheduler.
    pub runtime: NodeRuntime,
    /// The registered consensus module.
    pub consensus: Arc<PowConsensus>,
    /// Chain history.
    pub chain: Arc<InMemoryChain>,
    /// Transaction pool.
    pub pool: Arc<InMemoryTxPool>,
}

/// Build a node whose consensus module talks over `network`.
pub fn build_in_memory_node(
    config: &NodeConfig,
    network: Arc<dyn P2pNetwork>,
) -> Result<InMemoryNode, RuntimeError> {
    config.validate()?;
    let peer_id = config.resolve_peer_id();

    let chain = Arc::new(InMemoryChain::new());
    let pool = Arc::new(InMemoryTxPool::default());
    let env = ChainEnv {
        chain: chain.clone(),
        pool: pool.clone(),
        executor: Arc::new(NoopExecutor),
        network,
    };

    let consensus = Arc::new(PowConsensus::new(
        config.pow.clone(),
        peer_id.clone(),
        env,
    )?);

    let mut registry = ModuleRegistry::new();
    registry.register(consensus.clone())?;

    info!("Node {} wired with in-memory storage and pool", peer_id);
    let runtime = NodeRuntime::new(
        config.clone(),
        peer_id,
        registry,
        chain.clone(),
        pool.clone(),
    );

    Ok(InMemoryNode {
        runtime,
        consensus,
        chain,
        pool,
    })
}
