//! # Round Scheduler
//!
//! Triggers one round per tick. A round builds the next candidate from the
//! chain tip, then runs `start_block`, `end_block` and `finalize_block` on
//! every registered module in registration order. A failed round is logged
//! and the next tick tries the same height again.

use crate::config::NodeConfig;
use pow_consensus::{ChainStorage, PowError, TxPool};
use shared_types::{CompactBlock, ModuleError, ModuleRegistry, PeerId, SignedTxn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A collaborator or the consensus module failed outside a round.
    #[error("Consensus error: {0}")]
    Consensus(#[from] PowError),

    /// A module operation failed outside a round.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// A round aborted.
    #[error("Round at height {height} failed: {source}")]
    Round {
        /// Height of the aborted round.
        height: u64,
        /// Module failure.
        #[source]
        source: ModuleError,
    },

    /// Nothing to drive.
    #[error("No consensus module registered")]
    NoModules,
}

/// Drives the registered consensus modules.
pub struct NodeRuntime {
    config: NodeConfig,
    peer_id: PeerId,
    registry: ModuleRegistry,
    chain: Arc<dyn ChainStorage>,
    pool: Arc<dyn TxPool>,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeRuntime {
    /// Create a runtime over an already populated registry.
    pub fn new(
        config: NodeConfig,
        peer_id: PeerId,
        registry: ModuleRegistry,
        chain: Arc<dyn ChainStorage>,
        pool: Arc<dyn TxPool>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            peer_id,
            registry,
            chain,
            pool,
            shutdown_tx,
        }
    }

    /// Local peer id.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Registered modules.
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Initialize every module's chain state.
    pub async fn start(&self) -> Result<(), RuntimeError> {
        if self.registry.is_empty() {
            return Err(RuntimeError::NoModules);
        }

        info!("===========================================");
        info!("  PoW-Chain Node Starting");
        info!("  Peer: {}", self.peer_id);
        info!("  Modules: {:?}", self.registry.names());
        info!("  Round interval: {}ms", self.config.round_interval_ms);
        info!("===========================================");

        self.registry.init_chain_all().await?;
        Ok(())
    }

    /// Admit a transaction after the named module accepts it.
    pub async fn submit_txn(&self, module: &str, txn: SignedTxn) -> Result<(), RuntimeError> {
        self.registry.check_txn(module, &txn)?;
        self.pool.insert(txn).await?;
        Ok(())
    }

    /// Produce and commit the next block.
    pub async fn run_round(&self) -> Result<CompactBlock, RuntimeError> {
        if self.registry.is_empty() {
            return Err(RuntimeError::NoModules);
        }

        let tip = self.chain.get_end_block().await?;
        let mut block = CompactBlock::child_of(&tip.header, self.config.pow.chain_id, now_millis());
        let height = block.height();
        let aborted = move |source: ModuleError| RuntimeError::Round { height, source };

        for module in self.registry.iter() {
            module.start_block(&mut block).await.map_err(aborted)?;
        }
        for module in self.registry.iter() {
            module.end_block(&block).await.map_err(aborted)?;
        }
        for module in self.registry.iter() {
            module.finalize_block(&block).await.map_err(aborted)?;
        }

        Ok(block)
    }

    /// Run rounds until [`NodeRuntime::shutdown`] is called or a collaborator
    /// reports a fatal error.
    ///
    /// Ticks missed while a round runs are skipped, so rounds never overlap.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut ticker = tokio::time::interval(self.config.round_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Round scheduler started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => match self.run_round().await {
                    Ok(block) => info!(
                        height = block.height(),
                        peer = %block.header.peer_id,
                        txns = block.txns_hashes.len(),
                        "Round complete"
                    ),
                    Err(RuntimeError::Consensus(e)) if e.is_fatal() => {
                        error!("Fatal consensus error, stopping rounds: {}", e);
                        break;
                    }
                    Err(RuntimeError::Round { height, source }) => error!(
                        height,
                        module = %source.module,
                        kind = %source.kind,
                        "Round aborted: {}", source.message
                    ),
                    Err(e) => error!("Round failed: {}", e),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown channel closed");
                    }
                    break;
                }
            }
        }
        info!("Round scheduler stopped");
    }

    /// Ask [`NodeRuntime::run`] to stop after the current round.
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
