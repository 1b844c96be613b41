//! Block lifecycle controller
//!
//! [`PowConsensus`] drives one height at a time: wait out the grace window,
//! adopt a peer block if one already won, otherwise pack, mine and broadcast;
//! then execute and append on commit.

use crate::config::{OverflowPolicy, PowConfig};
use crate::domain::{BlockSource, ProofOfWork, RoundPhase};
use crate::error::{PowError, Result};
use crate::metrics::Metrics;
use crate::ports::ChainEnv;
use crate::queue::{BlockQueue, PushOutcome};
use crate::resolver::RaceResolver;
use crate::utils::short_hex;
use async_trait::async_trait;
use parking_lot::Mutex;
use primitive_types::H256;
use shared_bus::{TopicReceiver, START_BLOCK_TOPIC};
use shared_types::{
    make_txn_root, txn_hashes, Block, CompactBlock, ConsensusModule, ModuleError,
    ModuleErrorKind, PeerId, SignedTxn,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Registry name of this module
pub const MODULE_NAME: &str = "pow";

/// Proof-of-work consensus module
pub struct PowConsensus {
    config: PowConfig,
    local_peer: PeerId,
    pow: ProofOfWork,
    env: ChainEnv,
    queue: Arc<BlockQueue>,
    resolver: RaceResolver,
    metrics: Arc<Metrics>,
    phase: Mutex<RoundPhase>,
    round_active: AtomicBool,
    /// Body of the adopted block awaiting commit
    adopted_txns: Mutex<Vec<SignedTxn>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the in-round flag on every exit path
struct RoundGuard<'a>(&'a AtomicBool);

impl<'a> RoundGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PowConsensus {
    /// Create the module for `local_peer`
    pub fn new(config: PowConfig, local_peer: PeerId, env: ChainEnv) -> Result<Self> {
        config.validate()?;
        let pow = ProofOfWork::new(config.target_bits)?;
        let metrics = Arc::new(Metrics::new());
        let queue = Arc::new(BlockQueue::new(
            config.queue_capacity,
            config.overflow_policy,
        ));
        let resolver = RaceResolver::new(
            local_peer.clone(),
            pow,
            env.chain.clone(),
            env.pool.clone(),
            metrics.clone(),
        );

        info!("[pow] Initializing proof-of-work consensus");
        info!("  Peer: {}", local_peer);
        info!("  Target bits: {}", config.target_bits);
        info!("  Pack limit: {}", config.pack_limit);
        info!("  Grace period: {}ms", config.grace_period_ms);
        info!(
            "  Queue: {} ({:?})",
            config.queue_capacity, config.overflow_policy
        );

        Ok(Self {
            config,
            local_peer,
            pow,
            env,
            queue,
            resolver,
            metrics,
            phase: Mutex::new(RoundPhase::Uninitialized),
            round_active: AtomicBool::new(false),
            adopted_txns: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
        })
    }

    /// Local peer identity
    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    /// Puzzle parameters
    pub fn puzzle(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> RoundPhase {
        *self.phase.lock()
    }

    /// Announcements waiting for the next round
    pub fn queued_announcements(&self) -> usize {
        self.queue.len()
    }

    /// Stop the network listener
    pub fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
            info!("[pow] Block listener stopped");
        }
    }

    /// Install genesis and start the network listener.
    #[instrument(skip(self), fields(peer = %self.local_peer))]
    pub async fn init(&self) -> Result<()> {
        {
            let mut phase = self.phase.lock();
            if phase.is_initialized() {
                return Err(PowError::AlreadyInitialized);
            }
            // Claimed before any await so a concurrent init sees it
            *phase = RoundPhase::Initialized;
        }

        let genesis = CompactBlock::genesis(self.config.chain_id);
        if let Err(e) = self.env.chain.set_genesis(&genesis).await {
            error!("[pow] Failed to install genesis: {}", e);
            *self.phase.lock() = RoundPhase::Uninitialized;
            return Err(e);
        }

        let rx = self.env.network.subscribe(START_BLOCK_TOPIC);
        let handle = tokio::spawn(listen(
            rx,
            self.queue.clone(),
            self.metrics.clone(),
            self.config.overflow_policy,
        ));
        *self.listener.lock() = Some(handle);

        info!(
            capacity = self.queue.capacity(),
            "[pow] Chain initialized, listening on '{}'", START_BLOCK_TOPIC
        );
        Ok(())
    }

    /// Fill `block` for its height by adoption or by mining.
    ///
    /// On error `block` is restored and packed transactions are returned to
    /// the pool.
    #[instrument(skip(self, block), fields(height = block.height()))]
    pub async fn produce(&self, block: &mut CompactBlock) -> Result<BlockSource> {
        self.ensure_initialized()?;
        let height = block.height();
        let _guard =
            RoundGuard::acquire(&self.round_active).ok_or(PowError::RoundInProgress { height })?;

        self.metrics.record_round_started();
        self.adopted_txns.lock().clear();
        tokio::time::sleep(self.config.grace_period()).await;

        let mut outcome = self.resolver.resolve(&self.queue, block).await;
        if outcome.is_adopted() {
            *self.adopted_txns.lock() = std::mem::take(&mut outcome.txns);
            *self.phase.lock() = RoundPhase::Producing { height };
            return Ok(BlockSource::Adopted);
        }

        let original = block.clone();
        match self.mine_and_publish(block).await {
            Ok(()) => {
                *self.phase.lock() = RoundPhase::Producing { height };
                Ok(BlockSource::Mined)
            }
            Err(e) => {
                if block.hash() != original.hash() {
                    self.discard_sealed(height, block.hash()).await;
                }
                *block = original;
                self.return_txns(height).await;
                Err(e)
            }
        }
    }

    async fn mine_and_publish(&self, block: &mut CompactBlock) -> Result<()> {
        let height = block.height();
        let txns = self.env.pool.pack(self.config.pack_limit).await?;
        let hashes = txn_hashes(&txns);

        block.header.txn_root = Some(make_txn_root(&hashes));
        block.txns_hashes = hashes;
        block.header.peer_id = self.local_peer.clone();
        block.header.difficulty = u64::from(self.pow.target_bits());

        debug!(height, txns = txns.len(), "[pow] Mining block");
        let started = Instant::now();
        let pow = self.pow;
        let candidate = block.clone();
        let (nonce, hash) = tokio::task::spawn_blocking(move || pow.run(&candidate))
            .await
            .map_err(|e| PowError::Internal(format!("mining task failed: {}", e)))??;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.record_block_mined(elapsed_ms);

        block.header.nonce = nonce;
        block.header.hash = hash;

        self.env.chain.mark_in_progress(hash).await?;
        self.env.chain.set_txns(hash, &txns).await?;

        let txn_count = txns.len();
        let payload = Block::new(block.clone(), txns).encode()?;
        let receivers = self
            .env
            .network
            .publish(START_BLOCK_TOPIC, payload)
            .await?;

        info!(
            height,
            hash = %short_hex(&hash),
            nonce,
            txns = txn_count,
            elapsed_ms,
            receivers,
            "[pow] Mined and broadcast block"
        );
        Ok(())
    }

    /// Execute, append, mark readable, then reset the pool.
    ///
    /// The pool is reset last and only when every earlier step succeeded.
    /// On failure packed transactions, or the body of an adopted block, go
    /// back to pending for the retry.
    #[instrument(skip(self, block), fields(height = block.height()))]
    pub async fn commit(&self, block: &CompactBlock) -> Result<()> {
        self.ensure_initialized()?;
        let height = block.height();
        if !block.is_produced() {
            return Err(PowError::BlockNotProduced { height });
        }

        if let Err(e) = self.apply(block).await {
            error!(height, error = %e, "[pow] Commit failed");
            self.return_txns(height).await;
            return Err(e);
        }
        self.adopted_txns.lock().clear();

        // The block is already part of the chain
        if let Err(e) = self.env.pool.reset().await {
            warn!(height, error = %e, "[pow] Pool reset failed after commit");
        }

        *self.phase.lock() = RoundPhase::Committed { height };
        self.metrics.record_block_committed();
        info!(
            height,
            hash = %short_hex(&block.hash()),
            peer = %block.header.peer_id,
            "[pow] Block committed"
        );
        Ok(())
    }

    async fn apply(&self, block: &CompactBlock) -> Result<()> {
        self.env.executor.execute(block).await?;
        self.env.chain.append_block(block).await?;
        self.env.chain.mark_readable(block.hash()).await
    }

    async fn return_txns(&self, height: u64) {
        if let Err(e) = self.env.pool.rollback_packed().await {
            warn!(
                height,
                error = %e,
                "[pow] Failed to return packed transactions to the pool"
            );
        }

        let adopted = std::mem::take(&mut *self.adopted_txns.lock());
        if adopted.is_empty() {
            return;
        }
        let count = adopted.len();
        match self.env.pool.restore(adopted).await {
            Ok(()) => info!(height, count, "[pow] Returned adopted transactions to the pool"),
            Err(e) => warn!(
                height,
                error = %e,
                "[pow] Failed to return adopted transactions to the pool"
            ),
        }
    }

    /// Undo the in-progress mark and stored body of a block that was
    /// mined but never broadcast.
    async fn discard_sealed(&self, height: u64, hash: H256) {
        if let Err(e) = self.env.chain.discard_in_progress(hash).await {
            warn!(
                height,
                hash = %short_hex(&hash),
                error = %e,
                "[pow] Failed to discard unpublished block"
            );
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.phase.lock().is_initialized() {
            Ok(())
        } else {
            Err(PowError::NotInitialized)
        }
    }
}

impl Drop for PowConsensus {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

/// Forward every announcement from the network into the queue
async fn listen(
    mut rx: Box<dyn TopicReceiver>,
    queue: Arc<BlockQueue>,
    metrics: Arc<Metrics>,
    policy: OverflowPolicy,
) {
    debug!(?policy, "[pow] Block listener started");
    loop {
        match rx.recv().await {
            Ok(payload) => {
                if queue.push(payload).await == PushOutcome::DroppedOldest {
                    metrics.record_queue_drop();
                }
            }
            Err(e) => {
                warn!(error = %e, "[pow] Block listener exiting");
                break;
            }
        }
    }
}

#[async_trait]
impl ConsensusModule for PowConsensus {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn init_chain(&self) -> std::result::Result<(), ModuleError> {
        self.init()
            .await
            .map_err(|e| e.into_module_error(MODULE_NAME, ModuleErrorKind::InitializationFailed))
    }

    async fn start_block(&self, block: &mut CompactBlock) -> std::result::Result<(), ModuleError> {
        self.produce(block)
            .await
            .map(|_| ())
            .map_err(|e| e.into_module_error(MODULE_NAME, ModuleErrorKind::RoundAborted))
    }

    async fn end_block(&self, block: &CompactBlock) -> std::result::Result<(), ModuleError> {
        self.commit(block)
            .await
            .map_err(|e| e.into_module_error(MODULE_NAME, ModuleErrorKind::CommitFailed))
    }

    async fn finalize_block(&self, block: &CompactBlock) -> std::result::Result<(), ModuleError> {
        debug!(height = block.height(), "[pow] Finalize (no-op)");
        Ok(())
    }

    fn check_txn(&self, _txn: &SignedTxn) -> std::result::Result<(), ModuleError> {
        Ok(())
    }

    fn verify_block(&self, block: &CompactBlock) -> bool {
        self.pow.validate(block)
    }
}
