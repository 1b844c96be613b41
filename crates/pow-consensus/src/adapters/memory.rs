//! In-memory adapters for the outbound ports
//!
//! Back a single-process node and the test suite. Everything lives behind a
//! `parking_lot` lock; no guard is held across an await.

use crate::error::{PowError, Result};
use crate::ports::{ChainStorage, StateExecutor, TxPool};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use primitive_types::H256;
use shared_types::{CompactBlock, SignedTxn};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

// ============================================================================
// CHAIN STORAGE
// ============================================================================

#[derive(Default)]
struct ChainState {
    history: Vec<CompactBlock>,
    by_hash: HashMap<H256, usize>,
    bodies: HashMap<H256, Vec<SignedTxn>>,
    in_progress: Option<H256>,
    readable: HashSet<H256>,
}

/// Linear chain history kept in memory
#[derive(Default)]
pub struct InMemoryChain {
    state: RwLock<ChainState>,
}

impl InMemoryChain {
    /// Create an empty chain (no genesis)
    pub fn new() -> Self {
        Self::default()
    }

    /// Height of the tip, if genesis is installed
    pub fn height(&self) -> Option<u64> {
        self.state.read().history.last().map(CompactBlock::height)
    }

    /// Block at `height`
    pub fn block_at(&self, height: u64) -> Option<CompactBlock> {
        let state = self.state.read();
        usize::try_from(height)
            .ok()
            .and_then(|idx| state.history.get(idx))
            .cloned()
    }

    /// Appended block with `hash`
    pub fn block_by_hash(&self, hash: &H256) -> Option<CompactBlock> {
        let state = self.state.read();
        state
            .by_hash
            .get(hash)
            .and_then(|&idx| state.history.get(idx))
            .cloned()
    }

    /// Persisted transactions for block `hash`
    pub fn txns_of(&self, hash: &H256) -> Option<Vec<SignedTxn>> {
        self.state.read().bodies.get(hash).cloned()
    }

    /// Hash currently marked in progress
    pub fn in_progress(&self) -> Option<H256> {
        self.state.read().in_progress
    }

    /// Whether block `hash` was marked readable
    pub fn is_readable(&self, hash: &H256) -> bool {
        self.state.read().readable.contains(hash)
    }
}

#[async_trait]
impl ChainStorage for InMemoryChain {
    async fn set_genesis(&self, genesis: &CompactBlock) -> Result<()> {
        let mut state = self.state.write();
        if !state.history.is_empty() {
            return Ok(());
        }
        state.by_hash.insert(genesis.hash(), 0);
        state.readable.insert(genesis.hash());
        state.history.push(genesis.clone());
        debug!("[pow] Genesis installed");
        Ok(())
    }

    async fn get_end_block(&self) -> Result<CompactBlock> {
        self.state
            .read()
            .history
            .last()
            .cloned()
            .ok_or_else(|| PowError::Storage("chain has no genesis".into()))
    }

    async fn append_block(&self, block: &CompactBlock) -> Result<()> {
        let mut state = self.state.write();
        let tip = state
            .history
            .last()
            .ok_or_else(|| PowError::Storage("chain has no genesis".into()))?;

        if block.height() != tip.height() + 1 || block.header.prev_hash != tip.hash() {
            return Err(PowError::Storage(format!(
                "block at height {} does not extend tip at height {}",
                block.height(),
                tip.height()
            )));
        }

        let idx = state.history.len();
        state.by_hash.insert(block.hash(), idx);
        state.history.push(block.clone());
        Ok(())
    }

    async fn mark_in_progress(&self, hash: H256) -> Result<()> {
        self.state.write().in_progress = Some(hash);
        Ok(())
    }

    async fn mark_readable(&self, hash: H256) -> Result<()> {
        let mut state = self.state.write();
        if !state.by_hash.contains_key(&hash) {
            return Err(PowError::Storage(format!(
                "cannot mark unknown block {:?} readable",
                hash
            )));
        }
        if state.in_progress == Some(hash) {
            state.in_progress = None;
        }
        state.readable.insert(hash);
        Ok(())
    }

    async fn set_txns(&self, hash: H256, txns: &[SignedTxn]) -> Result<()> {
        self.state.write().bodies.insert(hash, txns.to_vec());
        Ok(())
    }

    async fn discard_in_progress(&self, hash: H256) -> Result<()> {
        let mut state = self.state.write();
        if state.by_hash.contains_key(&hash) {
            return Ok(());
        }
        if state.in_progress == Some(hash) {
            state.in_progress = None;
        }
        state.bodies.remove(&hash);
        debug!(hash = ?hash, "[pow] Discarded uncommitted block");
        Ok(())
    }
}

// ============================================================================
// TRANSACTION POOL
// ============================================================================

#[derive(Default)]
struct PoolState {
    pending: VecDeque<SignedTxn>,
    packed: Vec<SignedTxn>,
    known: HashSet<H256>,
}

/// FIFO transaction pool
///
/// Packing takes the oldest pending transactions.
pub struct InMemoryTxPool {
    state: Mutex<PoolState>,
    max_size: usize,
}

impl InMemoryTxPool {
    /// Create a pool holding at most `max_size` transactions
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            max_size,
        }
    }

    /// Number of pending transactions
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of transactions packed into the current round
    pub fn packed_len(&self) -> usize {
        self.state.lock().packed.len()
    }

    /// Whether a transaction with `hash` is pending or packed
    pub fn contains(&self, hash: &H256) -> bool {
        self.state.lock().known.contains(hash)
    }
}

impl Default for InMemoryTxPool {
    fn default() -> Self {
        Self::new(crate::DEFAULT_POOL_SIZE)
    }
}

#[async_trait]
impl TxPool for InMemoryTxPool {
    async fn insert(&self, txn: SignedTxn) -> Result<()> {
        let hash = txn.hash();
        let mut state = self.state.lock();
        if state.known.contains(&hash) {
            return Err(PowError::Pool(format!("duplicate transaction {:?}", hash)));
        }
        if state.known.len() >= self.max_size {
            return Err(PowError::Pool(format!("pool full ({} txns)", self.max_size)));
        }
        state.known.insert(hash);
        state.pending.push_back(txn);
        Ok(())
    }

    async fn pack(&self, limit: u64) -> Result<Vec<SignedTxn>> {
        let mut state = self.state.lock();
        let take = usize::try_from(limit)
            .unwrap_or(usize::MAX)
            .min(state.pending.len());
        let batch: Vec<SignedTxn> = state.pending.drain(..take).collect();
        state.packed.extend(batch.iter().cloned());
        Ok(batch)
    }

    async fn remove_txns(&self, hashes: &[H256]) -> Result<()> {
        let doomed: HashSet<H256> = hashes.iter().copied().collect();
        let mut state = self.state.lock();
        state.pending.retain(|t| !doomed.contains(&t.hash()));
        state.packed.retain(|t| !doomed.contains(&t.hash()));
        for hash in &doomed {
            state.known.remove(hash);
        }
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.lock();
        let committed = std::mem::take(&mut state.packed);
        for txn in &committed {
            state.known.remove(&txn.hash());
        }
        Ok(())
    }

    async fn rollback_packed(&self) -> Result<()> {
        let mut state = self.state.lock();
        let packed = std::mem::take(&mut state.packed);
        for txn in packed.into_iter().rev() {
            state.pending.push_front(txn);
        }
        Ok(())
    }

    async fn restore(&self, txns: Vec<SignedTxn>) -> Result<()> {
        let mut state = self.state.lock();
        // Re-submitted meanwhile: keep the pending copy
        for txn in txns.into_iter().rev() {
            if state.known.insert(txn.hash()) {
                state.pending.push_front(txn);
            }
        }
        Ok(())
    }
}

// ============================================================================
// STATE EXECUTOR
// ============================================================================

/// Executor that accepts every block without touching state
#[derive(Debug, Default)]
pub struct NoopExecutor;

#[async_trait]
impl StateExecutor for NoopExecutor {
    async fn execute(&self, block: &CompactBlock) -> Result<()> {
        debug!(
            height = block.height(),
            txns = block.txns_hashes.len(),
            "[pow] Executing block (noop)"
        );
        Ok(())
    }
}
