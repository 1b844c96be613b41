//! Outbound ports (driven side - SPI)
//!
//! The collaborators a round talks to. Each is owned elsewhere in the node;
//! this module only consumes them.

use crate::error::Result;
use async_trait::async_trait;
use primitive_types::H256;
use shared_bus::P2pNetwork;
use shared_types::{CompactBlock, SignedTxn};
use std::sync::Arc;

/// Port: chain history and per-block bodies
#[async_trait]
pub trait ChainStorage: Send + Sync {
    /// Install the genesis block; no-op when one exists.
    async fn set_genesis(&self, genesis: &CompactBlock) -> Result<()>;

    /// The last appended block.
    async fn get_end_block(&self) -> Result<CompactBlock>;

    /// Append a committed block to history.
    async fn append_block(&self, block: &CompactBlock) -> Result<()>;

    /// Mark `hash` as the block currently being produced.
    async fn mark_in_progress(&self, hash: H256) -> Result<()>;

    /// Mark an appended block readable by queries.
    async fn mark_readable(&self, hash: H256) -> Result<()>;

    /// Persist the transactions committed by block `hash`.
    async fn set_txns(&self, hash: H256, txns: &[SignedTxn]) -> Result<()>;

    /// Forget a block that was marked in progress but never appended: clear
    /// the mark if it still points at `hash` and drop its stored body.
    async fn discard_in_progress(&self, hash: H256) -> Result<()>;
}

/// Port: pending transactions
///
/// A transaction is pending, packed into the current round, or gone.
#[async_trait]
pub trait TxPool: Send + Sync {
    /// Admit a transaction as pending.
    async fn insert(&self, txn: SignedTxn) -> Result<()>;

    /// Move up to `limit` pending transactions into the current round.
    async fn pack(&self, limit: u64) -> Result<Vec<SignedTxn>>;

    /// Drop transactions by hash; unknown hashes are ignored.
    async fn remove_txns(&self, hashes: &[H256]) -> Result<()>;

    /// Forget everything packed into the committed round.
    async fn reset(&self) -> Result<()>;

    /// Return packed transactions to pending after an aborted round.
    async fn rollback_packed(&self) -> Result<()> {
        Ok(())
    }

    /// Put back transactions removed for an adopted block whose commit
    /// failed. They go ahead of everything pending, in the given order.
    async fn restore(&self, txns: Vec<SignedTxn>) -> Result<()>;
}

/// Port: state transition
#[async_trait]
pub trait StateExecutor: Send + Sync {
    /// Apply the block's transactions to state.
    async fn execute(&self, block: &CompactBlock) -> Result<()>;
}

/// Every collaborator the module needs, passed once at construction.
#[derive(Clone)]
pub struct ChainEnv {
    /// Chain history
    pub chain: Arc<dyn ChainStorage>,
    /// Transaction pool
    pub pool: Arc<dyn TxPool>,
    /// State executor
    pub executor: Arc<dyn StateExecutor>,
    /// P2P transport
    pub network: Arc<dyn P2pNetwork>,
}
