//! End-to-end round scenarios over a shared in-memory network.
//!
//! Each test wires one or more full nodes (consensus module, in-memory chain
//! and pool, round scheduler) to the same `InMemoryNetwork`.

use async_trait::async_trait;
use node_runtime::{build_in_memory_node, InMemoryNode, NodeConfig, NodeRuntime, RuntimeError};
use pow_consensus::adapters::{InMemoryChain, InMemoryTxPool};
use pow_consensus::{
    ChainEnv, ChainStorage, PowConfig, PowConsensus, PowError, StateExecutor, TxPool, MODULE_NAME,
};
use primitive_types::H256;
use shared_bus::{InMemoryNetwork, P2pNetwork, START_BLOCK_TOPIC};
use shared_types::{
    Block, CompactBlock, ModuleErrorKind, ModuleRegistry, PeerId, SignedTxn, TxnCall,
};
use std::sync::Arc;
use std::time::Duration;

fn config(peer: &str) -> NodeConfig {
    NodeConfig {
        pow: PowConfig {
            target_bits: 8,
            pack_limit: 5,
            grace_period_ms: 50,
            ..PowConfig::default()
        },
        round_interval_ms: 20,
        peer_id: Some(peer.to_string()),
    }
}

fn txn(caller: &str, nonce: u64) -> SignedTxn {
    SignedTxn {
        caller: caller.to_string(),
        call: TxnCall {
            module: "asset".into(),
            func: "transfer".into(),
            params: nonce.to_be_bytes().to_vec(),
        },
        nonce,
        ..SignedTxn::default()
    }
}

async fn started_node(peer: &str, network: &InMemoryNetwork) -> InMemoryNode {
    let net: Arc<dyn P2pNetwork> = Arc::new(network.clone());
    let node = build_in_memory_node(&config(peer), net).unwrap();
    node.runtime.start().await.unwrap();
    node
}

#[tokio::test]
async fn test_mines_locally_and_keeps_overflow_in_pool() {
    let network = InMemoryNetwork::new();
    let node = started_node("node-a", &network).await;

    // Advance to height 10 with empty blocks
    for _ in 0..10 {
        node.runtime.run_round().await.unwrap();
    }
    assert_eq!(node.chain.height(), Some(10));

    for i in 0..7 {
        node.runtime
            .submit_txn(MODULE_NAME, txn("alice", i))
            .await
            .unwrap();
    }

    let block = node.runtime.run_round().await.unwrap();

    assert_eq!(block.height(), 11);
    assert_eq!(block.txns_hashes.len(), 5);
    assert_eq!(block.header.peer_id.as_str(), "node-a");
    assert!(node.consensus.puzzle().validate(&block));
    assert_eq!(node.chain.height(), Some(11));
    assert!(node.chain.is_readable(&block.hash()));
    assert_eq!(node.pool.pending_len(), 2);

    let stats = node.consensus.metrics().snapshot();
    assert_eq!(stats.blocks_mined, 11);
    assert_eq!(stats.blocks_adopted, 0);
}

#[tokio::test]
async fn test_peer_block_adopted_instead_of_mining() {
    let network = InMemoryNetwork::new();
    let node_a = started_node("node-a", &network).await;
    let node_b = started_node("node-b", &network).await;

    // Both pools hold the same transactions
    for i in 0..3 {
        let t = txn("alice", i);
        node_a.runtime.submit_txn(MODULE_NAME, t.clone()).await.unwrap();
        node_b.runtime.submit_txn(MODULE_NAME, t).await.unwrap();
    }

    // B wins the race for height 1; A's grace window lets the announcement land
    let b_block = node_b.runtime.run_round().await.unwrap();
    let a_block = node_a.runtime.run_round().await.unwrap();

    assert_eq!(a_block, b_block);
    assert_eq!(a_block.header.peer_id.as_str(), "node-b");
    assert_eq!(node_a.chain.block_at(1), Some(b_block.clone()));
    assert_eq!(
        node_a.chain.txns_of(&b_block.hash()).map(|t| t.len()),
        Some(3)
    );
    assert_eq!(node_a.pool.pending_len(), 0);

    let stats = node_a.consensus.metrics().snapshot();
    assert_eq!(stats.blocks_mined, 0);
    assert_eq!(stats.blocks_adopted, 1);
}

#[tokio::test]
async fn test_own_echo_rejected() {
    let network = InMemoryNetwork::new();
    let node = started_node("node-a", &network).await;

    node.runtime.run_round().await.unwrap();
    node.runtime
        .submit_txn(MODULE_NAME, txn("alice", 1))
        .await
        .unwrap();

    let second = node.runtime.run_round().await.unwrap();

    assert_eq!(second.height(), 2);
    assert_eq!(second.header.peer_id.as_str(), "node-a");
    assert_eq!(second.txns_hashes.len(), 1);

    let stats = node.consensus.metrics().snapshot();
    assert_eq!(stats.echoes_rejected, 1);
    assert_eq!(stats.blocks_adopted, 0);
    assert_eq!(stats.blocks_mined, 2);
}

#[tokio::test]
async fn test_redelivered_block_is_stale() {
    let network = InMemoryNetwork::new();
    let node_a = started_node("node-a", &network).await;
    let node_b = started_node("node-b", &network).await;

    let shared = txn("alice", 1);
    node_a
        .runtime
        .submit_txn(MODULE_NAME, shared.clone())
        .await
        .unwrap();
    node_b.runtime.submit_txn(MODULE_NAME, shared).await.unwrap();

    let b_block = node_b.runtime.run_round().await.unwrap();
    node_a.runtime.run_round().await.unwrap();

    // The same announcement arrives a second time
    let txns = node_b.chain.txns_of(&b_block.hash()).unwrap();
    let raw = Block::new(b_block.clone(), txns).encode().unwrap();
    network.publish(START_BLOCK_TOPIC, raw).await.unwrap();

    let next = node_a.runtime.run_round().await.unwrap();

    assert_eq!(next.height(), 2);
    assert_eq!(next.header.peer_id.as_str(), "node-a");
    assert_eq!(node_a.chain.block_at(1), Some(b_block));
    assert!(node_a.consensus.metrics().snapshot().stale_rejected >= 1);
}

/// Every transaction hash committed on `node`'s chain above genesis
fn committed_hashes(node: &InMemoryNode) -> Vec<H256> {
    let tip = node.chain.height().unwrap();
    (1..=tip)
        .flat_map(|h| node.chain.block_at(h).unwrap().txns_hashes)
        .collect()
}

#[tokio::test]
async fn test_simultaneous_rounds_keep_pools_and_chains_consistent() {
    let network = InMemoryNetwork::new();
    let node_a = started_node("node-a", &network).await;
    let node_b = started_node("node-b", &network).await;

    // A private transaction each, so two locally mined blocks differ
    let shared = txn("carol", 1);
    let own_a = txn("alice", 1);
    let own_b = txn("bob", 1);
    for (node, own) in [(&node_a, &own_a), (&node_b, &own_b)] {
        node.runtime
            .submit_txn(MODULE_NAME, shared.clone())
            .await
            .unwrap();
        node.runtime.submit_txn(MODULE_NAME, own.clone()).await.unwrap();
    }

    // Both grace windows end together
    let (a1, b1) = tokio::join!(node_a.runtime.run_round(), node_b.runtime.run_round());
    let (a1, b1) = (a1.unwrap(), b1.unwrap());
    let forked = a1.hash() != b1.hash();

    // Next height: B announces first, A runs afterwards
    let next = txn("dave", 1);
    node_a.runtime.submit_txn(MODULE_NAME, next.clone()).await.unwrap();
    node_b.runtime.submit_txn(MODULE_NAME, next.clone()).await.unwrap();

    let b2 = node_b.runtime.run_round().await.unwrap();
    let a2 = node_a.runtime.run_round().await.unwrap();

    assert_eq!(a2.height(), 2);
    assert_eq!(b2.height(), 2);
    assert_eq!(a2.header.prev_hash, a1.hash());
    assert_eq!(b2.header.prev_hash, b1.hash());
    if forked {
        // B's block sits on B's branch; A mines its own instead
        assert_eq!(a2.header.peer_id.as_str(), "node-a");
        assert!(node_a.consensus.metrics().snapshot().stale_rejected >= 1);
        assert_eq!(node_a.pool.pending_len(), 0);
        assert_eq!(node_b.pool.pending_len(), 0);
    }

    // Whoever won each height, no node loses a transaction it accepted
    for (node, own) in [(&node_a, &own_a), (&node_b, &own_b)] {
        assert_eq!(node.chain.height(), Some(2));
        assert_eq!(node.pool.packed_len(), 0);

        let committed = committed_hashes(node);
        for t in [&shared, own, &next] {
            assert!(
                committed.contains(&t.hash()) || node.pool.contains(&t.hash()),
                "{} lost",
                t.caller
            );
        }
    }
}

struct CorruptChain;

#[async_trait]
impl ChainStorage for CorruptChain {
    async fn set_genesis(&self, _: &CompactBlock) -> pow_consensus::Result<()> {
        Ok(())
    }
    async fn get_end_block(&self) -> pow_consensus::Result<CompactBlock> {
        Err(PowError::Internal("block index corrupted".into()))
    }
    async fn append_block(&self, _: &CompactBlock) -> pow_consensus::Result<()> {
        Ok(())
    }
    async fn mark_in_progress(&self, _: H256) -> pow_consensus::Result<()> {
        Ok(())
    }
    async fn mark_readable(&self, _: H256) -> pow_consensus::Result<()> {
        Ok(())
    }
    async fn set_txns(&self, _: H256, _: &[SignedTxn]) -> pow_consensus::Result<()> {
        Ok(())
    }
    async fn discard_in_progress(&self, _: H256) -> pow_consensus::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_scheduler_stops_on_fatal_error() {
    let network = InMemoryNetwork::new();
    let node = started_node("node-a", &network).await;

    let mut registry = ModuleRegistry::new();
    registry.register(node.consensus.clone()).unwrap();
    let runtime = NodeRuntime::new(
        config("node-a"),
        PeerId::new("node-a"),
        registry,
        Arc::new(CorruptChain),
        node.pool.clone(),
    );

    tokio::time::timeout(Duration::from_secs(2), runtime.run())
        .await
        .expect("scheduler kept running after a fatal error");
}

struct FailingExecutor;

#[async_trait]
impl StateExecutor for FailingExecutor {
    async fn execute(&self, _block: &CompactBlock) -> pow_consensus::Result<()> {
        Err(PowError::Execution("state root mismatch".into()))
    }
}

#[tokio::test]
async fn test_commit_failure_leaves_pool_intact() {
    let network: Arc<dyn P2pNetwork> = Arc::new(InMemoryNetwork::new());
    let config = config("node-a");
    let chain = Arc::new(InMemoryChain::new());
    let pool = Arc::new(InMemoryTxPool::default());
    let env = ChainEnv {
        chain: chain.clone(),
        pool: pool.clone(),
        executor: Arc::new(FailingExecutor),
        network,
    };
    let consensus = Arc::new(
        PowConsensus::new(config.pow.clone(), PeerId::new("node-a"), env).unwrap(),
    );
    let mut registry = ModuleRegistry::new();
    registry.register(consensus).unwrap();
    let runtime = NodeRuntime::new(
        config,
        PeerId::new("node-a"),
        registry,
        chain.clone(),
        pool.clone(),
    );
    runtime.start().await.unwrap();

    for i in 0..3 {
        pool.insert(txn("alice", i)).await.unwrap();
    }

    let err = runtime.run_round().await.unwrap_err();
    match err {
        RuntimeError::Round { height, source } => {
            assert_eq!(height, 1);
            assert_eq!(source.kind, ModuleErrorKind::CommitFailed);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(chain.height(), Some(0));
    assert_eq!(pool.pending_len(), 3);
    assert_eq!(pool.packed_len(), 0);
    assert!(chain.get_end_block().await.unwrap().header.hash.is_zero());
}

#[tokio::test]
async fn test_unknown_module_rejects_txn() {
    let network = InMemoryNetwork::new();
    let node = started_node("node-a", &network).await;

    let err = node
        .runtime
        .submit_txn("poa", txn("alice", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Module(ref e) if e.kind == ModuleErrorKind::ModuleNotFound
    ));
    assert_eq!(node.pool.pending_len(), 0);
}

#[tokio::test]
async fn test_scheduler_runs_until_shutdown() {
    let network = InMemoryNetwork::new();
    let node = started_node("node-a", &network).await;
    let runtime = Arc::new(node.runtime);

    let scheduler = {
        let runtime = runtime.clone();
        tokio::spawn(async move { runtime.run().await })
    };

    tokio::time::sleep(Duration::from_millis(400)).await;
    runtime.shutdown();
    tokio::time::timeout(Duration::from_secs(5), scheduler)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    let height = node.chain.height().unwrap();
    assert!(height >= 1, "expected progress, tip at {height}");

    // Heights are contiguous and linked
    for h in 1..=height {
        let block = node.chain.block_at(h).unwrap();
        let parent = node.chain.block_at(h - 1).unwrap();
        assert_eq!(block.header.prev_hash, parent.hash());
    }
}
