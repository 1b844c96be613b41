//! Peer block race resolution
//!
//! Before mining, a round scans the announcements that arrived since the
//! last round. The first valid block for the current height from another
//! peer wins and replaces the local candidate; mining is then skipped.

use crate::domain::{ProofOfWork, RaceOutcome, Verdict};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::ports::{ChainStorage, TxPool};
use crate::queue::BlockQueue;
use crate::utils::short_hex;
use shared_types::{Block, CompactBlock, PeerId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decides whether a peer already produced the current height
pub struct RaceResolver {
    local_peer: PeerId,
    pow: ProofOfWork,
    chain: Arc<dyn ChainStorage>,
    pool: Arc<dyn TxPool>,
    metrics: Arc<Metrics>,
}

impl RaceResolver {
    /// Create a resolver for `local_peer`
    pub fn new(
        local_peer: PeerId,
        pow: ProofOfWork,
        chain: Arc<dyn ChainStorage>,
        pool: Arc<dyn TxPool>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            local_peer,
            pow,
            chain,
            pool,
            metrics,
        }
    }

    /// Scan the messages queued at call time, in arrival order.
    ///
    /// Messages arriving during the scan wait for the next round. On
    /// adoption the scan stops, `block` holds the peer's block and the
    /// outcome carries its body; otherwise `block` is untouched.
    pub async fn resolve(&self, queue: &BlockQueue, block: &mut CompactBlock) -> RaceOutcome {
        let height = block.height();
        let snapshot = queue.len();
        let mut outcome = RaceOutcome::default();

        for _ in 0..snapshot {
            let Some(raw) = queue.pop() else {
                break;
            };

            let verdict = match self.screen(&raw, block) {
                Ok(envelope) => match self.adopt(&envelope, block).await {
                    Ok(()) => {
                        info!(
                            height,
                            hash = %short_hex(&block.hash()),
                            peer = %block.header.peer_id,
                            txns = block.txns_hashes.len(),
                            "[pow] Adopted peer block"
                        );
                        outcome.adopted = Some(block.hash());
                        outcome.txns = envelope.txns;
                        Verdict::Adopted
                    }
                    Err(e) => {
                        warn!(height, error = %e, "[pow] Failed to apply peer block");
                        Verdict::ApplyFailed
                    }
                },
                Err(verdict) => verdict,
            };
            self.metrics.record_verdict(verdict);
            outcome.verdicts.push(verdict);

            if verdict == Verdict::Adopted {
                break;
            }
        }

        debug!(
            height,
            inspected = outcome.verdicts.len(),
            adopted = outcome.is_adopted(),
            "[pow] Race resolution finished"
        );
        outcome
    }

    /// Checks that need no I/O. `Ok` means the envelope may replace `block`.
    fn screen(&self, raw: &[u8], block: &CompactBlock) -> std::result::Result<Block, Verdict> {
        let envelope = Block::decode(raw).map_err(|e| {
            warn!(error = %e, "[pow] Dropping undecodable block announcement");
            Verdict::Undecodable
        })?;

        let header = &envelope.compact.header;
        if header.peer_id == self.local_peer {
            debug!(height = header.height, "[pow] Ignoring own block echo");
            return Err(Verdict::Echo);
        }
        if header.height != block.height() {
            debug!(
                announced = header.height,
                height = block.height(),
                peer = %header.peer_id,
                "[pow] Ignoring block for another height"
            );
            return Err(Verdict::WrongHeight {
                announced: header.height,
            });
        }
        if header.prev_hash != block.header.prev_hash {
            debug!(
                height = header.height,
                peer = %header.peer_id,
                parent = %short_hex(&header.prev_hash),
                "[pow] Ignoring block built on another branch"
            );
            return Err(Verdict::WrongParent);
        }
        if !self.pow.validate(&envelope.compact) {
            warn!(
                height = header.height,
                peer = %header.peer_id,
                "[pow] Rejecting block with invalid proof"
            );
            return Err(Verdict::InvalidProof);
        }
        if !envelope.body_matches_commitment() {
            warn!(
                height = header.height,
                peer = %header.peer_id,
                "[pow] Rejecting block whose transactions do not match its commitment"
            );
            return Err(Verdict::InconsistentBody);
        }
        Ok(envelope)
    }

    /// Side effects first; the local candidate changes only once they all
    /// succeed.
    async fn adopt(&self, envelope: &Block, block: &mut CompactBlock) -> Result<()> {
        let hash = envelope.compact.hash();
        self.chain.set_txns(hash, &envelope.txns).await?;
        self.pool.remove_txns(&envelope.compact.txns_hashes).await?;
        self.chain.mark_in_progress(hash).await?;
        block.copy_from(&envelope.compact);
        Ok(())
    }
}
