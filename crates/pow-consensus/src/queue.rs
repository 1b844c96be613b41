//! Bounded FIFO between the network listener and the round
//!
//! The listener is the only producer; the round is the only consumer. A full
//! queue either parks the listener or evicts the oldest message, depending on
//! the configured [`OverflowPolicy`].

use crate::config::OverflowPolicy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::warn;

/// What happened to a pushed message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended without loss
    Queued,
    /// Appended after discarding the oldest message
    DroppedOldest,
}

/// Raw block announcements awaiting the next round
pub struct BlockQueue {
    messages: Mutex<VecDeque<Vec<u8>>>,
    capacity: usize,
    policy: OverflowPolicy,
    space: Notify,
}

impl BlockQueue {
    /// Create a queue holding at most `capacity` messages.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            space: Notify::new(),
        }
    }

    /// Append a message, applying the overflow policy when full.
    pub async fn push(&self, msg: Vec<u8>) -> PushOutcome {
        loop {
            // Register before checking so a concurrent pop cannot be missed
            let notified = self.space.notified();
            {
                let mut messages = self.messages.lock();
                if messages.len() < self.capacity {
                    messages.push_back(msg);
                    return PushOutcome::Queued;
                }
                if self.policy == OverflowPolicy::DropOldest {
                    messages.pop_front();
                    messages.push_back(msg);
                    warn!(capacity = self.capacity, "[pow] Block queue full, dropped oldest");
                    return PushOutcome::DroppedOldest;
                }
            }
            notified.await;
        }
    }

    /// Take the oldest message, if any.
    pub fn pop(&self) -> Option<Vec<u8>> {
        let msg = self.messages.lock().pop_front();
        if msg.is_some() {
            self.space.notify_waiters();
        }
        msg
    }

    /// Messages currently buffered.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Maximum number of buffered messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
