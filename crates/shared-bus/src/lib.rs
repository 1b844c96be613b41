//! # Shared Bus - Topic Transport for Block Announcements
//!
//! Nodes announce blocks by publishing raw envelope bytes on a named topic.
//! Every subscriber of that topic receives every message, including the
//! publisher's own subscription (echo). Delivery is best-effort.
//!
//! ```text
//! ┌──────────────┐   publish(topic)   ┌──────────────┐   recv()   ┌──────────────┐
//! │   Node A     │ ─────────────────► │  P2pNetwork  │ ─────────► │  Node A, B…  │
//! └──────────────┘                    └──────────────┘            └──────────────┘
//! ```
//!
//! [`InMemoryNetwork`] connects any number of nodes inside one process. A
//! real deployment implements [`P2pNetwork`] over its own transport.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod publisher;
pub mod subscriber;

pub use publisher::{InMemoryNetwork, NetworkError, P2pNetwork};
pub use subscriber::{SubscriptionError, TopicMessage, TopicReceiver, TopicSubscription};

/// Topic carrying full block envelopes produced at the start of a round.
pub const START_BLOCK_TOPIC: &str = "start-block";

/// Messages buffered per subscriber before the slowest one starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Largest payload the in-memory transport accepts.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_two_nodes_share_one_network() {
        let node_a = InMemoryNetwork::new();
        let node_b = node_a.clone();

        let mut sub_a = node_a.subscribe(START_BLOCK_TOPIC);
        let mut sub_b = node_b.subscribe(START_BLOCK_TOPIC);

        let delivered = node_a
            .publish(START_BLOCK_TOPIC, b"block".to_vec())
            .await
            .unwrap();
        assert_eq!(delivered, 2);

        for sub in [&mut sub_a, &mut sub_b] {
            let payload = timeout(Duration::from_millis(100), sub.recv())
                .await
                .expect("timeout")
                .unwrap();
            assert_eq!(payload, b"block".to_vec());
        }
    }
}
