//! # Topic Publisher
//!
//! Defines the transport contract and its in-process implementation.

use crate::subscriber::{TopicMessage, TopicReceiver, TopicSubscription};
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_PAYLOAD_BYTES};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from publishing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Payload exceeds what the transport carries.
    #[error("Payload too large: {size} bytes, maximum {max}")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Transport limit.
        max: usize,
    },

    /// The transport is unavailable.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// P2P transport used for block announcements.
///
/// Delivery is best-effort: messages may be lost, duplicated or reordered
/// across topics, and a node sees its own publications.
#[async_trait]
pub trait P2pNetwork: Send + Sync {
    /// Publish `payload` on `topic`.
    ///
    /// Returns the number of subscribers the message was handed to.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, NetworkError>;

    /// Subscribe to `topic`.
    fn subscribe(&self, topic: &str) -> Box<dyn TopicReceiver>;
}

struct Shared {
    /// Broadcast sender shared by every clone.
    sender: broadcast::Sender<TopicMessage>,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Largest accepted payload.
    max_payload: usize,

    /// Channel capacity.
    capacity: usize,
}

/// In-memory transport.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer
/// semantics. Clones share one channel, so giving each node in a test a
/// clone connects them all.
#[derive(Clone)]
pub struct InMemoryNetwork {
    shared: Arc<Shared>,
}

impl InMemoryNetwork {
    /// Create a network with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a network buffering `capacity` messages per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_limits(capacity, DEFAULT_MAX_PAYLOAD_BYTES)
    }

    /// Create a network with explicit buffer and payload limits.
    #[must_use]
    pub fn with_limits(capacity: usize, max_payload: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                sender,
                messages_published: AtomicU64::new(0),
                max_payload,
                capacity,
            }),
        }
    }

    /// Subscribe to `topic`.
    #[must_use]
    pub fn subscribe(&self, topic: &str) -> TopicSubscription {
        debug!(topic, "New subscription created");
        TopicSubscription::new(self.shared.sender.subscribe(), topic.to_string())
    }

    /// Number of live subscriptions across all topics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.sender.receiver_count()
    }

    /// Total messages accepted for publication.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.shared.messages_published.load(Ordering::Relaxed)
    }

    /// Channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl P2pNetwork for InMemoryNetwork {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, NetworkError> {
        if payload.len() > self.shared.max_payload {
            return Err(NetworkError::PayloadTooLarge {
                size: payload.len(),
                max: self.shared.max_payload,
            });
        }

        self.shared.messages_published.fetch_add(1, Ordering::Relaxed);
        let size = payload.len();
        let msg = TopicMessage {
            topic: Arc::from(topic),
            payload: Arc::from(payload),
        };

        match self.shared.sender.send(msg) {
            Ok(receivers) => {
                debug!(topic, size, receivers, "Message published");
                Ok(receivers)
            }
            Err(_) => {
                // Nobody listening; best-effort delivery drops it
                warn!(topic, size, "Message dropped (no subscribers)");
                Ok(0)
            }
        }
    }

    fn subscribe(&self, topic: &str) -> Box<dyn TopicReceiver> {
        Box::new(InMemoryNetwork::subscribe(self, topic))
    }
}
