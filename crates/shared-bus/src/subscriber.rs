//! # Topic Subscriber
//!
//! Defines the receiving side of the transport.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The transport was shut down.
    #[error("Network closed")]
    Closed,
}

/// A message as it travels through the in-memory transport.
#[derive(Debug, Clone)]
pub struct TopicMessage {
    /// Topic the message was published on.
    pub topic: Arc<str>,
    /// Raw payload bytes.
    pub payload: Arc<[u8]>,
}

/// Blocking receive side of a topic subscription.
#[async_trait]
pub trait TopicReceiver: Send {
    /// Wait for the next message on the subscribed topic.
    ///
    /// Returns [`SubscriptionError::Closed`] once the transport is gone.
    async fn recv(&mut self) -> Result<Vec<u8>, SubscriptionError>;
}

/// A subscription to one topic of an [`InMemoryNetwork`](crate::InMemoryNetwork).
pub struct TopicSubscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<TopicMessage>,

    /// Topic this subscription listens on.
    topic: String,
}

impl TopicSubscription {
    /// Create a new subscription.
    pub(crate) fn new(receiver: broadcast::Receiver<TopicMessage>, topic: String) -> Self {
        Self { receiver, topic }
    }

    /// Receive the next payload published on this topic.
    ///
    /// A lagging subscriber loses the oldest messages; the loss is logged and
    /// receiving continues with the oldest message still buffered.
    pub async fn recv(&mut self) -> Result<Vec<u8>, SubscriptionError> {
        loop {
            let msg = match self.receiver.recv().await {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionError::Closed),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "Subscriber lagged, messages dropped");
                    continue;
                }
            };

            if *msg.topic == *self.topic {
                return Ok(msg.payload.to_vec());
            }
            // Different topic, keep waiting
        }
    }
}

#[async_trait]
impl TopicReceiver for TopicSubscription {
    async fn recv(&mut self) -> Result<Vec<u8>, SubscriptionError> {
        TopicSubscription::recv(self).await
    }
}

impl Drop for TopicSubscription {
    fn drop(&mut self) {
        debug!(topic = %self.topic, "Subscription dropped");
    }
}
