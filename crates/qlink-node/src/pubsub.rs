//! Publish/subscribe transport.
//!
//! The protocol only needs `publish(topic, payload)` and a per-topic
//! subscription yielding payloads in order. [`MemoryBroker`] implements this
//! in-process on tokio broadcast channels; a network broker binding would
//! implement the same two traits.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use bytes::Bytes;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::error::NodeError;

/// Messages buffered per topic before slow subscribers start losing them.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Topic-based message channel.
pub trait PubSub: Send + Sync {
    /// Stream of payloads for one topic.
    type Subscription: Subscription;

    /// Publish one payload to every current subscriber of `topic`.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the broker rejects the message.
    fn publish(
        &self,
        topic: &str,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), NodeError>> + Send;

    /// Subscribe to `topic`. Only messages published after this call are
    /// received.
    fn subscribe(&self, topic: &str) -> Self::Subscription;
}

/// Receiving end of a topic subscription.
pub trait Subscription: Send {
    /// Next payload, or `None` once the topic is closed.
    fn recv(&mut self) -> impl Future<Output = Option<Bytes>> + Send;
}

/// In-process broker with one broadcast channel per topic.
///
/// Cloning yields a handle to the same broker.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Bytes>>>>,
    capacity: usize,
}

impl MemoryBroker {
    /// Broker with [`DEFAULT_CAPACITY`] per topic.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Broker buffering `capacity` messages per topic.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { topics: Arc::new(Mutex::new(HashMap::new())), capacity: capacity.max(1) }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Bytes> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let capacity = self.capacity;
        topics.entry(topic.to_string()).or_insert_with(|| broadcast::channel(capacity).0).clone()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub for MemoryBroker {
    type Subscription = MemorySubscription;

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), NodeError> {
        let len = payload.len();
        match self.sender(topic).send(payload) {
            Ok(receivers) => debug!(topic, len, receivers, "published"),
            // Same as a broker without subscribers: the message is gone
            Err(_) => debug!(topic, len, "published with no subscribers"),
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> MemorySubscription {
        MemorySubscription { topic: topic.to_string(), receiver: self.sender(topic).subscribe() }
    }
}

/// Subscription on a [`MemoryBroker`] topic.
#[derive(Debug)]
pub struct MemorySubscription {
    topic: String,
    receiver: broadcast::Receiver<Bytes>,
}

impl Subscription for MemorySubscription {
    async fn recv(&mut self) -> Option<Bytes> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "subscriber lagged, messages lost");
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let broker = MemoryBroker::new();
        let mut a = broker.subscribe("t");
        let mut b = broker.subscribe("t");

        broker.publish("t", Bytes::from_static(b"one")).await.unwrap();
        broker.publish("t", Bytes::from_static(b"two")).await.unwrap();

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.recv().await.unwrap(), "one");
            assert_eq!(sub.recv().await.unwrap(), "two");
        }
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let broker = MemoryBroker::new();
        let mut other = broker.subscribe("other");
        let mut wanted = broker.subscribe("wanted");

        broker.publish("other", Bytes::from_static(b"x")).await.unwrap();
        broker.publish("wanted", Bytes::from_static(b"y")).await.unwrap();

        assert_eq!(wanted.recv().await.unwrap(), "y");
        assert_eq!(other.recv().await.unwrap(), "x");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let broker = MemoryBroker::new();
        broker.publish("nobody", Bytes::from_static(b"lost")).await.unwrap();

        // Late subscribers do not see earlier messages
        let mut late = broker.subscribe("nobody");
        broker.publish("nobody", Bytes::from_static(b"seen")).await.unwrap();
        assert_eq!(late.recv().await.unwrap(), "seen");
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_newest() {
        let broker = MemoryBroker::with_capacity(2);
        let mut sub = broker.subscribe("t");

        for i in 0..5u8 {
            broker.publish("t", Bytes::from(vec![i])).await.unwrap();
        }

        assert_eq!(sub.recv().await.unwrap(), Bytes::from(vec![3]));
        assert_eq!(sub.recv().await.unwrap(), Bytes::from(vec![4]));
    }
}
