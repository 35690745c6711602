//! Broker gateway: a thin typed wrapper over the pub/sub channel broker and
//! its key/value side-channel.
//!
//! Delivery is at-most-once within a single subscription and ordered per
//! channel; there is no replay after a resubscribe. The key/value calls exist
//! solely for job-state persistence.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::BrokerError;

mod memory;
mod redis;

pub use memory::MemoryBroker;
pub use redis::RedisBroker;

/// A live subscription to one channel.
///
/// Messages arrive in broker order. Dropping the subscription cancels it and
/// tears down the underlying broker resources.
pub struct Subscription {
    stream: ReceiverStream<Vec<u8>>,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            stream: ReceiverStream::new(rx),
        }
    }

    /// Receive the next message, or `None` once the underlying connection is
    /// gone. The caller must re-subscribe to recover.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.stream.next().await
    }
}

/// The broker contract the rest of the system is written against.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish a payload to a channel.
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Subscribe to a channel, receiving every message published after the
    /// subscription is established.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError>;

    /// Store a value under a key, overwriting any existing value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BrokerError>;

    /// Store a value only if the key does not exist yet.
    ///
    /// Returns `true` if this call created the key. This is the atomic
    /// check-and-set that job de-duplication relies on.
    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, BrokerError>;

    /// Fetch the value stored under a key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BrokerError>;
}
