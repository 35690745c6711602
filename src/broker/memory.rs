//! In-process broker for tests and single-process development.
//!
//! Channels fan out over `tokio::sync::broadcast`, matching the pub/sub
//! semantics of the real broker: every live subscriber receives every
//! message, nothing is queued for late subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast, mpsc};

use crate::broker::{Broker, Subscription};
use crate::error::BrokerError;

/// Per-channel fan-out capacity before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct MemoryBroker {
    channels: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    store: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BrokerError> {
        // A send with no subscribers is not an error; pub/sub drops it.
        let _ = self.sender(channel).await.send(payload.to_vec());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        let mut bcast_rx = self.sender(channel).await.subscribe();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let channel_name = channel.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = bcast_rx.recv() => match msg {
                        Ok(payload) => {
                            if tx.send(payload).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(channel = %channel_name, dropped = n, "subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = tx.closed() => break,
                }
            }
        });
        Ok(Subscription::new(rx))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BrokerError> {
        self.store
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, BrokerError> {
        let mut store = self.store.lock().await;
        if store.contains_key(key) {
            return Ok(false);
        }
        store.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BrokerError> {
        Ok(self.store.lock().await.get(key).cloned())
    }
}
