//! Redis-backed broker: PUBLISH/SUBSCRIBE for channels, SET/GET/SET NX for
//! job state.
//!
//! Publishes and key/value calls share one multiplexed connection manager;
//! each subscription gets a dedicated pubsub connection, torn down when the
//! `Subscription` is dropped.

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::mpsc;

use crate::broker::{Broker, Subscription};
use crate::error::BrokerError;

/// Capacity of the per-subscription delivery buffer.
const SUBSCRIPTION_BUFFER: usize = 256;

pub struct RedisBroker {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisBroker {
    /// Connect to the broker at the given URL.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url).map_err(|e| BrokerError::Connection {
            reason: e.to_string(),
        })?;
        let manager =
            client
                .get_connection_manager()
                .await
                .map_err(|e| BrokerError::Connection {
                    reason: e.to_string(),
                })?;
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let mut conn = self.manager.clone();
        conn.publish::<_, _, ()>(channel, payload)
            .await
            .map_err(|e| BrokerError::Publish {
                channel: channel.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        let mut pubsub =
            self.client
                .get_async_pubsub()
                .await
                .map_err(|e| BrokerError::Subscribe {
                    channel: channel.to_string(),
                    reason: e.to_string(),
                })?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| BrokerError::Subscribe {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let channel_name = channel.to_string();
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    msg = stream.next() => {
                        let Some(msg) = msg else {
                            tracing::warn!(channel = %channel_name, "pubsub connection closed");
                            break;
                        };
                        let payload: Vec<u8> = msg.get_payload_bytes().to_vec();
                        if tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
        });

        Ok(Subscription::new(rx))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BrokerError> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| BrokerError::KeyValue {
                op: "set",
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, BrokerError> {
        let mut conn = self.manager.clone();
        conn.set_nx(key, value)
            .await
            .map_err(|e| BrokerError::KeyValue {
                op: "set_nx",
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BrokerError> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(|e| BrokerError::KeyValue {
            op: "get",
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}
