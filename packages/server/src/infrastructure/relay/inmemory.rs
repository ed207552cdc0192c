//! InMemory Relay 実装
//!
//! チャンネル名（`messages-{nodeId}`）ごとに購読者の送信口を保持するハブです。
//! `Arc` で共有すると、同一プロセス内の複数ノードを Redis なしで繋げられます。
//! publish 時に一度 JSON にエンコードしてから復元するため、ワイヤ上の形式も検証されます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::domain::{
    MessageRelay, NodeId, RelayEnvelope, RelayError, RelaySubscription, relay_channel,
};

/// インメモリ Relay ハブ
#[derive(Debug, Default)]
pub struct InMemoryRelayHub {
    /// Key: チャンネル名, Value: 購読ノードへの送信口
    channels: Mutex<HashMap<String, mpsc::UnboundedSender<RelayEnvelope>>>,
}

impl InMemoryRelayHub {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRelay for InMemoryRelayHub {
    async fn publish(&self, target: &NodeId, envelope: &RelayEnvelope) -> Result<(), RelayError> {
        let channel = relay_channel(target);
        let encoded = envelope.encode()?;
        let decoded: RelayEnvelope =
            serde_json::from_str(&encoded).map_err(|e| RelayError::Encode(e.to_string()))?;

        let channels = self.channels.lock().await;
        match channels.get(&channel) {
            Some(subscriber) if subscriber.send(decoded).is_ok() => {
                tracing::debug!("Published message to channel {}", channel);
                Ok(())
            }
            // 購読者が終了したチャンネルも購読者なしとして扱う
            _ => {
                tracing::warn!("No subscriber on channel {}, message dropped", channel);
                Err(RelayError::NoSubscribers(channel))
            }
        }
    }

    async fn subscribe(&self, node_id: &NodeId) -> Result<RelaySubscription, RelayError> {
        let channel = relay_channel(node_id);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = self.channels.lock().await;
        if channels.insert(channel.clone(), tx).is_some() {
            tracing::warn!("Replaced existing subscriber on channel {}", channel);
        }
        tracing::info!("Subscribed to relay channel {}", channel);
        Ok(rx)
    }
}
