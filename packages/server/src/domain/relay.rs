//! Cross-Node Relay trait 定義
//!
//! ノードごとのチャンネルを使った publish/subscribe。
//! 各ノードは自分のチャンネル（`messages-{nodeId}`）だけを購読し、
//! 宛先ユーザーが所属するノードのチャンネルへ publish します。
//! 配送は at-most-once で、再送や順序保証はありません。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[cfg(test)]
use mockall::automock;

use super::{ChatMessage, NodeId, RelayError, WebRtcSignal};

const CHANNEL_PREFIX: &str = "messages-";

/// ノードのチャンネル名
pub fn relay_channel(node_id: &NodeId) -> String {
    format!("{}{}", CHANNEL_PREFIX, node_id.as_str())
}

/// ノード間で中継されるメッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "kebab-case")]
pub enum RelayEnvelope {
    Chat(ChatMessage),
    Signal(WebRtcSignal),
}

impl RelayEnvelope {
    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(|e| RelayError::Encode(e.to_string()))
    }
}

/// 自ノード宛てに publish されたメッセージの受信口
pub type RelaySubscription = mpsc::UnboundedReceiver<RelayEnvelope>;

/// Cross-Node Relay
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageRelay: Send + Sync {
    /// 指定ノードのチャンネルへメッセージを publish する
    async fn publish(&self, target: &NodeId, envelope: &RelayEnvelope) -> Result<(), RelayError>;

    /// 自ノードのチャンネルを購読する
    async fn subscribe(&self, node_id: &NodeId) -> Result<RelaySubscription, RelayError>;
}
