//! ノードのコンテキスト
//!
//! 各ユースケースが共有する依存（自ノード ID・Session Registry・Presence Directory・Relay・時計）。
//! Directory / Relay の失敗はここでログに残し、「効果なし」として呼び出し元へ返します。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kakehashi_shared::time::Clock;

use crate::domain::{
    MessageRelay, NodeId, PresenceDirectory, RelayEnvelope, SessionRegistry, UserId,
};

/// ノードのコンテキスト
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: NodeId,
    pub registry: Arc<SessionRegistry>,
    pub directory: Arc<dyn PresenceDirectory>,
    pub relay: Arc<dyn MessageRelay>,
    pub clock: Arc<dyn Clock>,
}

impl NodeContext {
    pub fn new(
        node_id: NodeId,
        registry: Arc<SessionRegistry>,
        directory: Arc<dyn PresenceDirectory>,
        relay: Arc<dyn MessageRelay>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            node_id,
            registry,
            directory,
            relay,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// ユーザーの所属ノードを Directory から引く
    ///
    /// Directory の失敗は「宛先不明」として `None` を返す。
    pub async fn locate(&self, user_id: &UserId) -> Option<NodeId> {
        match self.directory.get(user_id).await {
            Ok(node_id) => node_id,
            Err(e) => {
                tracing::error!("Error getting server for user {}: {}", user_id, e);
                None
            }
        }
    }

    /// 指定ノードのチャンネルへ publish する
    ///
    /// # Returns
    ///
    /// publish が受け付けられたら `true`
    pub async fn relay_to(&self, target: &NodeId, envelope: &RelayEnvelope) -> bool {
        match self.relay.publish(target, envelope).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to relay message to server {}: {}", target, e);
                false
            }
        }
    }
}
