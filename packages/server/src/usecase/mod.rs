//! UseCase 層
//!
//! - `connect_user` / `disconnect_user`: 接続・切断時の登録と通知
//! - `route_message`: クライアントから受信したメッセージの振り分け（Message Router）
//! - `call_signaling`: WebRTC 通話のシグナリング（Call Signaling Engine）
//! - `deliver_relayed`: 自ノード宛てに Relay されたメッセージのローカル配送
//! - `notification`: user-joined / user-left / user-list / status のブロードキャスト

pub mod call_signaling;
pub mod connect_user;
pub mod context;
pub mod deliver_relayed;
pub mod disconnect_user;
pub mod error;
pub mod notification;
pub mod route_message;

pub use call_signaling::{CallSignalingUseCase, SignalOutcome};
pub use connect_user::ConnectUserUseCase;
pub use context::NodeContext;
pub use deliver_relayed::DeliverRelayedUseCase;
pub use disconnect_user::DisconnectUserUseCase;
pub use error::ConnectError;
pub use notification::Notifier;
pub use route_message::{RouteMessageUseCase, RouteOutcome};

#[cfg(test)]
pub(crate) mod test_support {
    //! UseCase のテスト用ヘルパー

    use std::sync::Arc;

    use kakehashi_shared::time::FixedClock;
    use serde_json::Value;
    use tokio::sync::mpsc;

    use crate::{
        domain::{
            Connection, ConnectionId, MessageRelay, NodeId, PresenceDirectory, SessionRegistry,
            UserId,
        },
        infrastructure::{presence::InMemoryPresenceDirectory, relay::InMemoryRelayHub},
    };

    use super::NodeContext;

    pub const FIXED_MILLIS: i64 = 1_700_000_000_000;

    pub fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    pub fn node(id: &str) -> NodeId {
        NodeId::new(id.to_string()).unwrap()
    }

    pub fn context_with(
        node_id: &str,
        directory: Arc<dyn PresenceDirectory>,
        relay: Arc<dyn MessageRelay>,
    ) -> NodeContext {
        NodeContext::new(
            node(node_id),
            Arc::new(SessionRegistry::new()),
            directory,
            relay,
            Arc::new(FixedClock::from_millis(FIXED_MILLIS)),
        )
    }

    /// インメモリの Directory / Relay を使うノード
    pub fn in_memory_context(node_id: &str) -> NodeContext {
        context_with(
            node_id,
            Arc::new(InMemoryPresenceDirectory::new()),
            Arc::new(InMemoryRelayHub::new()),
        )
    }

    /// Registry に直接接続を登録する（Directory には書かない）
    pub fn attach(
        ctx: &NodeContext,
        user_id: &str,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::generate();
        ctx.registry
            .register(Connection::new(id.clone(), user(user_id), tx, ctx.now()));
        (id, rx)
    }

    /// 受信済みのメッセージを全て取り出す
    pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(text) = rx.try_recv() {
            messages.push(serde_json::from_str(&text).unwrap());
        }
        messages
    }

    /// 指定した type のメッセージだけを取り出す
    pub fn of_type<'a>(messages: &'a [Value], kind: &str) -> Vec<&'a Value> {
        messages.iter().filter(|m| m["type"] == kind).collect()
    }
}
