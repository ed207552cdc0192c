//! UseCase: 受信メッセージの振り分け
//!
//! クライアントから届いたフレームを解釈し、シグナルはシグナリングへ、
//! チャットは宛先に応じてブロードキャストまたはノード間中継へ回します。
//!
//! ダイレクトメッセージは宛先が自ノードにいても Directory のノード宛てに publish します。
//! ローカル配送は Relay の購読側（`DeliverRelayedUseCase`）が一括して行います。

use std::sync::Arc;

use crate::domain::{ChatMessage, ConnectionId, InboundFrame, NodeId, RelayEnvelope, UserId};

use super::{
    call_signaling::{CallSignalingUseCase, SignalOutcome},
    context::NodeContext,
    notification::Notifier,
};

const SEND_FAILED: &str = "Error: Failed to send message";

/// 振り分けの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// 解釈できないフレームを破棄した
    Malformed,
    /// シグナリングで処理した
    Signal(SignalOutcome),
    /// ローカル接続へブロードキャストした
    Broadcast { delivered: usize },
    /// 宛先ノードへ中継した
    Relayed(NodeId),
    /// 宛先に届けられなかった
    Undeliverable,
}

/// メッセージ振り分けのユースケース
pub struct RouteMessageUseCase {
    ctx: NodeContext,
    notifier: Notifier,
    signaling: Arc<CallSignalingUseCase>,
}

impl RouteMessageUseCase {
    pub fn new(ctx: NodeContext, signaling: Arc<CallSignalingUseCase>) -> Self {
        let notifier = Notifier::new(ctx.clone());
        Self {
            ctx,
            notifier,
            signaling,
        }
    }

    /// 接続から受信したテキストフレームを処理する
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 受信した接続
    /// * `user_id` - 接続のユーザー
    /// * `text` - 受信したフレーム
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        user_id: &UserId,
        text: &str,
    ) -> RouteOutcome {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    "Dropping malformed message from {} ({}): {}",
                    user_id,
                    connection_id,
                    e
                );
                return RouteOutcome::Malformed;
            }
        };

        match frame {
            InboundFrame::Signal(signal) => {
                RouteOutcome::Signal(self.signaling.handle(signal, user_id).await)
            }
            InboundFrame::Chat(message) => self.route_chat(connection_id, user_id, message).await,
        }
    }

    async fn route_chat(
        &self,
        connection_id: &ConnectionId,
        user_id: &UserId,
        mut message: ChatMessage,
    ) -> RouteOutcome {
        message.user_id = Some(user_id.to_string());
        message.client_id = Some(connection_id.to_string());
        message.server_id = Some(self.ctx.node_id.to_string());
        message.timestamp = Some(self.ctx.now());

        let Some(recipient) = message.recipient().and_then(|id| UserId::try_from(id).ok()) else {
            let delivered = self.notifier.broadcast(&message);
            tracing::debug!("Broadcast message from {} to {} sessions", user_id, delivered);
            return RouteOutcome::Broadcast { delivered };
        };
        message.recipient_id = Some(recipient.to_string());

        let outcome = match self.ctx.locate(&recipient).await {
            Some(node_id) => {
                if self
                    .ctx
                    .relay_to(&node_id, &RelayEnvelope::Chat(message))
                    .await
                {
                    tracing::info!(
                        "Message from {} to {} relayed via server {}",
                        user_id,
                        recipient,
                        node_id
                    );
                    RouteOutcome::Relayed(node_id)
                } else {
                    RouteOutcome::Undeliverable
                }
            }
            None => {
                tracing::warn!("Recipient {} is not connected to any server", recipient);
                RouteOutcome::Undeliverable
            }
        };

        let ack = match &outcome {
            RouteOutcome::Relayed(_) => ChatMessage::sent(recipient.as_str(), self.ctx.now()),
            _ => ChatMessage::error(SEND_FAILED, self.ctx.now()),
        };
        self.notifier.send_to_connection(connection_id, &ack);
        outcome
    }
}
