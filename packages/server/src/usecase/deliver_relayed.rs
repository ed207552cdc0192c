//! UseCase: 中継されたメッセージのローカル配送
//!
//! 自ノードのチャンネルに届いたメッセージを、このノードの接続へ配ります。
//!
//! - チャット: 宛先ユーザーの全接続と、送信者が別ユーザーなら送信者の全接続（送信確認のエコー）
//! - シグナル: `to` のユーザーの全接続
//!
//! 届け先がない場合はログに残して破棄します。
//!
//! 通話表はノードごとに持つため、他ノードから届いた call-request は着信側のノードの表へ写し、
//! call-response（拒否）と call-end はこのノードの表から取り除きます。
//! これにより着信側は自ノードで応答でき、発信側のノードにも結果が反映されます。

use std::sync::Arc;

use crate::domain::{
    Call, CallId, CallTable, ChatMessage, RelayEnvelope, RelaySubscription, SignalType, UserId,
    WebRtcSignal,
};

use super::{context::NodeContext, notification::encode};

/// 中継メッセージ配送のユースケース
pub struct DeliverRelayedUseCase {
    ctx: NodeContext,
    calls: Arc<CallTable>,
}

impl DeliverRelayedUseCase {
    pub fn new(ctx: NodeContext, calls: Arc<CallTable>) -> Self {
        Self { ctx, calls }
    }

    /// 購読が閉じるまで配送を続ける
    pub async fn run(&self, mut subscription: RelaySubscription) {
        tracing::info!("Listening for relayed messages on server {}", self.ctx.node_id);
        while let Some(envelope) = subscription.recv().await {
            self.execute(envelope);
        }
        tracing::info!("Relay subscription of server {} closed", self.ctx.node_id);
    }

    /// 1 件のメッセージを配送する
    ///
    /// # Returns
    ///
    /// 配送できた接続数
    pub fn execute(&self, envelope: RelayEnvelope) -> usize {
        match envelope {
            RelayEnvelope::Chat(message) => self.deliver_chat(&message),
            RelayEnvelope::Signal(signal) => self.deliver_signal(&signal),
        }
    }

    fn deliver_chat(&self, message: &ChatMessage) -> usize {
        let Some(json) = encode(message) else {
            return 0;
        };
        let Some(recipient) = message.recipient().and_then(|id| UserId::try_from(id).ok()) else {
            return self.ctx.registry.broadcast(&json);
        };

        let mut delivered = self.ctx.registry.push_to_user(&recipient, &json);
        if delivered == 0 {
            tracing::warn!("No connected sessions found for recipient: {}", recipient);
        }

        let sender = message
            .user_id
            .as_deref()
            .and_then(|id| UserId::try_from(id).ok());
        if let Some(sender) = sender.filter(|sender| sender != &recipient) {
            delivered += self.ctx.registry.push_to_user(&sender, &json);
        }

        if delivered == 0 {
            tracing::warn!("Relayed message to {} could not be delivered", recipient);
        }
        delivered
    }

    fn deliver_signal(&self, signal: &WebRtcSignal) -> usize {
        let Some(recipient) = signal.recipient().and_then(|id| UserId::try_from(id).ok()) else {
            tracing::warn!(
                "Dropping relayed {} signal without recipient",
                signal.r#type.as_str()
            );
            return 0;
        };
        let Some(json) = encode(signal) else {
            return 0;
        };

        // 着信側が応答する前に通話表へ反映しておく
        if self.ctx.registry.has_sessions(&recipient) {
            self.track_call(signal, &recipient);
        }
        let delivered = self.ctx.registry.push_to_user(&recipient, &json);
        if delivered == 0 {
            tracing::warn!(
                "No sessions found for recipient of {} signal: {}",
                signal.r#type.as_str(),
                recipient
            );
        }
        delivered
    }

    /// 届けたシグナルに合わせてこのノードの通話表を更新する
    fn track_call(&self, signal: &WebRtcSignal, recipient: &UserId) {
        let Some(call_id) = signal
            .call_id
            .as_deref()
            .and_then(|id| CallId::try_from(id).ok())
        else {
            return;
        };

        match signal.r#type {
            SignalType::CallRequest => {
                // 同一ノード内の通話は発信時に記録済み
                if self.calls.contains(&call_id) {
                    return;
                }
                let Some(caller) = signal
                    .from
                    .as_deref()
                    .and_then(|id| UserId::try_from(id).ok())
                else {
                    return;
                };
                tracing::info!(
                    "Tracking relayed call {} from {} to {}",
                    call_id,
                    caller,
                    recipient
                );
                self.calls.insert(
                    call_id,
                    Call {
                        caller,
                        callee: recipient.clone(),
                        created_at: self.ctx.now(),
                    },
                );
            }
            SignalType::CallResponse if signal.accepted != Some(true) => {
                if self.calls.remove(&call_id).is_some() {
                    tracing::info!("Relayed call {} was rejected", call_id);
                }
            }
            SignalType::CallEnd => {
                if self.calls.remove(&call_id).is_some() {
                    tracing::info!("Relayed call {} ended", call_id);
                }
            }
            _ => {}
        }
    }
}
