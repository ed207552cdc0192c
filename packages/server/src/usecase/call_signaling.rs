//! UseCase: WebRTC シグナリング
//!
//! offer / answer / ice-candidate は宛先へそのまま中継します。
//! call-request / call-response / call-end は通話表を更新してから中継します。
//!
//! 宛先の解決順序:
//!
//! 1. Directory に登録があれば、そのノードのチャンネルへ publish（自ノードでも同じ）
//! 2. 登録がなくてもこのノードに接続があれば直接送る
//! 3. どちらもなければ到達不能
//!
//! 着信側に到達できない call-request には、発信側へ `accepted: false` の call-response を合成して返します。

use std::{sync::Arc, time::Duration};

use chrono::TimeDelta;

use crate::domain::{
    Call, CallId, CallTable, RelayEnvelope, SignalType, UserId, WebRtcSignal,
};

use super::{context::NodeContext, notification::encode};

/// シグナル処理の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// 宛先へ転送した
    Forwarded,
    /// 着信側に到達できず、発信側へ自動拒否を返した
    AutoRejected(CallId),
    /// 宛先に到達できなかった
    Unreachable,
    /// 通話表にない callId への応答
    UnknownCall,
    /// 宛先が指定されていない
    NoRecipient,
}

/// シグナリングのユースケース
pub struct CallSignalingUseCase {
    ctx: NodeContext,
    calls: Arc<CallTable>,
    call_ttl: TimeDelta,
}

impl CallSignalingUseCase {
    pub fn new(ctx: NodeContext, calls: Arc<CallTable>, call_ttl: Duration) -> Self {
        Self {
            ctx,
            calls,
            call_ttl: TimeDelta::from_std(call_ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn calls(&self) -> &CallTable {
        &self.calls
    }

    /// 接続から受信したシグナルを処理する
    ///
    /// `from` は送信者で必ず上書きし、`timestamp` がなければ現在時刻を入れます。
    pub async fn handle(&self, mut signal: WebRtcSignal, sender: &UserId) -> SignalOutcome {
        signal.from = Some(sender.to_string());
        if signal.timestamp.is_none() {
            signal.timestamp = Some(self.ctx.now());
        }
        tracing::info!(
            "Processing WebRTC signal: {} from: {} to: {}",
            signal.r#type.as_str(),
            sender,
            signal.to.as_deref().unwrap_or("-")
        );

        match signal.r#type {
            SignalType::CallRequest => self.request(signal, sender).await,
            SignalType::CallResponse => self.respond(signal, sender).await,
            SignalType::CallEnd => self.end(signal).await,
            SignalType::Offer | SignalType::Answer | SignalType::IceCandidate => {
                self.relay(signal).await
            }
        }
    }

    /// 期限切れの通話を回収する
    pub fn sweep_expired(&self) -> usize {
        let removed = self.calls.remove_expired(self.ctx.now(), self.call_ttl);
        if removed > 0 {
            tracing::info!("Swept {} expired calls", removed);
        }
        removed
    }

    async fn request(&self, mut signal: WebRtcSignal, caller: &UserId) -> SignalOutcome {
        let Some(callee) = recipient_of(&signal) else {
            tracing::warn!("Cannot start call from {}: no recipient specified", caller);
            return SignalOutcome::NoRecipient;
        };

        let call_id = CallId::generate();
        signal.call_id = Some(call_id.to_string());
        self.calls.insert(
            call_id.clone(),
            Call {
                caller: caller.clone(),
                callee: callee.clone(),
                created_at: self.ctx.now(),
            },
        );
        tracing::info!(
            "Starting call {} from {} to {}",
            call_id,
            caller,
            callee
        );

        if self.forward(&callee, signal).await {
            return SignalOutcome::Forwarded;
        }

        tracing::warn!(
            "Callee {} is unreachable, rejecting call {}",
            callee,
            call_id
        );
        let rejection = WebRtcSignal::auto_rejection(
            callee.as_str(),
            caller.as_str(),
            call_id.as_str(),
            self.ctx.now(),
        );
        if let Some(json) = encode(&rejection) {
            self.ctx.registry.push_to_user(caller, &json);
        }
        self.calls.remove(&call_id);
        SignalOutcome::AutoRejected(call_id)
    }

    async fn respond(&self, mut signal: WebRtcSignal, responder: &UserId) -> SignalOutcome {
        let Some(call_id) = call_id_of(&signal) else {
            tracing::warn!("Received call response without call ID");
            return SignalOutcome::UnknownCall;
        };
        let Some(call) = self.calls.get(&call_id) else {
            tracing::warn!("Received call response for unknown call ID: {}", call_id);
            return SignalOutcome::UnknownCall;
        };
        if responder != &call.callee {
            tracing::warn!(
                "Ignoring response to call {} from {}: callee is {}",
                call_id,
                responder,
                call.callee
            );
            return SignalOutcome::UnknownCall;
        }

        if signal.accepted == Some(true) {
            tracing::info!("Call {} accepted by {}", call_id, call.callee);
        } else {
            tracing::info!("Call {} rejected by {}", call_id, call.callee);
            self.calls.remove(&call_id);
        }

        signal.to = Some(call.caller.to_string());
        if self.forward(&call.caller, signal).await {
            SignalOutcome::Forwarded
        } else {
            tracing::warn!("Caller {} of call {} is unreachable", call.caller, call_id);
            SignalOutcome::Unreachable
        }
    }

    async fn end(&self, signal: WebRtcSignal) -> SignalOutcome {
        if let Some(call_id) = call_id_of(&signal) {
            if self.calls.remove(&call_id).is_some() {
                tracing::info!("Ending call: {}", call_id);
            }
        }
        self.relay(signal).await
    }

    async fn relay(&self, signal: WebRtcSignal) -> SignalOutcome {
        let Some(recipient) = recipient_of(&signal) else {
            tracing::warn!(
                "Cannot relay {} signal: no recipient specified",
                signal.r#type.as_str()
            );
            return SignalOutcome::NoRecipient;
        };

        if self.forward(&recipient, signal).await {
            SignalOutcome::Forwarded
        } else {
            tracing::warn!("No sessions found for recipient: {}", recipient);
            SignalOutcome::Unreachable
        }
    }

    /// 宛先へ転送する（到達したら `true`）
    async fn forward(&self, recipient: &UserId, signal: WebRtcSignal) -> bool {
        if let Some(node_id) = self.ctx.locate(recipient).await {
            return self
                .ctx
                .relay_to(&node_id, &RelayEnvelope::Signal(signal))
                .await;
        }

        if !self.ctx.registry.has_sessions(recipient) {
            return false;
        }
        match encode(&signal) {
            Some(json) => self.ctx.registry.push_to_user(recipient, &json) > 0,
            None => false,
        }
    }
}

fn recipient_of(signal: &WebRtcSignal) -> Option<UserId> {
    signal
        .recipient()
        .and_then(|id| UserId::try_from(id).ok())
}

fn call_id_of(signal: &WebRtcSignal) -> Option<CallId> {
    signal
        .call_id
        .as_deref()
        .and_then(|id| CallId::try_from(id).ok())
}
