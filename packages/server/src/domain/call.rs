//! 通話レコード
//!
//! `callId -> {caller, callee}` の一時的な表。
//! call-request で作成し、call-end・拒否応答・着信側不在時の自動拒否で削除します。
//! 放置された通話は `remove_expired` で期限切れとして回収します。

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::{CallId, UserId};

/// 進行中の通話
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub caller: UserId,
    pub callee: UserId,
    pub created_at: DateTime<Utc>,
}

/// 通話表
#[derive(Debug, Default)]
pub struct CallTable {
    calls: DashMap<CallId, Call>,
}

impl CallTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, call_id: CallId, call: Call) {
        self.calls.insert(call_id, call);
    }

    pub fn get(&self, call_id: &CallId) -> Option<Call> {
        self.calls.get(call_id).map(|call| call.value().clone())
    }

    pub fn contains(&self, call_id: &CallId) -> bool {
        self.calls.contains_key(call_id)
    }

    pub fn remove(&self, call_id: &CallId) -> Option<Call> {
        self.calls.remove(call_id).map(|(_, call)| call)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// `ttl` より古い通話を削除し、削除した件数を返す
    pub fn remove_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let before = self.calls.len();
        self.calls.retain(|_, call| now - call.created_at < ttl);
        before.saturating_sub(self.calls.len())
    }
}
