//! 外部コラボレーター呼び出しのタイムアウト
//!
//! Presence Directory / Relay の各呼び出しを `tokio::time::timeout` で包み、
//! 遅い・応答のないバックエンドが接続処理を止め続けないようにします。
//! タイムアウトは `DirectoryError::Timeout` / `RelayError::Timeout` として返ります。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::domain::{
    DirectoryError, MessageRelay, NodeId, PresenceDirectory, RelayEnvelope, RelayError,
    RelaySubscription, UserId,
};

/// タイムアウト付き Presence Directory
pub struct TimeoutPresenceDirectory {
    inner: Arc<dyn PresenceDirectory>,
    timeout: Duration,
}

impl TimeoutPresenceDirectory {
    pub fn new(inner: Arc<dyn PresenceDirectory>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl PresenceDirectory for TimeoutPresenceDirectory {
    async fn set(&self, user_id: &UserId, node_id: &NodeId) -> Result<(), DirectoryError> {
        tokio::time::timeout(self.timeout, self.inner.set(user_id, node_id))
            .await
            .map_err(|_| DirectoryError::Timeout(self.timeout))?
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<NodeId>, DirectoryError> {
        tokio::time::timeout(self.timeout, self.inner.get(user_id))
            .await
            .map_err(|_| DirectoryError::Timeout(self.timeout))?
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), DirectoryError> {
        tokio::time::timeout(self.timeout, self.inner.delete(user_id))
            .await
            .map_err(|_| DirectoryError::Timeout(self.timeout))?
    }

    async fn list_all_users(&self) -> Result<Vec<UserId>, DirectoryError> {
        tokio::time::timeout(self.timeout, self.inner.list_all_users())
            .await
            .map_err(|_| DirectoryError::Timeout(self.timeout))?
    }
}

/// タイムアウト付き Relay
pub struct TimeoutMessageRelay {
    inner: Arc<dyn MessageRelay>,
    timeout: Duration,
}

impl TimeoutMessageRelay {
    pub fn new(inner: Arc<dyn MessageRelay>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl MessageRelay for TimeoutMessageRelay {
    async fn publish(&self, target: &NodeId, envelope: &RelayEnvelope) -> Result<(), RelayError> {
        tokio::time::timeout(self.timeout, self.inner.publish(target, envelope))
            .await
            .map_err(|_| RelayError::Timeout(self.timeout))?
    }

    async fn subscribe(&self, node_id: &NodeId) -> Result<RelaySubscription, RelayError> {
        tokio::time::timeout(self.timeout, self.inner.subscribe(node_id))
            .await
            .map_err(|_| RelayError::Timeout(self.timeout))?
    }
}
