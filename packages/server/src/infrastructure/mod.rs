//! Infrastructure 層
//!
//! ドメイン層が定義する `PresenceDirectory` / `MessageRelay` の具体的な実装。
//!
//! - `presence`: インメモリ実装（単一ノード・テスト用）と Redis 実装
//! - `relay`: インメモリのハブ実装と Redis pub/sub 実装
//! - `timeout`: 各呼び出しに上限時間を設けるデコレーター

pub mod presence;
pub mod relay;
pub mod timeout;

use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::domain::{DirectoryError, MessageRelay, PresenceDirectory, RelayError};

use self::{
    presence::{InMemoryPresenceDirectory, RedisPresenceDirectory},
    relay::{InMemoryRelayHub, RedisMessageRelay},
    timeout::{TimeoutMessageRelay, TimeoutPresenceDirectory},
};

/// バックエンドへの接続エラー
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("presence directory: {0}")]
    Directory(#[from] DirectoryError),
    #[error("relay: {0}")]
    Relay(#[from] RelayError),
}

/// ノードが使う Presence Directory と Relay の組
#[derive(Clone)]
pub struct Backends {
    pub directory: Arc<dyn PresenceDirectory>,
    pub relay: Arc<dyn MessageRelay>,
}

impl Backends {
    /// 単一プロセス内で完結するインメモリのバックエンド
    pub fn in_memory() -> Self {
        Self {
            directory: Arc::new(InMemoryPresenceDirectory::new()),
            relay: Arc::new(InMemoryRelayHub::new()),
        }
    }

    /// Redis の URL があれば Redis に、なければインメモリのバックエンドを使う
    pub async fn connect(redis_url: Option<&str>) -> Result<Self, BackendError> {
        let Some(url) = redis_url else {
            tracing::warn!("No Redis URL configured, running standalone with in-memory backends");
            return Ok(Self::in_memory());
        };

        let directory = RedisPresenceDirectory::connect(url).await?;
        let relay = RedisMessageRelay::connect(url).await?;
        Ok(Self {
            directory: Arc::new(directory),
            relay: Arc::new(relay),
        })
    }

    /// 各呼び出しに上限時間を設ける
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            directory: Arc::new(TimeoutPresenceDirectory::new(self.directory, timeout)),
            relay: Arc::new(TimeoutMessageRelay::new(self.relay, timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NodeId, UserId};

    #[tokio::test]
    async fn test_connect_without_url_uses_in_memory_backends() {
        // テスト項目: Redis の URL がなければインメモリのバックエンドで動く
        // given (前提条件):
        let backends = Backends::connect(None)
            .await
            .unwrap()
            .with_timeout(Duration::from_secs(1));
        let user = UserId::new("alice".to_string()).unwrap();
        let node = NodeId::new("node-a".to_string()).unwrap();

        // when (操作):
        backends.directory.set(&user, &node).await.unwrap();

        // then (期待する結果):
        assert_eq!(backends.directory.get(&user).await, Ok(Some(node)));
    }
}
