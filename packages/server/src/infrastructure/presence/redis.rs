//! Redis を使った Presence Directory 実装
//!
//! キーは `user:{userId}:server`、値はノード ID。
//! 全ユーザーの列挙はキーパターン `user:*:server` で行います。

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::domain::{
    DirectoryError, NodeId, PresenceDirectory, UserId, presence::presence_key_pattern,
    presence_key, user_from_presence_key,
};

fn backend_error(e: redis::RedisError) -> DirectoryError {
    DirectoryError::Backend(e.to_string())
}

/// Redis Presence Directory
///
/// `ConnectionManager` は切断時に自動で再接続するため、接続は起動時に 1 度だけ確立します。
#[derive(Clone)]
pub struct RedisPresenceDirectory {
    connection: ConnectionManager,
}

impl RedisPresenceDirectory {
    /// Redis に接続する
    ///
    /// # Errors
    ///
    /// URL が不正な場合、または初回接続に失敗した場合
    pub async fn connect(url: &str) -> Result<Self, DirectoryError> {
        let client = redis::Client::open(url).map_err(backend_error)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(backend_error)?;
        tracing::info!("Presence directory connected to Redis");
        Ok(Self { connection })
    }
}

#[async_trait]
impl PresenceDirectory for RedisPresenceDirectory {
    async fn set(&self, user_id: &UserId, node_id: &NodeId) -> Result<(), DirectoryError> {
        let mut con = self.connection.clone();
        con.set::<_, _, ()>(presence_key(user_id), node_id.as_str())
            .await
            .map_err(backend_error)?;
        tracing::info!("Set server mapping for user {} to server {}", user_id, node_id);
        Ok(())
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<NodeId>, DirectoryError> {
        let mut con = self.connection.clone();
        let value: Option<String> = con
            .get(presence_key(user_id))
            .await
            .map_err(backend_error)?;
        Ok(value.and_then(|node| NodeId::new(node).ok()))
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), DirectoryError> {
        let mut con = self.connection.clone();
        con.del::<_, ()>(presence_key(user_id))
            .await
            .map_err(backend_error)?;
        tracing::info!("Removed server mapping for user {}", user_id);
        Ok(())
    }

    async fn list_all_users(&self) -> Result<Vec<UserId>, DirectoryError> {
        let mut con = self.connection.clone();
        let keys: Vec<String> = con
            .keys(presence_key_pattern())
            .await
            .map_err(backend_error)?;

        let mut users: Vec<UserId> = keys
            .iter()
            .filter_map(|key| user_from_presence_key(key))
            .filter_map(|user| UserId::try_from(user).ok())
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }
}
