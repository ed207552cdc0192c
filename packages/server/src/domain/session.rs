//! Session Registry
//!
//! ノード内で生きている接続を管理するインメモリの表。
//! 次の 3 つのマップを常に整合した状態で保持します。
//!
//! - `connectionId -> Connection`
//! - `connectionId -> userId`
//! - `userId -> set(connectionId)`（マルチデバイス・マルチタブ対応）
//!
//! `userId` のキーは、そのユーザーの接続がこのノードに 1 つ以上ある間だけ存在します。
//! 切断時には即座に削除します。
//!
//! ## 並行性
//!
//! 各マップは `DashMap`（シャード単位のロック）です。ユーザーごとの集合の更新は
//! `entry` API で 1 キーに閉じて行うため、同一ユーザーの複数デバイスが同時に
//! 接続・切断しても集合が壊れることはありません。

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::mpsc;

use super::{ConnectionId, PushError, UserId};

/// 接続ごとの送信チャンネル
///
/// 受信側は接続ごとに 1 つの writer タスクが持つため、同じ接続への書き込みは直列化されます。
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// 1 本の物理接続
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    sender: PusherChannel,
    connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        user_id: UserId,
        sender: PusherChannel,
        connected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            sender,
            connected_at,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// 接続の writer タスクへメッセージを渡す
    pub fn push(&self, content: &str) -> Result<(), PushError> {
        self.sender
            .send(content.to_string())
            .map_err(|_| PushError::ConnectionClosed(self.id.to_string()))
    }
}

/// `unregister` の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistered {
    pub user_id: UserId,
    /// このノード上でそのユーザーの最後の接続だったか
    pub last_session: bool,
    /// 外した接続の接続時刻
    pub connected_at: DateTime<Utc>,
}

/// ノード内の接続表
#[derive(Debug, Default)]
pub struct SessionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    connection_users: DashMap<ConnectionId, UserId>,
    user_connections: DashMap<UserId, HashSet<ConnectionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接続を登録する
    ///
    /// # Returns
    ///
    /// このノード上でそのユーザーの最初の接続なら `true`
    pub fn register(&self, connection: Connection) -> bool {
        let connection_id = connection.id().clone();
        let user_id = connection.user_id().clone();

        self.connections.insert(connection_id.clone(), connection);
        self.connection_users
            .insert(connection_id.clone(), user_id.clone());

        let mut sessions = self.user_connections.entry(user_id).or_default();
        sessions.insert(connection_id);
        sessions.len() == 1
    }

    /// 接続を登録解除する
    ///
    /// 未登録の接続 ID なら `None`。
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<Unregistered> {
        let (_, connection) = self.connections.remove(connection_id)?;
        self.connection_users.remove(connection_id);
        let user_id = connection.user_id().clone();

        let last_session = match self.user_connections.entry(user_id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(connection_id);
                if entry.get().is_empty() {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => true,
        };

        Some(Unregistered {
            user_id,
            last_session,
            connected_at: connection.connected_at(),
        })
    }

    /// ユーザーのローカル接続（未知のユーザーなら空）
    pub fn sessions_for(&self, user_id: &UserId) -> Vec<Connection> {
        let connection_ids: Vec<ConnectionId> = match self.user_connections.get(user_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return Vec::new(),
        };

        connection_ids
            .iter()
            .filter_map(|id| self.connections.get(id).map(|c| c.value().clone()))
            .collect()
    }

    /// ユーザーがこのノードに接続しているか
    pub fn has_sessions(&self, user_id: &UserId) -> bool {
        self.user_connections.contains_key(user_id)
    }

    /// 開いている全ての接続
    pub fn all_open_connections(&self) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_open())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// 管理している接続数
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// このノードに接続しているユーザー（ソート済み）
    pub fn connected_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .user_connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        users.sort();
        users
    }

    /// 特定の接続へ送信する
    pub fn push_to(&self, connection_id: &ConnectionId, content: &str) -> Result<(), PushError> {
        match self.connections.get(connection_id) {
            Some(connection) => connection.push(content),
            None => Err(PushError::ConnectionClosed(connection_id.to_string())),
        }
    }

    /// ユーザーの全てのローカル接続へ送信する
    ///
    /// # Returns
    ///
    /// 送信できた接続数
    pub fn push_to_user(&self, user_id: &UserId, content: &str) -> usize {
        fan_out(self.sessions_for(user_id), content)
    }

    /// 全てのローカル接続へ送信する（ブロードキャスト）
    ///
    /// 一部の接続への送信失敗はログに残し、他の接続への配送は続けます。
    pub fn broadcast(&self, content: &str) -> usize {
        fan_out(self.all_open_connections(), content)
    }
}

fn fan_out(targets: Vec<Connection>, content: &str) -> usize {
    let mut delivered = 0;
    for connection in targets {
        match connection.push(content) {
            Ok(()) => {
                delivered += 1;
                tracing::debug!(
                    "Pushed message to connection '{}' of '{}'",
                    connection.id(),
                    connection.user_id()
                );
            }
            Err(e) => tracing::warn!("Failed to push message: {}", e),
        }
    }
    delivered
}
