//! ノード内への通知
//!
//! user-joined / user-left / user-list / status はいずれもこのノードのローカル接続にだけ送ります。
//! user-list の中身は Presence Directory に登録されたクラスタ全体のユーザーです。

use serde::Serialize;

use crate::domain::{ChatMessage, ConnectionId, UserId};

use super::context::NodeContext;

/// 送信用に JSON へ変換する（失敗はログに残して `None`）
pub(crate) fn encode<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to serialize outgoing message: {}", e);
            None
        }
    }
}

/// ノード内への通知
#[derive(Clone)]
pub struct Notifier {
    ctx: NodeContext,
}

impl Notifier {
    pub fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }

    /// クラスタ全体の接続ユーザー（ソート済み）
    ///
    /// Directory が使えない場合はこのノードの接続ユーザーで代用します。
    pub async fn connected_users(&self) -> Vec<String> {
        let users = match self.ctx.directory.list_all_users().await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("Error getting all users: {}", e);
                self.ctx.registry.connected_users()
            }
        };
        let mut users: Vec<String> = users.into_iter().map(UserId::into_string).collect();
        users.sort();
        users.dedup();
        users
    }

    /// 特定の接続へ送る
    pub fn send_to_connection(&self, connection_id: &ConnectionId, message: &ChatMessage) -> bool {
        let Some(json) = encode(message) else {
            return false;
        };
        match self.ctx.registry.push_to(connection_id, &json) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send message to {}: {}", connection_id, e);
                false
            }
        }
    }

    /// このノードの全ての接続へ送る
    pub fn broadcast(&self, message: &ChatMessage) -> usize {
        match encode(message) {
            Some(json) => self.ctx.registry.broadcast(&json),
            None => 0,
        }
    }

    /// user-joined と最新の user-list を送る
    pub async fn user_joined(&self, user_id: &UserId) {
        let message = ChatMessage::user_joined(
            self.ctx.node_id.as_str(),
            user_id.as_str(),
            self.ctx.now(),
        );
        self.broadcast(&message);
        self.user_list().await;
    }

    /// user-left と最新の user-list を送る
    pub async fn user_left(&self, user_id: &UserId) {
        let message =
            ChatMessage::user_left(self.ctx.node_id.as_str(), user_id.as_str(), self.ctx.now());
        self.broadcast(&message);
        self.user_list().await;
    }

    pub async fn user_list(&self) {
        let users = self.connected_users().await;
        let message = ChatMessage::user_list(self.ctx.node_id.as_str(), users, self.ctx.now());
        self.broadcast(&message);
    }

    /// このノードの接続数を送る
    pub fn status(&self) {
        let message = ChatMessage::status(
            self.ctx.node_id.as_str(),
            self.ctx.registry.count(),
            self.ctx.now(),
        );
        self.broadcast(&message);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        domain::{DirectoryError, MockMessageRelay, MockPresenceDirectory},
        usecase::test_support::{attach, context_with, drain, in_memory_context, node, user},
    };

    #[tokio::test]
    async fn test_user_list_comes_from_directory() {
        // テスト項目: user-list には他ノードのユーザーも含まれる
        // given (前提条件):
        let ctx = in_memory_context("node-a");
        ctx.directory.set(&user("carol"), &node("node-b")).await.unwrap();
        ctx.directory.set(&user("alice"), &node("node-a")).await.unwrap();
        let (_, mut rx) = attach(&ctx, "alice");
        let notifier = Notifier::new(ctx);

        // when (操作):
        notifier.user_list().await;

        // then (期待する結果):
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "user-list");
        assert_eq!(messages[0]["users"], serde_json::json!(["alice", "carol"]));
    }

    #[tokio::test]
    async fn test_user_list_falls_back_to_local_users() {
        // テスト項目: Directory が失敗した場合はローカルの接続ユーザーで代用する
        // given (前提条件):
        let mut directory = MockPresenceDirectory::new();
        directory
            .expect_list_all_users()
            .returning(|| Err(DirectoryError::Backend("down".into())));
        let ctx = context_with("node-a", Arc::new(directory), Arc::new(MockMessageRelay::new()));
        let (_, _rx1) = attach(&ctx, "bob");
        let (_, _rx2) = attach(&ctx, "alice");
        let notifier = Notifier::new(ctx);

        // when (操作):
        let users = notifier.connected_users().await;

        // then (期待する結果):
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    async fn test_status_reports_local_connection_count() {
        // テスト項目: status にはこのノードの接続数が入る
        let ctx = in_memory_context("node-a");
        let (_, mut rx) = attach(&ctx, "alice");
        let (_, _rx2) = attach(&ctx, "alice");
        let notifier = Notifier::new(ctx);

        notifier.status();

        let messages = drain(&mut rx);
        assert_eq!(messages[0]["type"], "status");
        assert_eq!(messages[0]["serverId"], "node-a");
        assert_eq!(messages[0]["additionalData"]["clients"], 2);
    }
}
