//! UseCase: 切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectUserUseCase::execute() と deregister_node()
//!
//! ### なぜこのテストが必要か
//! - 同一ユーザーの別デバイスが残っている間は Directory のエントリを消してはいけない
//! - シャットダウン時に自ノードのユーザーを Directory に残さない
//!
//! ### どのような状況を想定しているか
//! - 正常系：最後の接続の切断、マルチデバイスの片方だけ切断
//! - エッジケース：未登録の接続 ID、Directory の削除失敗

use crate::domain::{ConnectionId, Unregistered};

use super::{context::NodeContext, notification::Notifier};

/// 切断のユースケース
pub struct DisconnectUserUseCase {
    ctx: NodeContext,
    notifier: Notifier,
}

impl DisconnectUserUseCase {
    pub fn new(ctx: NodeContext) -> Self {
        let notifier = Notifier::new(ctx.clone());
        Self { ctx, notifier }
    }

    /// 接続を閉じた後の後始末
    ///
    /// ユーザーの最後の接続だった場合だけ Directory から削除し、user-left と user-list を送ります。
    /// status はどの場合も送ります。
    pub async fn execute(&self, connection_id: &ConnectionId) -> Option<Unregistered> {
        let Some(outcome) = self.ctx.registry.unregister(connection_id) else {
            tracing::debug!("Connection {} was not registered", connection_id);
            return None;
        };
        let user_id = &outcome.user_id;
        let duration = self.ctx.now() - outcome.connected_at;
        tracing::info!(
            "Client disconnected: {}, User: {} (last session: {}, connected for {}s)",
            connection_id,
            user_id,
            outcome.last_session,
            duration.num_seconds()
        );

        if outcome.last_session {
            match self.ctx.directory.delete(user_id).await {
                Ok(()) => tracing::info!("Removed user {} from directory", user_id),
                Err(e) => tracing::error!("Error removing user {}: {}", user_id, e),
            }
            // 削除の間に同じユーザーが再接続していたら登録し直す
            if self.ctx.registry.has_sessions(user_id) {
                if let Err(e) = self.ctx.directory.set(user_id, &self.ctx.node_id).await {
                    tracing::error!("Error registering user {}: {}", user_id, e);
                }
            }
            self.notifier.user_left(user_id).await;
        }
        self.notifier.status();

        Some(outcome)
    }

    /// シャットダウン時に自ノードのユーザーを Directory から外す
    ///
    /// # Returns
    ///
    /// 削除できたユーザー数
    pub async fn deregister_node(&self) -> usize {
        let users = self.ctx.registry.connected_users();
        let mut removed = 0;
        for user_id in &users {
            match self.ctx.directory.delete(user_id).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::error!("Error removing user {}: {}", user_id, e),
            }
        }
        tracing::info!(
            "Deregistered {}/{} users of server {}",
            removed,
            users.len(),
            self.ctx.node_id
        );
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        domain::{DirectoryError, MockMessageRelay, MockPresenceDirectory},
        usecase::test_support::{
            attach, context_with, drain, in_memory_context, node, of_type, user,
        },
    };

    #[tokio::test]
    async fn test_last_session_removes_directory_entry() {
        // テスト項目: 最後の接続が閉じると Directory から消え、残りの接続へ user-left が届く
        // given (前提条件):
        let ctx = in_memory_context("node-a");
        let (alice_conn, _alice_rx) = attach(&ctx, "alice");
        let (_, mut bob_rx) = attach(&ctx, "bob");
        ctx.directory.set(&user("alice"), &node("node-a")).await.unwrap();
        ctx.directory.set(&user("bob"), &node("node-a")).await.unwrap();
        let usecase = DisconnectUserUseCase::new(ctx.clone());

        // when (操作):
        let outcome = usecase.execute(&alice_conn).await.unwrap();

        // then (期待する結果):
        assert!(outcome.last_session);
        assert_eq!(outcome.connected_at, ctx.now());
        assert_eq!(ctx.directory.get(&user("alice")).await, Ok(None));

        let messages = drain(&mut bob_rx);
        let types: Vec<&str> = messages
            .iter()
            .map(|m| m["type"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["user-left", "user-list", "status"]);
        assert_eq!(messages[0]["userId"], "alice");
        assert_eq!(messages[1]["users"], json!(["bob"]));
        assert_eq!(messages[2]["additionalData"]["clients"], 1);
    }

    #[tokio::test]
    async fn test_remaining_device_keeps_directory_entry() {
        // テスト項目: 同一ユーザーの接続が残っていれば Directory は消さず、user-left も送らない
        // given (前提条件):
        let ctx = in_memory_context("node-a");
        let (phone, _phone_rx) = attach(&ctx, "alice");
        let (_, mut laptop_rx) = attach(&ctx, "alice");
        ctx.directory.set(&user("alice"), &node("node-a")).await.unwrap();
        let usecase = DisconnectUserUseCase::new(ctx.clone());

        // when (操作):
        let outcome = usecase.execute(&phone).await.unwrap();

        // then (期待する結果):
        assert!(!outcome.last_session);
        assert_eq!(
            ctx.directory.get(&user("alice")).await,
            Ok(Some(node("node-a")))
        );
        let messages = drain(&mut laptop_rx);
        assert!(of_type(&messages, "user-left").is_empty());
        assert_eq!(of_type(&messages, "status").len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_connection_is_ignored() {
        // テスト項目: 未登録の接続 ID の切断は何もしない
        let directory = MockPresenceDirectory::new();
        let ctx = context_with("node-a", Arc::new(directory), Arc::new(MockMessageRelay::new()));
        let usecase = DisconnectUserUseCase::new(ctx);

        assert_eq!(usecase.execute(&ConnectionId::generate()).await, None);
    }

    #[tokio::test]
    async fn test_directory_failure_still_notifies() {
        // テスト項目: Directory の削除に失敗しても user-left と status は送られる
        // given (前提条件):
        let mut directory = MockPresenceDirectory::new();
        directory
            .expect_delete()
            .times(1)
            .returning(|_| Err(DirectoryError::Backend("down".into())));
        directory
            .expect_list_all_users()
            .returning(|| Ok(vec![]));
        let ctx = context_with("node-a", Arc::new(directory), Arc::new(MockMessageRelay::new()));
        let (alice_conn, _alice_rx) = attach(&ctx, "alice");
        let (_, mut bob_rx) = attach(&ctx, "bob");
        let usecase = DisconnectUserUseCase::new(ctx);

        // when (操作):
        usecase.execute(&alice_conn).await;

        // then (期待する結果):
        let messages = drain(&mut bob_rx);
        assert_eq!(of_type(&messages, "user-left").len(), 1);
        assert_eq!(of_type(&messages, "status").len(), 1);
    }

    #[tokio::test]
    async fn test_deregister_node_removes_local_users() {
        // テスト項目: シャットダウン時に自ノードのユーザーだけが Directory から消える
        // given (前提条件):
        let ctx = in_memory_context("node-a");
        let (_, _rx1) = attach(&ctx, "alice");
        let (_, _rx2) = attach(&ctx, "bob");
        for id in ["alice", "bob"] {
            ctx.directory.set(&user(id), &node("node-a")).await.unwrap();
        }
        ctx.directory.set(&user("carol"), &node("node-b")).await.unwrap();
        let usecase = DisconnectUserUseCase::new(ctx.clone());

        // when (操作):
        let removed = usecase.deregister_node().await;

        // then (期待する結果):
        assert_eq!(removed, 2);
        assert_eq!(ctx.directory.list_all_users().await, Ok(vec![user("carol")]));
    }
}
