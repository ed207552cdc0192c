//! InMemory Presence Directory 実装
//!
//! HashMap をインメモリの KV ストアとして使用します。
//! `Arc` で共有すれば同一プロセス内の複数ノードから同じ Directory を参照できます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{DirectoryError, NodeId, PresenceDirectory, UserId};

/// インメモリ Presence Directory
#[derive(Debug, Default)]
pub struct InMemoryPresenceDirectory {
    entries: Mutex<HashMap<UserId, NodeId>>,
}

impl InMemoryPresenceDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceDirectory for InMemoryPresenceDirectory {
    async fn set(&self, user_id: &UserId, node_id: &NodeId) -> Result<(), DirectoryError> {
        let mut entries = self.entries.lock().await;
        entries.insert(user_id.clone(), node_id.clone());
        tracing::debug!("Set server mapping for user {} to server {}", user_id, node_id);
        Ok(())
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<NodeId>, DirectoryError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(user_id).cloned())
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), DirectoryError> {
        let mut entries = self.entries.lock().await;
        entries.remove(user_id);
        tracing::debug!("Removed server mapping for user {}", user_id);
        Ok(())
    }

    async fn list_all_users(&self) -> Result<Vec<UserId>, DirectoryError> {
        let entries = self.entries.lock().await;
        let mut users: Vec<UserId> = entries.keys().cloned().collect();
        users.sort();
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn node(id: &str) -> NodeId {
        NodeId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        // テスト項目: 登録・取得・削除が反映される
        // given (前提条件):
        let directory = InMemoryPresenceDirectory::new();

        // when (操作):
        directory.set(&user("alice"), &node("node-a")).await.unwrap();
        let found = directory.get(&user("alice")).await.unwrap();
        directory.delete(&user("alice")).await.unwrap();
        let after_delete = directory.get(&user("alice")).await.unwrap();

        // then (期待する結果):
        assert_eq!(found, Some(node("node-a")));
        assert_eq!(after_delete, None);
    }

    #[tokio::test]
    async fn test_set_overwrites_previous_node() {
        // テスト項目: 別ノードからの登録は後勝ちで上書きされる
        let directory = InMemoryPresenceDirectory::new();
        directory.set(&user("alice"), &node("node-a")).await.unwrap();
        directory.set(&user("alice"), &node("node-b")).await.unwrap();
        assert_eq!(
            directory.get(&user("alice")).await.unwrap(),
            Some(node("node-b"))
        );
    }

    #[tokio::test]
    async fn test_list_all_users_is_sorted() {
        // テスト項目: 全ユーザー一覧はソートされて返る
        // given (前提条件):
        let directory = InMemoryPresenceDirectory::new();
        directory.set(&user("charlie"), &node("n")).await.unwrap();
        directory.set(&user("alice"), &node("n")).await.unwrap();
        directory.set(&user("bob"), &node("m")).await.unwrap();

        // when (操作):
        let users = directory.list_all_users().await.unwrap();

        // then (期待する結果):
        assert_eq!(users, vec![user("alice"), user("bob"), user("charlie")]);
    }

    #[tokio::test]
    async fn test_delete_missing_user_is_ok() {
        // テスト項目: 存在しないユーザーの削除もエラーにならない（冪等性）
        let directory = InMemoryPresenceDirectory::new();
        assert!(directory.delete(&user("ghost")).await.is_ok());
    }
}
