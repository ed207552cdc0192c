//! Presence Directory trait 定義
//!
//! `userId -> nodeId` のクラスタ全体のマッピング。「誰がどのノードにいるか」の唯一の情報源です。
//! 全ての操作は失敗しうるため、呼び出し側はエラーをログに残して「宛先不明」として扱います。

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::{DirectoryError, NodeId, UserId};

const KEY_PREFIX: &str = "user:";
const KEY_SUFFIX: &str = ":server";

/// Directory のキー名（`user:{userId}:server`）
pub fn presence_key(user_id: &UserId) -> String {
    format!("{}{}{}", KEY_PREFIX, user_id.as_str(), KEY_SUFFIX)
}

/// キー名からユーザー ID 部分を取り出す
pub fn user_from_presence_key(key: &str) -> Option<&str> {
    key.strip_prefix(KEY_PREFIX)
        .and_then(|rest| rest.strip_suffix(KEY_SUFFIX))
        .filter(|user| !user.is_empty())
}

/// キー列挙に使うパターン
pub fn presence_key_pattern() -> String {
    format!("{}*{}", KEY_PREFIX, KEY_SUFFIX)
}

/// Presence Directory
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PresenceDirectory: Send + Sync {
    /// ユーザーの所属ノードを記録する
    async fn set(&self, user_id: &UserId, node_id: &NodeId) -> Result<(), DirectoryError>;

    /// ユーザーの所属ノードを取得する（未登録なら `None`）
    async fn get(&self, user_id: &UserId) -> Result<Option<NodeId>, DirectoryError>;

    /// ユーザーのエントリを削除する
    async fn delete(&self, user_id: &UserId) -> Result<(), DirectoryError>;

    /// 接続中の全ユーザー
    async fn list_all_users(&self) -> Result<Vec<UserId>, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_key_round_trip() {
        // テスト項目: キー名の生成と解析が対応している（コロンを含むユーザー ID も扱える）
        // given (前提条件):
        let user = UserId::new("team:alice".to_string()).unwrap();

        // when (操作):
        let key = presence_key(&user);

        // then (期待する結果):
        assert_eq!(key, "user:team:alice:server");
        assert_eq!(user_from_presence_key(&key), Some("team:alice"));
        assert_eq!(user_from_presence_key("session:abc"), None);
        assert_eq!(user_from_presence_key("user::server"), None);
        assert_eq!(presence_key_pattern(), "user:*:server");
    }
}
