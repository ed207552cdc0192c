//! 値オブジェクト
//!
//! ユーザー・接続・ノード・通話を識別する ID。いずれも空文字列を許可しません。

use std::fmt;

use uuid::Uuid;

use super::error::ValueObjectError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// 前後の空白を除いた値で ID を生成する
            pub fn new(value: String) -> Result<Self, ValueObjectError> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(ValueObjectError::Blank($label));
                }
                if trimmed.len() == value.len() {
                    Ok(Self(value))
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValueObjectError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// 認証済みユーザーの ID（外部で検証済み）
    UserId,
    "user id"
);

string_id!(
    /// ノード内で一意な接続 ID（accept 時に採番）
    ConnectionId,
    "connection id"
);

string_id!(
    /// ノード ID。Directory の値と Relay のチャンネル名に使われる
    NodeId,
    "node id"
);

string_id!(
    /// 通話 ID（call-request 受信時にサーバーが採番）
    CallId,
    "call id"
);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl CallId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl NodeId {
    /// 起動時に一度だけ解決する。設定値があればそれを使い、なければ UUID を生成する
    pub fn resolve(configured: Option<String>) -> Self {
        configured
            .and_then(|id| Self::new(id).ok())
            .unwrap_or_else(|| Self(Uuid::new_v4().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_user_id_is_rejected() {
        // テスト項目: 空白のみの UserId は生成できない
        // given (前提条件):
        let blank = "   ".to_string();

        // when (操作):
        let result = UserId::new(blank);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::Blank("user id")));
    }

    #[test]
    fn test_user_id_is_trimmed() {
        // テスト項目: 前後の空白は除去される
        // given (前提条件):
        let padded = "  alice ".to_string();

        // when (操作):
        let user_id = UserId::new(padded).unwrap();

        // then (期待する結果):
        assert_eq!(user_id.as_str(), "alice");
    }

    #[test]
    fn test_node_id_resolve_prefers_configured_value() {
        // テスト項目: 設定された NodeId があればそれが使われる
        // given (前提条件):
        let configured = Some("node-a".to_string());

        // when (操作):
        let node_id = NodeId::resolve(configured);

        // then (期待する結果):
        assert_eq!(node_id.as_str(), "node-a");
    }

    #[test]
    fn test_node_id_resolve_generates_when_missing_or_blank() {
        // テスト項目: 未設定・空文字の場合は UUID が生成され、毎回異なる
        // given (前提条件):

        // when (操作):
        let a = NodeId::resolve(None);
        let b = NodeId::resolve(Some("".to_string()));

        // then (期待する結果):
        assert!(Uuid::parse_str(a.as_str()).is_ok());
        assert!(Uuid::parse_str(b.as_str()).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_connection_ids_are_unique() {
        // テスト項目: 採番された ConnectionId は重複しない
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
    }
}
