//! ドメイン層のエラー型

use std::time::Duration;

use thiserror::Error;

/// 値オブジェクトの生成に失敗した
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be blank")]
    Blank(&'static str),
}

/// クライアントから受信したフレームを解釈できない
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("invalid signal payload: {0}")]
    InvalidSignal(String),

    #[error("invalid chat payload: {0}")]
    InvalidChat(String),
}

/// Presence Directory の操作に失敗した
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("presence backend error: {0}")]
    Backend(String),

    #[error("presence directory call timed out after {0:?}")]
    Timeout(Duration),
}

/// Relay の操作に失敗した
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("relay backend error: {0}")]
    Backend(String),

    #[error("failed to encode relay envelope: {0}")]
    Encode(String),

    #[error("relay call timed out after {0:?}")]
    Timeout(Duration),

    #[error("no subscriber on relay channel {0}")]
    NoSubscribers(String),
}

/// 接続へのメッセージ送信に失敗した
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("connection '{0}' is closed")]
    ConnectionClosed(String),
}
