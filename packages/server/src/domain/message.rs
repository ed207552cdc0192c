//! メッセージモデル
//!
//! クライアントとの間でやり取りする 2 種類のペイロードを定義します。
//!
//! - `ChatMessage`: チャット・各種通知（info / status / user-list など）
//! - `WebRtcSignal`: WebRTC のシグナリング（offer / answer / ICE / 通話制御）
//!
//! 受信フレームは `type` フィールドを先に読み取り、シグナル種別かどうかで
//! どちらのスキーマで解釈するかを決めます（`InboundFrame::parse`）。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kakehashi_shared::time::deserialize_lenient_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProtocolError;

/// チャットメッセージの種別
///
/// サーバーが解釈しない種別（`typing` など）は `Other` としてそのまま中継します。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatMessageType {
    #[default]
    Chat,
    Info,
    Sent,
    Error,
    Status,
    UserJoined,
    UserLeft,
    UserList,
    #[serde(untagged)]
    Other(String),
}

/// WebRTC シグナルの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalType {
    Offer,
    Answer,
    IceCandidate,
    CallRequest,
    CallResponse,
    CallEnd,
}

impl SignalType {
    /// `type` フィールドの文字列からシグナル種別を判定する
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "offer" => Some(Self::Offer),
            "answer" => Some(Self::Answer),
            "ice-candidate" => Some(Self::IceCandidate),
            "call-request" => Some(Self::CallRequest),
            "call-response" => Some(Self::CallResponse),
            "call-end" => Some(Self::CallEnd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::CallRequest => "call-request",
            Self::CallResponse => "call-response",
            Self::CallEnd => "call-end",
        }
    }
}

/// チャットメッセージ（通知系メッセージを含む）
///
/// `userId` / `clientId` / `serverId` / `timestamp` は受信ノードが必ず上書きします。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub r#type: ChatMessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
}

impl ChatMessage {
    /// 宛先（空文字は宛先なし = ブロードキャスト扱い）
    pub fn recipient(&self) -> Option<&str> {
        self.recipient_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// 接続直後に本人へ送る welcome メッセージ
    pub fn info(
        server_id: &str,
        client_id: &str,
        user_id: &str,
        clients: usize,
        connected_users: Vec<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut additional_data = BTreeMap::new();
        additional_data.insert("clients".to_string(), Value::from(clients));
        additional_data.insert("connectedUsers".to_string(), Value::from(connected_users));

        Self {
            r#type: ChatMessageType::Info,
            message: Some(format!(
                "Connected to WebSocket Server {} as {}",
                server_id, user_id
            )),
            user_id: Some(user_id.to_string()),
            client_id: Some(client_id.to_string()),
            server_id: Some(server_id.to_string()),
            timestamp: Some(timestamp),
            additional_data: Some(additional_data),
            ..Default::default()
        }
    }

    /// ダイレクトメッセージの送信受付通知
    pub fn sent(recipient_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            r#type: ChatMessageType::Sent,
            recipient_id: Some(recipient_id.to_string()),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    /// ダイレクトメッセージの送信失敗通知
    pub fn error(message: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            r#type: ChatMessageType::Error,
            message: Some(message.to_string()),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    /// ノードのローカル接続数
    pub fn status(server_id: &str, clients: usize, timestamp: DateTime<Utc>) -> Self {
        let mut additional_data = BTreeMap::new();
        additional_data.insert("clients".to_string(), Value::from(clients));

        Self {
            r#type: ChatMessageType::Status,
            server_id: Some(server_id.to_string()),
            timestamp: Some(timestamp),
            additional_data: Some(additional_data),
            ..Default::default()
        }
    }

    pub fn user_joined(server_id: &str, user_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self::user_update(ChatMessageType::UserJoined, server_id, user_id, timestamp)
    }

    pub fn user_left(server_id: &str, user_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self::user_update(ChatMessageType::UserLeft, server_id, user_id, timestamp)
    }

    fn user_update(
        r#type: ChatMessageType,
        server_id: &str,
        user_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            r#type,
            user_id: Some(user_id.to_string()),
            server_id: Some(server_id.to_string()),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    /// クラスタ全体の接続ユーザー一覧
    pub fn user_list(server_id: &str, users: Vec<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            r#type: ChatMessageType::UserList,
            server_id: Some(server_id.to_string()),
            timestamp: Some(timestamp),
            users: Some(users),
            ..Default::default()
        }
    }
}

/// WebRTC シグナル
///
/// `payload` は SDP や ICE candidate をそのまま中継するため、解釈しません。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcSignal {
    pub r#type: SignalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_share: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
}

impl WebRtcSignal {
    /// 宛先ユーザー（空文字は宛先なし）
    pub fn recipient(&self) -> Option<&str> {
        self.to.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// 着信側に到達できなかった場合にサーバーが合成する拒否応答
    pub fn auto_rejection(
        callee: &str,
        caller: &str,
        call_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            r#type: SignalType::CallResponse,
            from: Some(callee.to_string()),
            to: Some(caller.to_string()),
            payload: None,
            timestamp: Some(timestamp),
            video: None,
            audio: None,
            screen_share: None,
            call_id: Some(call_id.to_string()),
            accepted: Some(false),
        }
    }
}

/// クライアントから受信したフレーム
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Signal(WebRtcSignal),
    Chat(ChatMessage),
}

impl InboundFrame {
    /// `type` フィールドで判別してから、対応するスキーマで解釈する
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }

        let is_signal = value
            .get("type")
            .and_then(Value::as_str)
            .and_then(SignalType::from_tag)
            .is_some();

        if is_signal {
            serde_json::from_value(value)
                .map(Self::Signal)
                .map_err(|e| ProtocolError::InvalidSignal(e.to_string()))
        } else {
            serde_json::from_value(value)
                .map(Self::Chat)
                .map_err(|e| ProtocolError::InvalidChat(e.to_string()))
        }
    }
}
