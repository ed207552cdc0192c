//! ドメイン層
//!
//! ノード内のセッション管理・通話状態・メッセージモデルと、
//! 外部コラボレーター（Presence Directory / Relay）へのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

pub mod call;
pub mod error;
pub mod message;
pub mod presence;
pub mod relay;
pub mod session;
pub mod value_object;

pub use call::{Call, CallTable};
pub use error::{DirectoryError, ProtocolError, PushError, RelayError, ValueObjectError};
pub use message::{ChatMessage, ChatMessageType, InboundFrame, SignalType, WebRtcSignal};
pub use presence::{PresenceDirectory, presence_key, user_from_presence_key};
pub use relay::{MessageRelay, RelayEnvelope, RelaySubscription, relay_channel};
pub use session::{Connection, PusherChannel, SessionRegistry, Unregistered};
pub use value_object::{CallId, ConnectionId, NodeId, UserId};

#[cfg(test)]
pub use presence::MockPresenceDirectory;
#[cfg(test)]
pub use relay::MockMessageRelay;
