//! Shared application state.

use std::sync::Arc;

use kakehashi_shared::time::Clock;

use crate::{
    domain::NodeId,
    usecase::{ConnectUserUseCase, DisconnectUserUseCase, RouteMessageUseCase},
};

/// Shared application state
pub struct AppState {
    /// 自ノードの ID
    pub node_id: NodeId,
    pub clock: Arc<dyn Clock>,
    /// ConnectUserUseCase（接続のユースケース）
    pub connect_user_usecase: Arc<ConnectUserUseCase>,
    /// DisconnectUserUseCase（切断のユースケース）
    pub disconnect_user_usecase: Arc<DisconnectUserUseCase>,
    /// RouteMessageUseCase（受信メッセージ振り分けのユースケース）
    pub route_message_usecase: Arc<RouteMessageUseCase>,
}
