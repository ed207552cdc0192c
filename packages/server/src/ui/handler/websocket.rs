//! WebSocket connection handlers.
//!
//! 接続ごとに 2 つのタスクを動かします。
//!
//! - 受信タスク: クライアントからのフレームを受信順に `RouteMessageUseCase` へ渡す
//! - 送信タスク（`pusher_loop`）: Session Registry 経由で届いたメッセージをソケットへ書き込む
//!
//! どちらかが終了したらもう一方も止め、切断処理を行います。

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, UserId},
    ui::state::AppState,
};

/// ユーザー ID を渡すクエリパラメーター
pub const USER_ID_QUERY: &str = "X-Auth-User-Id";
/// ユーザー ID を渡すヘッダー
pub const USER_ID_HEADER: &str = "x-auth-user-id";

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user_id = extract_user_id(&params, &headers);
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// 外部で検証済みのユーザー ID を取り出す（クエリパラメーター優先、空白は未指定扱い）
pub fn extract_user_id(params: &HashMap<String, String>, headers: &HeaderMap) -> Option<UserId> {
    params
        .get(USER_ID_QUERY)
        .and_then(|value| UserId::try_from(value.as_str()).ok())
        .or_else(|| {
            headers
                .get(USER_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| UserId::try_from(value).ok())
        })
}

/// Spawns a task that receives messages from the rx channel and pushes them to the WebSocket sender.
///
/// The registry keeps the only other handle to this channel, so the loop ends once the
/// connection is unregistered or the socket stops accepting writes.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Option<UserId>) {
    let connection_id = ConnectionId::generate();
    let (mut sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let user_id = match state
        .connect_user_usecase
        .execute(user_id, connection_id.clone(), tx)
        .await
    {
        Ok(user_id) => user_id,
        Err(e) => {
            let frame = CloseFrame {
                code: close_code::POLICY,
                reason: e.to_string().into(),
            };
            if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                tracing::warn!("Failed to close connection {}: {}", connection_id, e);
            }
            return;
        }
    };

    let route_message = state.route_message_usecase.clone();
    let recv_connection_id = connection_id.clone();
    let recv_user_id = user_id.clone();

    // Spawn a task to receive messages from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error on {}: {}", recv_connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    tracing::debug!("Received text from {}: {}", recv_user_id, text.as_str());
                    route_message
                        .execute(&recv_connection_id, &recv_user_id, text.as_str())
                        .await;
                }
                Message::Close(_) => {
                    tracing::info!("Client {} requested close", recv_connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state
        .disconnect_user_usecase
        .execute(&connection_id)
        .await;
}
