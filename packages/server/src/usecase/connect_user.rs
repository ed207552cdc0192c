//! UseCase: 接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectUserUseCase::execute() メソッド
//! - Registry への登録、Directory への書き込み、welcome と参加通知の順序
//!
//! ### なぜこのテストが必要か
//! - 他ノードからこのユーザーへ配送できるかどうかは Directory の書き込みで決まる
//! - 新しい接続自身も user-joined / user-list を受け取ることを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：最初の接続、同一ユーザーの 2 台目の接続
//! - 異常系：ユーザー ID なし、Directory の書き込み失敗

use crate::domain::{ChatMessage, Connection, ConnectionId, PusherChannel, UserId};

use super::{context::NodeContext, error::ConnectError, notification::Notifier};

/// 接続のユースケース
pub struct ConnectUserUseCase {
    ctx: NodeContext,
    notifier: Notifier,
}

impl ConnectUserUseCase {
    pub fn new(ctx: NodeContext) -> Self {
        let notifier = Notifier::new(ctx.clone());
        Self { ctx, notifier }
    }

    /// 接続を受け付ける
    ///
    /// 1. Registry に登録する
    /// 2. Directory に `userId -> 自ノード` を記録する（失敗はログのみ）
    /// 3. 本人へ welcome（info）を送る
    /// 4. ローカル接続全体へ user-joined と user-list を送る
    ///
    /// # Arguments
    ///
    /// * `user_id` - 外部で検証済みのユーザー ID（なければ接続を拒否する）
    /// * `connection_id` - 接続 ID
    /// * `sender` - 接続の writer タスクへの送信チャンネル
    ///
    /// # Returns
    ///
    /// * `Ok(UserId)` - 登録した接続のユーザー
    /// * `Err(ConnectError)` - 接続を拒否した（Registry / Directory は変更しない）
    pub async fn execute(
        &self,
        user_id: Option<UserId>,
        connection_id: ConnectionId,
        sender: PusherChannel,
    ) -> Result<UserId, ConnectError> {
        let Some(user_id) = user_id else {
            tracing::warn!(
                "Rejected connection {}: no authenticated user id",
                connection_id
            );
            return Err(ConnectError::MissingIdentity);
        };

        let now = self.ctx.now();
        let connection = Connection::new(connection_id.clone(), user_id.clone(), sender, now);
        let first_session = self.ctx.registry.register(connection);
        tracing::info!(
            "Client connected: {}, User: {} to server: {} (first session: {})",
            connection_id,
            user_id,
            self.ctx.node_id,
            first_session
        );

        match self.ctx.directory.set(&user_id, &self.ctx.node_id).await {
            Ok(()) => tracing::info!(
                "Registered user {} on server {}",
                user_id,
                self.ctx.node_id
            ),
            Err(e) => tracing::error!("Error registering user {}: {}", user_id, e),
        }

        let connected_users = self.notifier.connected_users().await;
        let welcome = ChatMessage::info(
            self.ctx.node_id.as_str(),
            connection_id.as_str(),
            user_id.as_str(),
            self.ctx.registry.count(),
            connected_users,
            now,
        );
        self.notifier.send_to_connection(&connection_id, &welcome);
        self.notifier.user_joined(&user_id).await;

        Ok(user_id)
    }
}
