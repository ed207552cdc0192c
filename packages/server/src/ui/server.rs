//! Server execution logic.

use std::{future::Future, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    domain::CallTable,
    usecase::{
        CallSignalingUseCase, ConnectUserUseCase, DeliverRelayedUseCase, DisconnectUserUseCase,
        NodeContext, RouteMessageUseCase,
    },
};

use super::{
    handler::{health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Realtime messaging node
///
/// WebSocket の受け付けに加えて、次のバックグラウンドタスクを動かします。
///
/// - 自ノードのチャンネルの購読と、届いたメッセージのローカル配送
/// - 期限切れ通話の定期回収
///
/// # Example
///
/// ```ignore
/// let ctx = NodeContext::new(node_id, registry, directory, relay, clock);
/// let server = Server::new(ctx, Duration::from_secs(3600), Duration::from_secs(60));
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    ctx: NodeContext,
    /// ConnectUserUseCase（接続のユースケース）
    connect_user_usecase: Arc<ConnectUserUseCase>,
    /// DisconnectUserUseCase（切断のユースケース）
    disconnect_user_usecase: Arc<DisconnectUserUseCase>,
    /// RouteMessageUseCase（受信メッセージ振り分けのユースケース）
    route_message_usecase: Arc<RouteMessageUseCase>,
    /// DeliverRelayedUseCase（中継メッセージ配送のユースケース）
    deliver_relayed_usecase: Arc<DeliverRelayedUseCase>,
    /// CallSignalingUseCase（シグナリングのユースケース）
    call_signaling_usecase: Arc<CallSignalingUseCase>,
    call_sweep_interval: Duration,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `ctx` - ノードのコンテキスト（Registry・Directory・Relay・時計）
    /// * `call_ttl` - 通話レコードの最大保持期間
    /// * `call_sweep_interval` - 期限切れ通話の回収間隔
    pub fn new(ctx: NodeContext, call_ttl: Duration, call_sweep_interval: Duration) -> Self {
        // 発信・応答の処理と中継シグナルの配送で同じ通話表を共有する
        let calls = Arc::new(CallTable::new());
        let call_signaling_usecase = Arc::new(CallSignalingUseCase::new(
            ctx.clone(),
            calls.clone(),
            call_ttl,
        ));
        Self {
            connect_user_usecase: Arc::new(ConnectUserUseCase::new(ctx.clone())),
            disconnect_user_usecase: Arc::new(DisconnectUserUseCase::new(ctx.clone())),
            route_message_usecase: Arc::new(RouteMessageUseCase::new(
                ctx.clone(),
                call_signaling_usecase.clone(),
            )),
            deliver_relayed_usecase: Arc::new(DeliverRelayedUseCase::new(ctx.clone(), calls)),
            call_signaling_usecase,
            call_sweep_interval,
            ctx,
        }
    }

    /// Run the node until Ctrl+C or SIGTERM
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind, if the relay subscription cannot be
    /// opened, or if there's an error during server execution.
    pub async fn run(
        self,
        host: String,
        port: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.run_with_listener(listener, shutdown_signal()).await
    }

    /// Run the node on an already bound listener until `shutdown` resolves
    ///
    /// 終了時には自ノードに接続中のユーザーを Presence Directory から外します。
    pub async fn run_with_listener<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let subscription = self.ctx.relay.subscribe(&self.ctx.node_id).await?;
        let deliver_relayed = self.deliver_relayed_usecase.clone();
        let relay_task = tokio::spawn(async move { deliver_relayed.run(subscription).await });

        let call_signaling = self.call_signaling_usecase.clone();
        let sweep_interval = self.call_sweep_interval;
        let sweep_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                call_signaling.sweep_expired();
            }
        });

        let app_state = Arc::new(AppState {
            node_id: self.ctx.node_id.clone(),
            clock: self.ctx.clock.clone(),
            connect_user_usecase: self.connect_user_usecase,
            disconnect_user_usecase: self.disconnect_user_usecase.clone(),
            route_message_usecase: self.route_message_usecase,
        });

        let app = Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state);

        tracing::info!(
            "Server {} listening on {}",
            self.ctx.node_id,
            listener.local_addr()?
        );

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        sweep_task.abort();
        relay_task.abort();
        self.disconnect_user_usecase.deregister_node().await;
        served?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
