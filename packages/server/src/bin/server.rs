//! Kakehashi realtime messaging node.
//!
//! Accepts WebSocket connections, routes chat and WebRTC signaling between users and
//! relays messages to other nodes through Redis. Without a Redis URL the node runs
//! standalone with in-memory backends.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kakehashi-server
//! cargo run --bin kakehashi-server -- --port 3000 --node-id node-a --redis-url redis://127.0.0.1:6379
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use kakehashi_server::{
    config::ServerConfig,
    domain::{NodeId, SessionRegistry},
    infrastructure::Backends,
    ui::Server,
    usecase::NodeContext,
};
use kakehashi_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "kakehashi-server")]
#[command(about = "Realtime messaging node with cross-node relay and WebRTC signaling", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "KAKEHASHI_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "KAKEHASHI_PORT", default_value = "8080")]
    port: u16,

    /// Node identity (a random UUID is used when omitted)
    #[arg(long, env = "KAKEHASHI_NODE_ID")]
    node_id: Option<String>,

    /// Redis URL for the presence directory and the relay
    #[arg(long, env = "KAKEHASHI_REDIS_URL")]
    redis_url: Option<String>,

    /// Timeout for each presence directory / relay call (milliseconds)
    #[arg(long, env = "KAKEHASHI_COLLABORATOR_TIMEOUT_MS", default_value = "2000")]
    collaborator_timeout_ms: u64,

    /// Maximum age of a call record (seconds)
    #[arg(long, env = "KAKEHASHI_CALL_TTL_SECS", default_value = "3600")]
    call_ttl_secs: u64,

    /// Interval between expired call sweeps (seconds)
    #[arg(long, env = "KAKEHASHI_CALL_SWEEP_INTERVAL_SECS", default_value = "60")]
    call_sweep_interval_secs: u64,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, env = "KAKEHASHI_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            node_id: args.node_id,
            redis_url: args.redis_url,
            collaborator_timeout: Duration::from_millis(args.collaborator_timeout_ms),
            call_ttl: Duration::from_secs(args.call_ttl_secs),
            call_sweep_interval: Duration::from_secs(args.call_sweep_interval_secs),
            log_level: args.log_level,
        }
    }
}

#[tokio::main]
async fn main() {
    let config = ServerConfig::from(Args::parse());

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    // Initialize dependencies in order:
    // 1. Node identity
    // 2. Presence Directory / Relay
    // 3. Node context (Session Registry, clock)
    // 4. Server

    // 1. Resolve node identity
    let node_id = NodeId::resolve(config.node_id.clone());
    tracing::info!("Server ID: {}", node_id);

    // 2. Connect backends
    let backends = match Backends::connect(config.redis_url.as_deref()).await {
        Ok(backends) => backends.with_timeout(config.collaborator_timeout),
        Err(e) => {
            tracing::error!("Failed to connect backends: {}", e);
            std::process::exit(1);
        }
    };

    // 3. Create node context
    let ctx = NodeContext::new(
        node_id,
        Arc::new(SessionRegistry::new()),
        backends.directory,
        backends.relay,
        Arc::new(SystemClock),
    );

    // 4. Create and run the server
    let server = Server::new(ctx, config.call_ttl, config.call_sweep_interval);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
