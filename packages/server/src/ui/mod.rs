//! UI 層（axum のルーティングと接続ハンドラー）

pub mod handler;
pub mod server;
pub mod signal;
pub mod state;

pub use server::Server;
