//! Kakehashi のリアルタイムメッセージングノード
//!
//! WebSocket で接続したユーザー同士のチャットと WebRTC シグナリングを扱います。
//! 複数ノードで動かす場合、ユーザーの所属ノードは Presence Directory で共有し、
//! 他ノードのユーザー宛てのメッセージはノード間 Relay で中継します。
//!
//! - `domain`: 値オブジェクト・メッセージモデル・Session Registry・外部コラボレーターの trait
//! - `infrastructure`: Presence Directory / Relay の実装（インメモリ・Redis）
//! - `usecase`: 接続・切断・振り分け・シグナリング・中継配送
//! - `ui`: axum のルーティングと WebSocket ハンドラー

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
