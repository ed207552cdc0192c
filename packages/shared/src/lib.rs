//! Kakehashi の各パッケージから共有されるユーティリティ。
//!
//! - `logger`: tracing subscriber の初期化
//! - `time`: 時刻取得の抽象化（テスト用の固定クロックを含む）

pub mod logger;
pub mod time;
