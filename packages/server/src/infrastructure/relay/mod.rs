//! Cross-Node Relay の実装
//!
//! - `inmemory`: 同一プロセス内の複数ノードを繋ぐハブ（単一ノード起動・結合テスト用）
//! - `redis`: Redis pub/sub

pub mod inmemory;
pub mod redis;

pub use self::inmemory::InMemoryRelayHub;
pub use self::redis::RedisMessageRelay;
