//! Presence Directory の実装

pub mod inmemory;
pub mod redis;

pub use self::inmemory::InMemoryPresenceDirectory;
pub use self::redis::RedisPresenceDirectory;
