//! ノードの設定

use std::time::Duration;

use thiserror::Error;

/// 設定値のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// ノードの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 未指定（または空白）なら起動時に UUID を採番する
    pub node_id: Option<String>,
    /// 未指定ならインメモリのバックエンドで単独動作する
    pub redis_url: Option<String>,
    /// Presence Directory / Relay の各呼び出しの上限時間
    pub collaborator_timeout: Duration,
    /// 通話レコードの最大保持期間
    pub call_ttl: Duration,
    /// 期限切れ通話の回収間隔
    pub call_sweep_interval: Duration,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            node_id: None,
            redis_url: None,
            collaborator_timeout: Duration::from_millis(2000),
            call_ttl: Duration::from_secs(3600),
            call_sweep_interval: Duration::from_secs(60),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collaborator_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("collaborator timeout"));
        }
        if self.call_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("call ttl"));
        }
        if self.call_sweep_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("call sweep interval"));
        }
        Ok(())
    }
}
