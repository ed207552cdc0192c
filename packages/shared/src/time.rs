//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current time in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock from a Unix timestamp in milliseconds.
    ///
    /// Out-of-range values fall back to the Unix epoch.
    pub fn from_millis(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: DateTime::from_timestamp_millis(fixed_time_millis).unwrap_or_default(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_time
    }
}

/// Deserialize an optional timestamp without ever failing.
///
/// Accepts RFC 3339 strings and Unix milliseconds. Anything else (including values
/// a client made up) becomes `None`, so the server can stamp its own time.
pub fn deserialize_lenient_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Stamped {
        #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
        timestamp: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_system_clock_returns_increasing_timestamps() {
        // テスト項目: SystemClock が呼び出すたびに増加するタイムスタンプを返す
        // given (前提条件):
        let clock = SystemClock;

        // when (操作):
        let t1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let t2 = clock.now();

        // then (期待する結果):
        assert!(t2 >= t1);
    }

    #[test]
    fn test_fixed_clock_returns_fixed_timestamp() {
        // テスト項目: FixedClock が固定されたタイムスタンプを返す
        // given (前提条件):
        let clock = FixedClock::from_millis(1_672_531_200_000);

        // when (操作):
        let t1 = clock.now();
        let t2 = clock.now();

        // then (期待する結果):
        assert_eq!(t1, t2);
        assert_eq!(t1.timestamp_millis(), 1_672_531_200_000);
    }

    #[test]
    fn test_lenient_timestamp_accepts_rfc3339_and_millis() {
        // テスト項目: RFC 3339 文字列とミリ秒の数値の両方を受け付ける
        // given (前提条件):
        let rfc = r#"{"timestamp":"2023-01-01T00:00:00Z"}"#;
        let millis = r#"{"timestamp":1672531200000}"#;

        // when (操作):
        let a: Stamped = serde_json::from_str(rfc).unwrap();
        let b: Stamped = serde_json::from_str(millis).unwrap();

        // then (期待する結果):
        assert_eq!(a.timestamp, b.timestamp);
        assert!(a.timestamp.is_some());
    }

    #[test]
    fn test_lenient_timestamp_ignores_garbage() {
        // テスト項目: 解釈できない値はエラーにせず None として扱う
        // given (前提条件):
        let garbage = r#"{"timestamp":{"nested":true}}"#;
        let missing = r#"{}"#;

        // when (操作):
        let a: Stamped = serde_json::from_str(garbage).unwrap();
        let b: Stamped = serde_json::from_str(missing).unwrap();

        // then (期待する結果):
        assert!(a.timestamp.is_none());
        assert!(b.timestamp.is_none());
    }
}
