//! Clock port - 時刻の抽象化
//!
//! Task start timestamps come from here so tests can pin them with
//! `FixedClock`. Elapsed run times use the tokio monotonic clock instead.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch, with sub-millisecond precision.
    fn now_millis(&self) -> f64 {
        let now = self.now();
        now.timestamp_millis() as f64 + f64::from(now.timestamp_subsec_nanos() % 1_000_000) / 1e6
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant (テスト用).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    at: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}
