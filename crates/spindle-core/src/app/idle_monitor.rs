//! IdleMonitor - 非アクティブ検知
//!
//! While armed, a periodic tick at half the inactivity window checks how long
//! the worker has been idle. The monitor only reports; the dispatcher decides
//! what to send, and the coordinator decides whether to kill.

use std::future;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug)]
pub(crate) struct IdleMonitor {
    max_inactive: Duration,
    interval: Option<Interval>,
    last_activity: Instant,
}

impl IdleMonitor {
    pub(crate) fn new(max_inactive: Duration) -> Self {
        Self {
            max_inactive,
            interval: None,
            last_activity: Instant::now(),
        }
    }

    /// Start the periodic check. Returns false if it was already running.
    pub(crate) fn arm(&mut self) -> bool {
        if self.interval.is_some() {
            return false;
        }
        let period = (self.max_inactive / 2).max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.last_activity = Instant::now();
        true
    }

    pub(crate) fn disarm(&mut self) {
        self.interval = None;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Record activity. Ignored while disarmed.
    pub(crate) fn touch(&mut self) {
        if self.is_armed() {
            self.last_activity = Instant::now();
        }
    }

    /// Wait for the next check. Resolves to true when the worker has been idle
    /// for longer than the window. Never resolves while disarmed.
    pub(crate) async fn tick(&mut self) -> bool {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
                self.last_activity.elapsed() > self.max_inactive
            }
            None => future::pending().await,
        }
    }
}
