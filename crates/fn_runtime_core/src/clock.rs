use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};

/// Source of wall-clock time for deadline arithmetic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_epoch_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall clock anchored once and advanced by a monotonic timer.
///
/// Readings never go backwards even if the system clock is stepped, which
/// keeps `ExecutionContext::remaining_time` non-increasing.
#[derive(Debug)]
pub struct SystemClock {
    anchor_wall: DateTime<Utc>,
    anchor_instant: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor_wall: Utc::now(),
            anchor_instant: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.anchor_instant.elapsed()).unwrap_or(Duration::zero());
        self.anchor_wall + elapsed
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at_epoch_ms(epoch_ms: i64) -> Self {
        let now = DateTime::<Utc>::from_timestamp_millis(epoch_ms).unwrap_or_default();
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance_ms(&self, millis: i64) {
        if let Ok(mut now) = self.now.lock() {
            *now += Duration::milliseconds(millis);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
