use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use std::sync::Mutex;

/// Wall-clock source. Day boundaries are taken at midnight in the
/// deployment's configured offset, so "today" is not always the UTC date.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset()).date_naive()
    }

    fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(utc);
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Clock that only moves when told to. Used by tests and local tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            offset: utc(),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // a poisoned clock still holds a valid instant
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}
