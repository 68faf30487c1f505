use chrono::{Local, NaiveDate, Utc};

/// Source of "now" for ids and display dates.
pub trait Clock: Send {
    /// Unix time in milliseconds.
    fn now_millis(&self) -> i64;
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock frozen at one instant. Every call returns the same tick.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub millis: i64,
    pub date: NaiveDate,
}

impl FixedClock {
    #[must_use]
    pub fn new(millis: i64, date: NaiveDate) -> Self {
        Self { millis, date }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis
    }

    fn today(&self) -> NaiveDate {
        self.date
    }
}
