//! Injected date reference.
//!
//! Everything that needs "today" or "previous month start" takes a
//! [`DateReference`] so request validation and summary stamping stay
//! deterministic under test.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};

pub trait DateReference: Send + Sync {
    /// The current reporting date.
    fn today(&self) -> NaiveDate;

    /// The current instant in the fixed reference time zone (UTC).
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDates;

impl DateReference for SystemDates {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A pinned instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedDates {
    now: DateTime<Utc>,
}

impl FixedDates {
    pub fn at(now: DateTime<Utc>) -> Self {
        FixedDates { now }
    }

    /// Pin to midnight UTC on the given date.
    pub fn on(date: NaiveDate) -> Self {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is a valid time");
        FixedDates {
            now: midnight.and_utc(),
        }
    }
}

impl DateReference for FixedDates {
    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.now
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .expect("day 1 exists in every month")
}

/// Last day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.checked_sub_days(Days::new(1)))
        .expect("previous day of a month start exists")
}

/// First day of the month before the one containing `today`.
pub fn previous_month_start(today: NaiveDate) -> NaiveDate {
    let first = month_start(today);
    let last_of_previous = first
        .checked_sub_days(Days::new(1))
        .expect("a day precedes every month start in range");
    month_start(last_of_previous)
}
