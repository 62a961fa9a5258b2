use std::time::{Duration, Instant};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::storage::Item;

/// Wire format of a deadline, as produced by a date input.
pub const DEADLINE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn parse_deadline(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), DEADLINE_FORMAT).ok()
}

/// Today's calendar date in the local zone, falling back to UTC when the
/// local offset cannot be determined.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// A dated item whose deadline day is already behind us.
pub fn is_expired(item: &Item, today: Date) -> bool {
    item.deadline_date().is_some_and(|date| date < today)
}

fn is_retained(item: &Item, today: Date) -> bool {
    if item.is_permanent {
        return true;
    }
    // Non-permanent records without a usable date never survive a sweep.
    item.deadline_date().is_some_and(|date| date >= today)
}

pub fn sweep(items: Vec<Item>, today: Date) -> Vec<Item> {
    items
        .into_iter()
        .filter(|item| is_retained(item, today))
        .collect()
}

/// Wall-clock cadence for the periodic sweep while the TUI is open.
#[derive(Debug)]
pub struct SweepSchedule {
    interval: Duration,
    last_run: Instant,
}

impl SweepSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: Instant::now(),
        }
    }

    /// Returns true once per elapsed interval.
    pub fn due(&mut self) -> bool {
        if self.last_run.elapsed() < self.interval {
            return false;
        }
        self.last_run = Instant::now();
        true
    }
}
