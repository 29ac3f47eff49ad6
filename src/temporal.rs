//! Calendar arithmetic
//!
//! All comparisons happen on `NaiveDate` values produced by
//! [`EngineContext::day_of`](crate::clock::EngineContext::day_of), so two
//! instants on the same local calendar day are always equal here.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{ChartPeriod, DegradationFlag};

/// Window used for `All` when there is no log history
pub const DEFAULT_ALL_TIME_DAYS: i64 = 365;

/// Inclusive day span between two dates (0 when `end` precedes `start`)
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        0
    } else {
        (end - start).num_days() + 1
    }
}

/// Every date from `start` to `end`, both included
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    std::iter::successors(Some(start), |day| day.succ_opt())
        .take(days_inclusive(start, end) as usize)
        .collect()
}

/// Sunday on or before `date`, clamped to the first representable day
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = Duration::days(date.weekday().num_days_from_sunday() as i64);
    date.checked_sub_signed(back).unwrap_or(NaiveDate::MIN)
}

/// The dates of the Sunday-start week containing `date`.
///
/// Always seven days, except at the edges of the calendar where the week is
/// cut short rather than overflowing.
pub fn week_of(date: NaiveDate) -> Vec<NaiveDate> {
    std::iter::successors(Some(week_start(date)), |day| day.succ_opt())
        .take(7)
        .collect()
}

/// Start and end of a trailing window of `days` ending on `end`.
/// The start is clamped to the first representable day.
pub fn trailing_window(end: NaiveDate, days: i64) -> (NaiveDate, NaiveDate) {
    let back = Duration::days(days.max(1) - 1);
    (end.checked_sub_signed(back).unwrap_or(NaiveDate::MIN), end)
}

/// Complete inclusive daily span of a chart period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub period: ChartPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dates: Vec<NaiveDate>,
}

impl PeriodRange {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// Resolve a period to its date span ending today.
///
/// `All` starts at the earliest logged day; with no logs (or only future
/// logs) it falls back to the last [`DEFAULT_ALL_TIME_DAYS`] days.
pub fn period_range(
    period: ChartPeriod,
    today: NaiveDate,
    earliest_log: Option<NaiveDate>,
) -> PeriodRange {
    let start_date = match period.span_days() {
        Some(days) => trailing_window(today, days).0,
        None => match earliest_log {
            Some(earliest) if earliest <= today => earliest,
            _ => trailing_window(today, DEFAULT_ALL_TIME_DAYS).0,
        },
    };

    PeriodRange {
        period,
        start_date,
        end_date: today,
        dates: date_range(start_date, today),
    }
}

/// One cell of a month calendar grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCell {
    /// `None` for leading/trailing padding
    pub date: Option<NaiveDate>,
    pub is_today: bool,
    pub is_future: bool,
}

impl CalendarCell {
    const EMPTY: CalendarCell = CalendarCell {
        date: None,
        is_today: false,
        is_future: false,
    };

    pub fn day(&self) -> Option<u32> {
        self.date.map(|d| d.day())
    }
}

/// Sunday-start month grid, seven columns per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<[CalendarCell; 7]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<DegradationFlag>,
}

/// Build the calendar grid for a month. An invalid year/month falls back to today's month.
pub fn month_grid(year: i32, month: u32, today: NaiveDate) -> MonthGrid {
    let (first, flag) = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(first) => (first, None),
        None => {
            tracing::warn!(year, month, "Invalid calendar month, using current month");
            (
                today.with_day(1).unwrap_or(today),
                Some(DegradationFlag::InvalidCalendarMonth),
            )
        }
    };

    let days_in_month = days_in_month(first);
    let leading = first.weekday().num_days_from_sunday() as usize;
    let total_cells = (leading + days_in_month).div_ceil(7) * 7;

    let mut weeks = Vec::with_capacity(total_cells / 7);
    let mut row = [CalendarCell::EMPTY; 7];

    for index in 0..total_cells {
        let cell = if index < leading || index >= leading + days_in_month {
            CalendarCell::EMPTY
        } else {
            let date = first + Duration::days((index - leading) as i64);
            CalendarCell {
                date: Some(date),
                is_today: date == today,
                is_future: date > today,
            }
        };
        row[index % 7] = cell;
        if index % 7 == 6 {
            weeks.push(row);
            row = [CalendarCell::EMPTY; 7];
        }
    }

    MonthGrid {
        year: first.year(),
        month: first.month(),
        weeks,
        flag,
    }
}

fn days_in_month(first: NaiveDate) -> usize {
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next.map(|n| (n - first).num_days() as usize).unwrap_or(31)
}
