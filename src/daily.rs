//! Per-day totals
//!
//! Collapses a log set into one record per local calendar day. Goal progress,
//! completion rate, chart series and the heatmap all read from this.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::EngineContext;
use crate::temporal;
use crate::types::{LogEntry, RateType, Schedule};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DayTotal {
    /// Sum of units (or completions for binary habits)
    pub quantity: f64,
    /// Number of log entries
    pub completions: u32,
    pub earnings_micros: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyTotals {
    days: BTreeMap<NaiveDate, DayTotal>,
}

impl DailyTotals {
    pub fn from_logs<'a, I>(logs: I, rate_type: RateType, ctx: &EngineContext) -> Self
    where
        I: IntoIterator<Item = &'a LogEntry>,
    {
        let mut days: BTreeMap<NaiveDate, DayTotal> = BTreeMap::new();
        for log in logs {
            let entry = days.entry(ctx.day_of(log.timestamp)).or_default();
            entry.quantity += log.quantity(rate_type);
            entry.completions += 1;
            entry.earnings_micros = entry.earnings_micros.saturating_add(log.total_earnings_micros);
        }
        Self { days }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayTotal> {
        self.days.get(&date)
    }

    pub fn quantity_on(&self, date: NaiveDate) -> f64 {
        self.days.get(&date).map(|d| d.quantity).unwrap_or(0.0)
    }

    pub fn has_log(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DayTotal)> {
        self.days.iter()
    }

    /// Sum of quantities between two dates, both included
    pub fn quantity_between(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        if end < start {
            return 0.0;
        }
        self.days.range(start..=end).map(|(_, d)| d.quantity).sum()
    }

    /// Largest single-day value over the whole history
    pub fn max_quantity(&self) -> f64 {
        self.days.values().map(|d| d.quantity).fold(0.0, f64::max)
    }

    pub fn total_earnings_micros(&self) -> i64 {
        crate::money::sum_micros(self.days.values().map(|d| d.earnings_micros))
    }
}

/// Share of scheduled days in the trailing window that have a log.
///
/// The window ends today and never starts before `created_on`. Logged days
/// outside the schedule do not count. Returns 0.0 when the window holds no
/// scheduled day.
pub fn completion_rate(
    totals: &DailyTotals,
    schedule: &Schedule,
    created_on: NaiveDate,
    today: NaiveDate,
    window_days: u32,
) -> f64 {
    let (window_start, _) = temporal::trailing_window(today, window_days as i64);
    let start = window_start.max(created_on);

    let (scheduled, completed) = temporal::date_range(start, today)
        .into_iter()
        .filter(|date| schedule.is_scheduled(*date))
        .fold((0u32, 0u32), |(scheduled, completed), date| {
            (scheduled + 1, completed + totals.has_log(date) as u32)
        });

    if scheduled == 0 {
        0.0
    } else {
        completed as f64 / scheduled as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc, Weekday};

    fn ctx() -> EngineContext {
        EngineContext::utc(Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap())
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn log(day: u32, hour: u32, units: Option<f64>) -> LogEntry {
        LogEntry::new(
            format!("{day}-{hour}"),
            "h",
            Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
            units,
            250_000,
        )
    }

    #[test]
    fn test_totals_merge_same_day() {
        let logs = vec![log(5, 8, Some(20.0)), log(5, 19, Some(25.0)), log(6, 8, None)];
        let totals = DailyTotals::from_logs(&logs, RateType::Duration, &ctx());

        let jan5 = totals.get(d(5)).unwrap();
        assert_eq!(jan5.quantity, 45.0);
        assert_eq!(jan5.completions, 2);
        assert_eq!(jan5.earnings_micros, 500_000);
        assert_eq!(totals.quantity_on(d(6)), 0.0);
        assert!(totals.has_log(d(6)));
        assert_eq!(totals.max_quantity(), 45.0);
        assert_eq!(totals.total_earnings_micros(), 750_000);
        assert_eq!(totals.quantity_between(d(1), d(31)), 45.0);
    }

    #[test]
    fn test_binary_counts_completions() {
        let logs = vec![log(5, 8, Some(99.0)), log(5, 9, None)];
        let totals = DailyTotals::from_logs(&logs, RateType::Binary, &ctx());
        assert_eq!(totals.quantity_on(d(5)), 2.0);
    }

    #[test]
    fn test_completion_rate_bounded_by_creation() {
        let logs: Vec<_> = (11..=20).map(|day| log(day, 8, None)).collect();
        let totals = DailyTotals::from_logs(&logs, RateType::Binary, &ctx());
        let rate = completion_rate(&totals, &Schedule::daily(), d(11), d(20), 30);
        assert_eq!(rate, 1.0);

        let rate = completion_rate(&totals, &Schedule::daily(), d(1), d(20), 30);
        assert_eq!(rate, 0.5);
    }

    #[test]
    fn test_completion_rate_respects_schedule() {
        // Jan 15 and 17 2024 are Monday and Wednesday
        let logs = vec![log(15, 8, None), log(16, 8, None)];
        let totals = DailyTotals::from_logs(&logs, RateType::Binary, &ctx());
        let schedule = Schedule::on(&[Weekday::Mon, Weekday::Wed]);
        let rate = completion_rate(&totals, &schedule, d(14), d(20), 30);
        assert_eq!(rate, 0.5);

        let empty = completion_rate(&totals, &schedule, d(20), d(20), 30);
        assert_eq!(empty, 0.0);
    }
}
