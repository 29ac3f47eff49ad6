//! Time-series aggregation
//!
//! Buckets a habit's daily totals into a chart series covering every date of
//! the requested period. Gaps are `None`, never omitted. Long periods are
//! rendered at reduced resolution by merging consecutive days into buckets of
//! `ceil(total_days / target_buckets)` days.
//!
//! - `7D`, `30D`: one point per day
//! - `90D`: ~15 buckets
//! - `1Y`: weekly buckets
//! - `All`: at least weekly, widened to cap the bucket count

pub mod heatmap;
pub mod scale;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::EngineContext;
use crate::config::ChartConfig;
use crate::daily::DailyTotals;
use crate::money;
use crate::temporal;
use crate::types::{ChartPeriod, DegradationFlag, RateType};

pub use heatmap::{heatmap, intensity, HeatCell};

/// How a habit's daily value should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Duration,
    Count,
    Completion,
}

impl ValueKind {
    pub fn for_rate_type(rate_type: RateType) -> Self {
        match rate_type {
            RateType::Duration => ValueKind::Duration,
            RateType::Distance | RateType::Count => ValueKind::Count,
            RateType::Binary | RateType::Unknown => ValueKind::Completion,
        }
    }
}

/// Which figure the chart plots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartView {
    /// Units or completions
    Value,
    /// Earnings in display currency, with running totals
    Earnings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// First day of the bucket
    pub date: NaiveDate,
    /// Last day of the bucket (equal to `date` for daily series)
    pub end_date: NaiveDate,
    pub value: Option<f64>,
    pub has_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub period: ChartPeriod,
    pub view: ChartView,
    pub value_kind: ValueKind,
    /// Days merged into each point
    pub bucket_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub points: Vec<ChartPoint>,
    pub display_max: f64,
    /// Running earnings per point (earnings view only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_earnings_micros: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_earnings: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<DegradationFlag>,
}

impl ChartSeries {
    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn stats(&self) -> SeriesStats {
        SeriesStats::from_points(&self.points)
    }
}

/// Summary figures for a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub total: f64,
    /// Mean over points that have data
    pub average: f64,
    pub best: Option<ChartPoint>,
    pub points_with_data: u32,
}

impl SeriesStats {
    pub fn from_points(points: &[ChartPoint]) -> Self {
        let with_data: Vec<&ChartPoint> = points.iter().filter(|p| p.value.is_some()).collect();
        let total: f64 = with_data.iter().filter_map(|p| p.value).sum();
        let average = if with_data.is_empty() {
            0.0
        } else {
            total / with_data.len() as f64
        };
        let best = with_data
            .iter()
            .copied()
            .fold(None::<&ChartPoint>, |best, p| match best {
                Some(b) if b.value >= p.value => Some(b),
                _ => Some(p),
            })
            .cloned();

        Self {
            total,
            average,
            best,
            points_with_data: with_data.len() as u32,
        }
    }
}

/// Days per bucket for a period spanning `total_days`
pub fn bucket_days(period: ChartPeriod, total_days: usize, config: &ChartConfig) -> usize {
    let total = total_days.max(1);
    match period {
        ChartPeriod::Week | ChartPeriod::Month => 1,
        ChartPeriod::Quarter => total.div_ceil(config.quarter_buckets.max(1) as usize),
        ChartPeriod::Year => total.div_ceil(config.year_buckets.max(1) as usize),
        ChartPeriod::All => total
            .div_ceil(config.all_time_buckets.max(1) as usize)
            .max(7),
    }
}

/// Build a chart series for one habit.
///
/// `totals` must come from the habit's logs only, aggregated with its
/// resolved rate type.
pub fn build_series(
    totals: &DailyTotals,
    value_kind: ValueKind,
    period: ChartPeriod,
    view: ChartView,
    ctx: &EngineContext,
    config: &ChartConfig,
) -> ChartSeries {
    let range = temporal::period_range(period, ctx.today(), totals.first_day());
    let width = bucket_days(period, range.len(), config);

    let buckets: Vec<Bucket> = range
        .dates
        .chunks(width)
        .filter_map(|days| Bucket::collect(days, totals))
        .collect();

    let points: Vec<ChartPoint> = buckets
        .iter()
        .map(|bucket| ChartPoint {
            date: bucket.start,
            end_date: bucket.end,
            value: bucket.value(view, value_kind, width),
            has_data: bucket.completions > 0,
        })
        .collect();

    let max_value = points
        .iter()
        .filter_map(|p| p.value)
        .fold(0.0, f64::max);

    let (display_max, cumulative_micros) = match view {
        ChartView::Value => (scale::value_display_max(max_value, value_kind), None),
        ChartView::Earnings => {
            let mut running = 0i64;
            let cumulative: Vec<i64> = buckets
                .iter()
                .map(|b| {
                    running = running.saturating_add(b.earnings_micros);
                    running
                })
                .collect();
            (scale::currency_display_max(max_value), Some(cumulative))
        }
    };

    let cumulative_earnings = cumulative_micros.as_ref().map(|c| {
        c.iter()
            .map(|m| money::micros_to_display_value(*m))
            .collect()
    });

    ChartSeries {
        period,
        view,
        value_kind,
        bucket_days: width as u32,
        start_date: range.start_date,
        end_date: range.end_date,
        points,
        display_max,
        cumulative_earnings_micros: cumulative_micros,
        cumulative_earnings,
        flags: Vec::new(),
    }
}

struct Bucket {
    start: NaiveDate,
    end: NaiveDate,
    quantity: f64,
    completions: u32,
    earnings_micros: i64,
}

impl Bucket {
    fn collect(days: &[NaiveDate], totals: &DailyTotals) -> Option<Self> {
        let (&start, &end) = (days.first()?, days.last()?);
        let mut bucket = Bucket {
            start,
            end,
            quantity: 0.0,
            completions: 0,
            earnings_micros: 0,
        };
        for total in days.iter().filter_map(|d| totals.get(*d)) {
            bucket.quantity += total.quantity;
            bucket.completions += total.completions;
            bucket.earnings_micros = bucket.earnings_micros.saturating_add(total.earnings_micros);
        }
        Some(bucket)
    }

    fn value(&self, view: ChartView, kind: ValueKind, width: usize) -> Option<f64> {
        if self.completions == 0 {
            return None;
        }
        match view {
            ChartView::Earnings => Some(money::micros_to_display_value(self.earnings_micros)),
            // merged binary buckets report whether anything was completed
            ChartView::Value if kind == ValueKind::Completion && width > 1 => Some(1.0),
            ChartView::Value => Some(self.quantity),
        }
    }
}

/// Number of days between the first and last point of a series, inclusive
pub fn span_days(series: &ChartSeries) -> i64 {
    temporal::days_inclusive(series.start_date, series.end_date)
}

/// The point whose bucket contains `date`, if the series covers it
pub fn bucket_for(series: &ChartSeries, date: NaiveDate) -> Option<&ChartPoint> {
    if date < series.start_date || date > series.end_date {
        return None;
    }
    let offset = (date - series.start_date).num_days() as usize;
    series.points.get(offset / series.bucket_days.max(1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogEntry;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn ctx() -> EngineContext {
        EngineContext::utc(Utc.with_ymd_and_hms(2024, 1, 17, 21, 0, 0).unwrap())
    }

    fn log(month: u32, day: u32, units: Option<f64>, earnings: i64) -> LogEntry {
        LogEntry::new(
            format!("{month}-{day}"),
            "h",
            Utc.with_ymd_and_hms(2024, month, day, 9, 0, 0).unwrap(),
            units,
            earnings,
        )
    }

    fn build(
        logs: &[LogEntry],
        rate_type: RateType,
        period: ChartPeriod,
        view: ChartView,
    ) -> ChartSeries {
        let totals = DailyTotals::from_logs(logs, rate_type, &ctx());
        build_series(
            &totals,
            ValueKind::for_rate_type(rate_type),
            period,
            view,
            &ctx(),
            &ChartConfig::default(),
        )
    }

    #[test]
    fn test_week_series_fills_gaps() {
        let logs = vec![
            log(1, 15, Some(30.0), 0),
            log(1, 16, Some(45.0), 0),
            log(1, 17, Some(60.0), 0),
        ];
        let series = build(&logs, RateType::Duration, ChartPeriod::Week, ChartView::Value);

        assert_eq!(series.points.len(), 7);
        assert_eq!(series.bucket_days, 1);
        assert_eq!(series.value_kind, ValueKind::Duration);
        assert_eq!(
            series.values(),
            vec![None, None, None, None, Some(30.0), Some(45.0), Some(60.0)]
        );
        assert!(!series.points[0].has_data);
        assert_eq!(series.display_max, 81.0);
        assert_eq!(series.cumulative_earnings_micros, None);
    }

    #[test]
    fn test_empty_series() {
        let series = build(&[], RateType::Count, ChartPeriod::Month, ChartView::Value);
        assert_eq!(series.points.len(), 30);
        assert!(series.points.iter().all(|p| p.value.is_none()));
        assert_eq!(series.display_max, scale::DEFAULT_VALUE_MAX);

        let all = build(&[], RateType::Count, ChartPeriod::All, ChartView::Value);
        assert_eq!(span_days(&all), 365);
    }

    #[test]
    fn test_quarter_buckets() {
        let series = build(&[], RateType::Count, ChartPeriod::Quarter, ChartView::Value);
        assert_eq!(series.bucket_days, 6);
        assert_eq!(series.points.len(), 15);
    }

    #[test]
    fn test_year_is_weekly() {
        let logs = vec![log(1, 10, Some(2.0), 0), log(1, 11, Some(3.0), 0)];
        let series = build(&logs, RateType::Distance, ChartPeriod::Year, ChartView::Value);
        assert_eq!(series.bucket_days, 7);
        assert_eq!(series.points.len(), 53);
        // the last bucket holds the single most recent day
        let last = series.points.last().unwrap();
        assert_eq!(last.date, last.end_date);
        assert_eq!(last.end_date, ctx().today());

        let jan10 = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let jan11 = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        // both days land in the same weekly bucket
        assert_eq!(bucket_for(&series, jan10), bucket_for(&series, jan11));
        assert_eq!(bucket_for(&series, jan10).unwrap().value, Some(5.0));
        let sum: f64 = series.points.iter().filter_map(|p| p.value).sum();
        assert_eq!(sum, 5.0);
    }

    #[test]
    fn test_merged_binary_bucket_is_any_completion() {
        let logs = vec![
            log(1, 1, None, 0),
            log(1, 2, None, 0),
            log(1, 2, None, 0),
        ];
        let series = build(&logs, RateType::Binary, ChartPeriod::Quarter, ChartView::Value);
        let values: Vec<f64> = series.points.iter().filter_map(|p| p.value).collect();
        assert!(values.iter().all(|v| *v == 1.0));

        let daily = build(&logs, RateType::Binary, ChartPeriod::Month, ChartView::Value);
        let jan2 = bucket_for(&daily, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()).unwrap();
        assert_eq!(jan2.value, Some(2.0));
    }

    #[test]
    fn test_earnings_view_cumulative() {
        let logs = vec![
            log(1, 11, Some(1.0), 1_250_000),
            log(1, 13, Some(1.0), 500_000),
            log(1, 13, Some(1.0), 500_000),
            log(1, 17, Some(1.0), 2_000_000),
        ];
        let series = build(&logs, RateType::Count, ChartPeriod::Week, ChartView::Earnings);
        assert_eq!(
            series.values(),
            vec![Some(1.25), None, Some(1.0), None, None, None, Some(2.0)]
        );
        assert_eq!(
            series.cumulative_earnings_micros,
            Some(vec![
                1_250_000, 1_250_000, 2_250_000, 2_250_000, 2_250_000, 2_250_000, 4_250_000
            ])
        );
        assert_eq!(
            series.cumulative_earnings.as_ref().unwrap().last(),
            Some(&4.25)
        );
        // 2.00 * 1.5 = 3.00 -> multiple of 0.50
        assert_eq!(series.display_max, 3.0);
    }

    #[test]
    fn test_all_time_starts_at_first_log() {
        let logs = vec![log(1, 3, Some(1.0), 0)];
        let series = build(&logs, RateType::Count, ChartPeriod::All, ChartView::Value);
        assert_eq!(series.start_date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(series.bucket_days, 7);
        assert_eq!(series.points.len(), 3);
    }

    #[test]
    fn test_stats() {
        let logs = vec![
            log(1, 15, Some(30.0), 0),
            log(1, 16, Some(45.0), 0),
            log(1, 17, Some(60.0), 0),
        ];
        let stats = build(&logs, RateType::Duration, ChartPeriod::Week, ChartView::Value).stats();
        assert_eq!(stats.total, 135.0);
        assert_eq!(stats.average, 45.0);
        assert_eq!(stats.points_with_data, 3);
        assert_eq!(stats.best.unwrap().value, Some(60.0));
    }
}
