//! Goal progress
//!
//! Compares a habit's goal against its recent pace. Goals are normalized
//! between periods with the fixed day-count table in [`GoalPeriod::days`], so
//! a "10 reps/day" goal can be compared against a rolling 7-day actual.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::clock::EngineContext;
use crate::daily::DailyTotals;
use crate::money;
use crate::temporal;
use crate::types::{DegradationFlag, Goal, GoalPeriod, Habit, RateType, Resolved};

/// Rolling window for the current pace
pub const CURRENT_WINDOW_DAYS: i64 = 7;

/// Maximum history preceding the current window used for the baseline
pub const BASELINE_WINDOW_DAYS: i64 = 28;

const EPSILON: f64 = 1e-9;

/// The figure a habit's goal is reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalMetric {
    CompletionsPerWeek,
    UnitsPerDay,
    UnitsPerWeek,
}

impl GoalMetric {
    pub fn for_rate_type(rate_type: RateType) -> Self {
        match rate_type {
            RateType::Binary | RateType::Unknown => GoalMetric::CompletionsPerWeek,
            RateType::Duration | RateType::Count => GoalMetric::UnitsPerDay,
            RateType::Distance => GoalMetric::UnitsPerWeek,
        }
    }

    pub fn period(&self) -> GoalPeriod {
        match self {
            GoalMetric::UnitsPerDay => GoalPeriod::Day,
            GoalMetric::CompletionsPerWeek | GoalMetric::UnitsPerWeek => GoalPeriod::Week,
        }
    }
}

/// Convert an amount expressed per `from` into the equivalent per `to`
pub fn normalize_amount(amount: f64, from: GoalPeriod, to: GoalPeriod) -> f64 {
    amount / from.days() as f64 * to.days() as f64
}

impl Goal {
    pub fn per(&self, period: GoalPeriod) -> f64 {
        normalize_amount(self.amount, self.period, period)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Future,
    AtGoal,
    Partial,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekDay {
    pub date: NaiveDate,
    pub total: f64,
    pub status: DayStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalEarnings {
    /// Weekly earnings at the current pace
    pub current_micros: i64,
    /// Weekly earnings if the goal were met
    pub at_goal_micros: i64,
    /// `at_goal - current`; negative when ahead of goal
    pub gap_micros: i64,
    pub current_display: String,
    pub at_goal_display: String,
    pub gap_display: String,
}

impl GoalEarnings {
    fn new(current_micros: i64, at_goal_micros: i64) -> Self {
        let gap_micros = at_goal_micros.saturating_sub(current_micros);
        Self {
            current_micros,
            at_goal_micros,
            gap_micros,
            current_display: money::micros_to_display(current_micros),
            at_goal_display: money::micros_to_display(at_goal_micros),
            gap_display: money::micros_to_display(gap_micros),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub metric: GoalMetric,
    /// Current pace against goal, 0-100
    pub progress_pct: f64,
    /// Pace over the weeks before the current window; `None` without history
    pub baseline_x: Option<f64>,
    pub current_x: f64,
    pub goal_x: f64,
    /// Per-day amount implied by the goal
    pub daily_target: f64,
    /// Sunday-start week containing today
    pub current_week_days: Vec<WeekDay>,
    pub days_at_goal_this_week: u32,
    pub today_total: f64,
    pub today_remaining: f64,
    pub earnings: GoalEarnings,
    /// Set when the goal's period token was not recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<DegradationFlag>,
}

/// Goal progress for a habit; `None` when the habit has no goal.
///
/// `rate_type` is the habit's resolved rate type (see [`RateType::resolve`]).
pub fn goal_progress(
    habit: &Habit,
    rate_type: RateType,
    totals: &DailyTotals,
    ctx: &EngineContext,
) -> Option<GoalProgress> {
    let goal = habit.goal?;
    let Resolved { value: period, flag } = goal.period.resolve(&habit.id);
    let goal = Goal { period, ..goal };
    let metric = GoalMetric::for_rate_type(rate_type);
    let metric_days = metric.period().days() as f64;
    let today = ctx.today();
    let created_on = ctx.day_of(habit.created_at).min(today);

    let goal_x = goal.per(metric.period());
    let daily_target = goal.per(GoalPeriod::Day);

    let (window_start, _) = temporal::trailing_window(today, CURRENT_WINDOW_DAYS);
    let window_start = window_start.max(created_on);
    let window_days = temporal::days_inclusive(window_start, today).max(1) as f64;
    let window_total = totals.quantity_between(window_start, today);
    let current_x = window_total * metric_days / window_days;

    let baseline_x = baseline_per_day(totals, created_on, window_start).map(|d| d * metric_days);

    let progress_pct = if goal_x > 0.0 {
        (current_x / goal_x * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let current_week_days: Vec<WeekDay> = temporal::week_of(today)
        .into_iter()
        .map(|date| {
            let total = totals.quantity_on(date);
            WeekDay {
                date,
                total,
                status: day_status(date, today, total, daily_target),
            }
        })
        .collect();
    let days_at_goal_this_week = current_week_days
        .iter()
        .filter(|d| d.status == DayStatus::AtGoal)
        .count() as u32;

    let today_total = totals.quantity_on(today);
    let today_remaining = (daily_target - today_total).max(0.0);

    let weekly_current = window_total * GoalPeriod::Week.days() as f64 / window_days;
    let weekly_goal = goal.per(GoalPeriod::Week);
    let earnings = GoalEarnings::new(
        weekly_earnings_micros(habit.rate_micros, weekly_current),
        weekly_earnings_micros(habit.rate_micros, weekly_goal),
    );

    Some(GoalProgress {
        metric,
        progress_pct,
        baseline_x,
        current_x,
        goal_x,
        daily_target,
        current_week_days,
        days_at_goal_this_week,
        today_total,
        today_remaining,
        earnings,
        flag,
    })
}

fn baseline_per_day(
    totals: &DailyTotals,
    created_on: NaiveDate,
    window_start: NaiveDate,
) -> Option<f64> {
    let end = window_start.pred_opt()?;
    let start = window_start
        .checked_sub_signed(Duration::days(BASELINE_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MIN)
        .max(created_on);
    let days = temporal::days_inclusive(start, end);
    if days == 0 {
        return None;
    }
    Some(totals.quantity_between(start, end) / days as f64)
}

fn day_status(date: NaiveDate, today: NaiveDate, total: f64, daily_target: f64) -> DayStatus {
    if date > today {
        DayStatus::Future
    } else if total > 0.0 && total + EPSILON >= daily_target {
        DayStatus::AtGoal
    } else if total > 0.0 {
        DayStatus::Partial
    } else {
        DayStatus::None
    }
}

/// Rate × weekly units, in integer micro-units. For binary habits the units
/// are completions, so this is the flat rate times the completion count.
fn weekly_earnings_micros(rate_micros: i64, weekly_units: f64) -> i64 {
    money::flat_earnings_micros(rate_micros, weekly_units)
}
