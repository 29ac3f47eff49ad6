//! Core records for the habit engine
//!
//! Habits and log entries are owned by the host application and handed to the
//! engine by value or by shared reference. The engine never mutates them.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money;

/// How a habit's log units turn into earnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    /// Flat rate per completion; units are ignored
    Binary,
    /// Rate per minute
    Duration,
    /// Rate per mile/kilometre
    Distance,
    /// Rate per rep/step/item
    Count,
    /// Token the engine does not recognize; treated as binary
    #[serde(other)]
    Unknown,
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateType::Binary => "binary",
            RateType::Duration => "duration",
            RateType::Distance => "distance",
            RateType::Count => "count",
            RateType::Unknown => "unknown",
        }
    }

    /// Binary habits (and unknown ones, which degrade to binary) earn a flat rate
    pub fn is_binary(&self) -> bool {
        matches!(self, RateType::Binary | RateType::Unknown)
    }

    /// Resolve to a rate type the engine can compute with, flagging the fallback
    pub fn resolve(&self, habit_id: &str) -> Resolved<RateType> {
        match self {
            RateType::Unknown => {
                tracing::warn!(habit_id = %habit_id, "Unknown rate type, treating habit as binary");
                Resolved::fallback(RateType::Binary, DegradationFlag::UnknownRateType)
            }
            other => Resolved::exact(*other),
        }
    }
}

/// Period a goal amount is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalPeriod {
    Day,
    Week,
    Month,
    /// Token the engine does not recognize; treated as a week
    #[serde(other)]
    Unknown,
}

impl GoalPeriod {
    /// Fixed day-count table used for every period conversion
    pub fn days(&self) -> u32 {
        match self {
            GoalPeriod::Day => 1,
            GoalPeriod::Week | GoalPeriod::Unknown => 7,
            GoalPeriod::Month => 30,
        }
    }

    /// Resolve to a period the engine can compute with, flagging the fallback
    pub fn resolve(&self, habit_id: &str) -> Resolved<GoalPeriod> {
        match self {
            GoalPeriod::Unknown => {
                tracing::warn!(
                    habit_id = %habit_id,
                    "Unknown goal period, treating goal as weekly"
                );
                Resolved::fallback(GoalPeriod::Week, DegradationFlag::UnknownGoalPeriod)
            }
            other => Resolved::exact(*other),
        }
    }
}

/// Target amount per period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub amount: f64,
    pub period: GoalPeriod,
}

/// Days of the week a habit is expected. Empty means every day.
///
/// Weekday tokens that do not parse are dropped and kept aside in
/// `unrecognized`; if none remain the habit is treated as daily.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ScheduleRepr")]
pub struct Schedule {
    pub days: Vec<Weekday>,
    #[serde(skip)]
    pub unrecognized: Vec<String>,
}

#[derive(Deserialize)]
struct ScheduleRepr {
    #[serde(default)]
    days: Vec<String>,
}

impl From<ScheduleRepr> for Schedule {
    fn from(repr: ScheduleRepr) -> Self {
        let mut schedule = Schedule::default();
        for token in repr.days {
            match token.parse::<Weekday>() {
                Ok(day) if !schedule.days.contains(&day) => schedule.days.push(day),
                Ok(_) => {}
                Err(_) => schedule.unrecognized.push(token),
            }
        }
        schedule
    }
}

impl Schedule {
    pub fn daily() -> Self {
        Self::default()
    }

    pub fn on(days: &[Weekday]) -> Self {
        Self {
            days: days.to_vec(),
            unrecognized: Vec::new(),
        }
    }

    pub fn is_scheduled(&self, date: NaiveDate) -> bool {
        self.days.is_empty() || self.days.contains(&date.weekday())
    }

    /// Flag raised when weekday tokens were dropped while loading
    pub fn degradation(&self, habit_id: &str) -> Option<DegradationFlag> {
        if self.unrecognized.is_empty() {
            return None;
        }
        tracing::warn!(
            habit_id = %habit_id,
            tokens = ?self.unrecognized,
            "Unknown schedule weekdays dropped"
        );
        Some(DegradationFlag::UnknownScheduleDay)
    }
}

/// A trackable behavior definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub rate_type: RateType,
    /// Rate per unit (or per completion for binary habits) in micro-units
    pub rate_micros: i64,
    /// Unit label for non-binary habits ("min", "mi", "reps")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rate_type: RateType,
        rate_micros: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rate_type,
            rate_micros,
            unit: None,
            schedule: Schedule::daily(),
            goal: None,
            created_at,
        }
    }

    pub fn with_goal(mut self, amount: f64, period: GoalPeriod) -> Self {
        self.goal = Some(Goal { amount, period });
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }
}

/// One recorded completion of a habit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub habit_id: String,
    pub timestamp: DateTime<Utc>,
    /// Quantity for non-binary habits (minutes, miles, reps)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<f64>,
    /// Earnings frozen at log time, in micro-units
    pub total_earnings_micros: i64,
}

impl LogEntry {
    pub fn new(
        id: impl Into<String>,
        habit_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        units: Option<f64>,
        total_earnings_micros: i64,
    ) -> Self {
        Self {
            id: id.into(),
            habit_id: habit_id.into(),
            timestamp,
            units,
            total_earnings_micros,
        }
    }

    /// Record a completion, computing its earnings once from the habit's rate.
    ///
    /// `custom_rate_micros` overrides the habit rate for this entry only.
    pub fn record(
        habit: &Habit,
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        units: Option<f64>,
        custom_rate_micros: Option<i64>,
    ) -> Self {
        let rate = custom_rate_micros.unwrap_or(habit.rate_micros);
        let units_micros = money::units_to_micros(units.unwrap_or(0.0));
        let earnings = money::compute_earnings_micros(habit.rate_type, rate, units_micros);
        Self::new(id, habit.id.clone(), timestamp, units, earnings)
    }

    /// Amount this entry contributes to period totals
    pub fn quantity(&self, rate_type: RateType) -> f64 {
        if rate_type.is_binary() {
            1.0
        } else {
            self.units.unwrap_or(0.0)
        }
    }
}

/// Marker for a degrade-gracefully decision the engine made on bad input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationFlag {
    UnknownRateType,
    UnknownGoalPeriod,
    UnknownScheduleDay,
    UnknownPeriodToken,
    UnknownDistributionMode,
    InvalidCalendarMonth,
}

/// A value plus the flag raised if it was produced by a fallback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub flag: Option<DegradationFlag>,
}

impl<T> Resolved<T> {
    pub fn exact(value: T) -> Self {
        Self { value, flag: None }
    }

    pub fn fallback(value: T, flag: DegradationFlag) -> Self {
        Self {
            value,
            flag: Some(flag),
        }
    }
}

/// Chart period token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartPeriod {
    #[serde(rename = "7D")]
    Week,
    #[serde(rename = "30D")]
    Month,
    #[serde(rename = "90D")]
    Quarter,
    #[serde(rename = "1Y")]
    Year,
    #[serde(rename = "All")]
    All,
}

impl ChartPeriod {
    pub const ALL: [ChartPeriod; 5] = [
        ChartPeriod::Week,
        ChartPeriod::Month,
        ChartPeriod::Quarter,
        ChartPeriod::Year,
        ChartPeriod::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartPeriod::Week => "7D",
            ChartPeriod::Month => "30D",
            ChartPeriod::Quarter => "90D",
            ChartPeriod::Year => "1Y",
            ChartPeriod::All => "All",
        }
    }

    /// Fixed span in days; `None` for `All`, whose span depends on the log history
    pub fn span_days(&self) -> Option<i64> {
        match self {
            ChartPeriod::Week => Some(7),
            ChartPeriod::Month => Some(30),
            ChartPeriod::Quarter => Some(90),
            ChartPeriod::Year => Some(365),
            ChartPeriod::All => None,
        }
    }

    /// Parse a token, falling back to `7D` for anything unrecognized
    pub fn resolve(token: &str) -> Resolved<ChartPeriod> {
        match token.parse() {
            Ok(period) => Resolved::exact(period),
            Err(_) => {
                tracing::warn!(token = %token, "Unknown chart period, falling back to 7D");
                Resolved::fallback(ChartPeriod::Week, DegradationFlag::UnknownPeriodToken)
            }
        }
    }
}

impl FromStr for ChartPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7D" | "7d" => Ok(ChartPeriod::Week),
            "30D" | "30d" => Ok(ChartPeriod::Month),
            "90D" | "90d" => Ok(ChartPeriod::Quarter),
            "1Y" | "1y" => Ok(ChartPeriod::Year),
            "All" | "all" | "ALL" => Ok(ChartPeriod::All),
            other => Err(format!("unknown chart period: {other}")),
        }
    }
}

impl fmt::Display for ChartPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unknown_rate_type_deserializes() {
        let rate: RateType = serde_json::from_str("\"calories\"").unwrap();
        assert_eq!(rate, RateType::Unknown);
        assert!(rate.is_binary());

        let resolved = rate.resolve("h1");
        assert_eq!(resolved.value, RateType::Binary);
        assert_eq!(resolved.flag, Some(DegradationFlag::UnknownRateType));
    }

    #[test]
    fn test_period_tokens() {
        for period in ChartPeriod::ALL {
            assert_eq!(ChartPeriod::resolve(period.as_str()).value, period);
        }
        let json = serde_json::to_string(&ChartPeriod::Quarter).unwrap();
        assert_eq!(json, "\"90D\"");

        let fallback = ChartPeriod::resolve("2W");
        assert_eq!(fallback.value, ChartPeriod::Week);
        assert_eq!(fallback.flag, Some(DegradationFlag::UnknownPeriodToken));
    }

    #[test]
    fn test_schedule() {
        let weekdays = Schedule::on(&[Weekday::Mon, Weekday::Wed]);
        let monday = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        assert!(weekdays.is_scheduled(monday));
        assert!(!weekdays.is_scheduled(tuesday));
        assert!(Schedule::daily().is_scheduled(tuesday));
    }

    #[test]
    fn test_unknown_goal_period_falls_back_to_week() {
        let goal: Goal = serde_json::from_str(r#"{"amount":8000,"period":"fortnight"}"#).unwrap();
        assert_eq!(goal.period, GoalPeriod::Unknown);
        assert_eq!(goal.period.days(), 7);

        let resolved = goal.period.resolve("h1");
        assert_eq!(resolved.value, GoalPeriod::Week);
        assert_eq!(resolved.flag, Some(DegradationFlag::UnknownGoalPeriod));
        assert_eq!(GoalPeriod::Month.resolve("h1"), Resolved::exact(GoalPeriod::Month));
    }

    #[test]
    fn test_schedule_drops_unknown_weekdays() {
        let schedule: Schedule =
            serde_json::from_str(r#"{"days":["Mon","wednesday","funday","Mon"]}"#).unwrap();
        assert_eq!(schedule.days, vec![Weekday::Mon, Weekday::Wed]);
        assert_eq!(schedule.unrecognized, vec!["funday".to_string()]);
        assert_eq!(
            schedule.degradation("h1"),
            Some(DegradationFlag::UnknownScheduleDay)
        );

        // nothing usable left means every day
        let schedule: Schedule = serde_json::from_str(r#"{"days":["someday"]}"#).unwrap();
        assert!(schedule.is_scheduled(NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()));

        let clean: Schedule = serde_json::from_str(r#"{"days":["Fri"]}"#).unwrap();
        assert_eq!(clean.degradation("h1"), None);
        assert_eq!(serde_json::to_string(&clean).unwrap(), r#"{"days":["Fri"]}"#);
    }

    #[test]
    fn test_record_freezes_earnings() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut habit = Habit::new("walk", "Walk", RateType::Count, 100, created);
        let log = LogEntry::record(&habit, "l1", created, Some(5000.0), None);
        // 5000 steps at $0.0001/step = $0.50
        assert_eq!(log.total_earnings_micros, 500_000);

        habit.rate_micros = 200;
        assert_eq!(log.total_earnings_micros, 500_000);

        let custom = LogEntry::record(&habit, "l2", created, Some(10.0), Some(1_000_000));
        assert_eq!(custom.total_earnings_micros, 10_000_000);
    }

    #[test]
    fn test_binary_quantity_ignores_units() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let log = LogEntry::new("l1", "h1", now, Some(42.0), 0);
        assert_eq!(log.quantity(RateType::Binary), 1.0);
        assert_eq!(log.quantity(RateType::Duration), 42.0);
    }
}
