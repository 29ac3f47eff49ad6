//! Pipeline orchestration
//!
//! This module provides the public API for the habit engine. It wires the
//! stages together for one habit or a whole dashboard:
//! records → daily totals → classifiers and aggregators → view models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::calibration::{self, CalibrationState, CalibrationStatus};
use crate::clock::EngineContext;
use crate::config::EngineConfig;
use crate::daily::{self, DailyTotals};
use crate::error::EngineError;
use crate::goal::{self, GoalProgress};
use crate::insight::{self, InsightInputs, Insights};
use crate::money;
use crate::series::{self, ChartSeries, ChartView, HeatCell, ValueKind};
use crate::streak::{self, StreakSummary};
use crate::temporal::{self, MonthGrid};
use crate::types::{ChartPeriod, DegradationFlag, Habit, LogEntry, RateType, Resolved};

/// Weight of the completion rate in the index score
pub const INDEX_COMPLETION_WEIGHT: f64 = 70.0;

/// Weight of the streak in the index score
pub const INDEX_STREAK_WEIGHT: f64 = 30.0;

/// Streak length that earns the full streak weight
pub const INDEX_STREAK_TARGET: u32 = 30;

/// Everything the dashboard shows for one habit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitReport {
    pub habit_id: String,
    pub name: String,
    /// Rate type used for every computation (after fallback)
    pub rate_type: RateType,
    pub value_kind: ValueKind,
    pub log_count: u32,
    pub calibration: CalibrationStatus,
    pub streak: StreakSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<GoalProgress>,
    pub insights: Insights,
    /// Scheduled-day completion rate over the trailing window, 0.0-1.0
    pub completion_rate: f64,
    pub total_earnings_micros: i64,
    pub total_earnings_display: String,
    pub today_earnings_micros: i64,
    /// 0-100; `None` until calibration unlocks a score
    pub index_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<DegradationFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub today: NaiveDate,
    pub habits: Vec<HabitReport>,
    pub total_logs: u32,
    pub total_earnings_micros: i64,
    pub total_earnings_display: String,
    pub today_earnings_micros: i64,
    pub today_earnings_display: String,
}

/// JSON input accepted by [`dashboard_from_json`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardInput {
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// Heatmap cells for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapView {
    pub period: ChartPeriod,
    pub cells: Vec<HeatCell>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<DegradationFlag>,
}

/// Month grid with a heat intensity per cell (0 for padding cells)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarView {
    pub grid: MonthGrid,
    pub intensities: Vec<[u8; 7]>,
}

/// Habit index score: 70% completion rate plus 30% streak progress toward
/// [`INDEX_STREAK_TARGET`] days. `None` while calibration is still building.
pub fn index_score(
    calibration: CalibrationState,
    completion_rate: f64,
    current_streak: u32,
) -> Option<f64> {
    if calibration == CalibrationState::Building {
        return None;
    }
    let rate = if completion_rate.is_finite() {
        completion_rate.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let streak = (current_streak as f64 / INDEX_STREAK_TARGET as f64).min(1.0);
    let score = INDEX_COMPLETION_WEIGHT * rate + INDEX_STREAK_WEIGHT * streak;
    Some((score * 10.0).round() / 10.0)
}

/// Stateless engine configured once and re-invoked on every read
#[derive(Debug, Clone, Default)]
pub struct HabitEngine {
    config: EngineConfig,
}

impl HabitEngine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with a validated configuration
    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the report for one habit. Logs for other habits are ignored.
    pub fn habit_report(
        &self,
        habit: &Habit,
        logs: &[LogEntry],
        ctx: &EngineContext,
    ) -> HabitReport {
        let own: Vec<&LogEntry> = logs.iter().filter(|l| l.habit_id == habit.id).collect();
        self.report_for(habit, &own, ctx)
    }

    fn report_for(&self, habit: &Habit, logs: &[&LogEntry], ctx: &EngineContext) -> HabitReport {
        let Resolved { value: rate_type, flag } = habit.rate_type.resolve(&habit.id);
        let today = ctx.today();
        let created_on = ctx.day_of(habit.created_at);

        let totals = DailyTotals::from_logs(logs.iter().copied(), rate_type, ctx);
        let log_count = logs.len() as u32;
        let calibration = calibration::classify_with(log_count, &self.config.calibration);
        let streak = streak::compute_streaks(logs.iter().copied(), ctx);
        let completion_rate = daily::completion_rate(
            &totals,
            &habit.schedule,
            created_on,
            today,
            self.config.completion_window_days,
        );

        let total_earnings_micros = totals.total_earnings_micros();
        let today_earnings_micros = totals.get(today).map_or(0, |d| d.earnings_micros);
        let days_since_creation = (today - created_on).num_days().clamp(0, u32::MAX as i64) as u32;

        let insights = insight::insights(InsightInputs {
            calibration: &calibration,
            total_earnings_micros,
            completion_rate,
            days_since_creation,
            milestones: &self.config.milestones,
        });

        let goal = goal::goal_progress(habit, rate_type, &totals, ctx);
        let flags = flag
            .into_iter()
            .chain(goal.as_ref().and_then(|g| g.flag))
            .chain(habit.schedule.degradation(&habit.id))
            .collect();

        HabitReport {
            habit_id: habit.id.clone(),
            name: habit.name.clone(),
            rate_type,
            value_kind: ValueKind::for_rate_type(rate_type),
            log_count,
            index_score: index_score(calibration.status, completion_rate, streak.current),
            goal,
            calibration,
            streak,
            insights,
            completion_rate,
            total_earnings_micros,
            total_earnings_display: money::micros_to_display(total_earnings_micros),
            today_earnings_micros,
            flags,
        }
    }

    /// Reports for every habit plus lifetime and today's totals.
    ///
    /// Fails with [`EngineError::DataIntegrity`] if any log references a
    /// habit that is not in `habits`.
    pub fn dashboard(
        &self,
        habits: &[Habit],
        logs: &[LogEntry],
        ctx: &EngineContext,
    ) -> Result<Dashboard, EngineError> {
        let known: HashSet<&str> = habits.iter().map(|h| h.id.as_str()).collect();
        if let Some(orphan) = logs.iter().find(|l| !known.contains(l.habit_id.as_str())) {
            tracing::error!(
                log_id = %orphan.id,
                habit_id = %orphan.habit_id,
                "Log references unknown habit"
            );
            return Err(EngineError::DataIntegrity {
                log_id: orphan.id.clone(),
                habit_id: orphan.habit_id.clone(),
            });
        }

        let mut by_habit: HashMap<&str, Vec<&LogEntry>> = HashMap::new();
        for log in logs {
            by_habit.entry(log.habit_id.as_str()).or_default().push(log);
        }

        let reports: Vec<HabitReport> = habits
            .iter()
            .map(|habit| {
                let own = by_habit.get(habit.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                self.report_for(habit, own, ctx)
            })
            .collect();

        let total_earnings_micros =
            money::sum_micros(reports.iter().map(|r| r.total_earnings_micros));
        let today_earnings_micros =
            money::sum_micros(reports.iter().map(|r| r.today_earnings_micros));

        tracing::debug!(habits = reports.len(), logs = logs.len(), "Dashboard assembled");

        Ok(Dashboard {
            generated_at: ctx.now,
            today: ctx.today(),
            habits: reports,
            total_logs: logs.len() as u32,
            total_earnings_micros,
            total_earnings_display: money::micros_to_display(total_earnings_micros),
            today_earnings_micros,
            today_earnings_display: money::micros_to_display(today_earnings_micros),
        })
    }

    /// Chart series for one habit and a period token such as `"30D"`
    pub fn chart(
        &self,
        habit: &Habit,
        logs: &[LogEntry],
        period_token: &str,
        view: ChartView,
        ctx: &EngineContext,
    ) -> ChartSeries {
        let rate = habit.rate_type.resolve(&habit.id);
        let period = ChartPeriod::resolve(period_token);
        let totals = self.totals_for(habit, logs, rate.value, ctx);

        let mut series = series::build_series(
            &totals,
            ValueKind::for_rate_type(rate.value),
            period.value,
            view,
            ctx,
            &self.config.chart,
        );
        series.flags.extend(rate.flag);
        series.flags.extend(period.flag);
        series
    }

    pub fn heatmap(
        &self,
        habit: &Habit,
        logs: &[LogEntry],
        period_token: &str,
        ctx: &EngineContext,
    ) -> HeatmapView {
        let rate = habit.rate_type.resolve(&habit.id);
        let period = ChartPeriod::resolve(period_token);
        let totals = self.totals_for(habit, logs, rate.value, ctx);
        let range = temporal::period_range(period.value, ctx.today(), totals.first_day());

        HeatmapView {
            period: period.value,
            cells: series::heatmap(&totals, &range),
            flags: rate.flag.into_iter().chain(period.flag).collect(),
        }
    }

    /// Month calendar for a habit; an invalid month falls back to the current one
    pub fn calendar(
        &self,
        habit: &Habit,
        logs: &[LogEntry],
        year: i32,
        month: u32,
        ctx: &EngineContext,
    ) -> CalendarView {
        let rate = habit.rate_type.resolve(&habit.id);
        let totals = self.totals_for(habit, logs, rate.value, ctx);
        let max_value = totals.max_quantity();
        let grid = temporal::month_grid(year, month, ctx.today());

        let intensities = grid
            .weeks
            .iter()
            .map(|week| {
                week.map(|cell| match cell.date {
                    Some(date) => series::intensity(
                        totals.quantity_on(date),
                        max_value,
                        totals.has_log(date),
                    ),
                    None => 0,
                })
            })
            .collect();

        CalendarView { grid, intensities }
    }

    fn totals_for(
        &self,
        habit: &Habit,
        logs: &[LogEntry],
        rate_type: RateType,
        ctx: &EngineContext,
    ) -> DailyTotals {
        DailyTotals::from_logs(logs.iter().filter(|l| l.habit_id == habit.id), rate_type, ctx)
    }
}

/// Parse `{ "habits": [...], "logs": [...] }`, build the dashboard with the
/// default configuration and return it as JSON.
pub fn dashboard_from_json(input_json: &str, ctx: &EngineContext) -> Result<String, EngineError> {
    HabitEngine::default().dashboard_json(input_json, ctx)
}

impl HabitEngine {
    pub fn dashboard_json(
        &self,
        input_json: &str,
        ctx: &EngineContext,
    ) -> Result<String, EngineError> {
        let input: DashboardInput = serde_json::from_str(input_json)?;
        let dashboard = self.dashboard(&input.habits, &input.logs, ctx)?;
        serde_json::to_string(&dashboard).map_err(|e| EngineError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::Difficulty;
    use crate::types::GoalPeriod;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ctx() -> EngineContext {
        EngineContext::utc(Utc.with_ymd_and_hms(2024, 1, 20, 19, 0, 0).unwrap())
    }

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 11, 7, 0, 0).unwrap()
    }

    fn daily_logs(habit: &Habit, days: std::ops::RangeInclusive<u32>) -> Vec<LogEntry> {
        days.map(|day| {
            LogEntry::record(
                habit,
                format!("{}-{day}", habit.id),
                Utc.with_ymd_and_hms(2024, 1, day, 8, 0, 0).unwrap(),
                None,
                None,
            )
        })
        .collect()
    }

    fn sample_input_json() -> &'static str {
        r#"{
            "habits": [{
                "id": "walk",
                "name": "Walk",
                "rate_type": "count",
                "rate_micros": 100,
                "unit": "steps",
                "goal": { "amount": 8000, "period": "day" },
                "created_at": "2024-01-01T00:00:00Z"
            }],
            "logs": [{
                "id": "l1",
                "habit_id": "walk",
                "timestamp": "2024-01-20T09:00:00Z",
                "units": 5000,
                "total_earnings_micros": 500000
            }]
        }"#
    }

    #[test]
    fn test_report_binary_daily() {
        let habit = Habit::new("read", "Read", RateType::Binary, 1_000_000, created());
        let logs = daily_logs(&habit, 11..=20);
        let report = HabitEngine::new().habit_report(&habit, &logs, &ctx());

        assert_eq!(report.log_count, 10);
        assert_eq!(report.calibration.status, CalibrationState::Emerging);
        assert_eq!(report.streak.current, 10);
        assert_eq!(report.completion_rate, 1.0);
        assert_eq!(report.total_earnings_micros, 10_000_000);
        assert_eq!(report.total_earnings_display, "$10.00");
        assert_eq!(report.today_earnings_micros, 1_000_000);
        assert_eq!(report.insights.difficulty.difficulty, Difficulty::Calibrated);
        // 70 * 1.0 + 30 * 10/30
        assert_eq!(report.index_score, Some(80.0));
        assert!(report.goal.is_none());
        assert!(report.flags.is_empty());
    }

    #[test]
    fn test_report_without_logs() {
        let habit = Habit::new("read", "Read", RateType::Binary, 1_000_000, created());
        let report = HabitEngine::new().habit_report(&habit, &[], &ctx());
        assert_eq!(report.calibration.logs_needed, 10);
        assert_eq!(report.streak.current, 0);
        assert_eq!(report.index_score, None);
        assert_eq!(report.insights.milestone.target_micros, Some(25_000_000));
        assert_eq!(report.insights.difficulty.difficulty, Difficulty::Evaluating);
    }

    #[test]
    fn test_unknown_rate_type_is_flagged() {
        let habit = Habit::new("x", "Mystery", RateType::Unknown, 500_000, created());
        let report = HabitEngine::new().habit_report(&habit, &[], &ctx());
        assert_eq!(report.rate_type, RateType::Binary);
        assert_eq!(report.value_kind, ValueKind::Completion);
        assert_eq!(report.flags, vec![DegradationFlag::UnknownRateType]);
    }

    #[test]
    fn test_dashboard_rejects_orphan_logs() {
        let habit = Habit::new("read", "Read", RateType::Binary, 1_000_000, created());
        let mut logs = daily_logs(&habit, 18..=20);
        logs.push(LogEntry::new("ghost", "deleted", created(), None, 0));

        let err = HabitEngine::new().dashboard(&[habit], &logs, &ctx()).unwrap_err();
        assert!(err.is_integrity_fault());
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_dashboard_totals() {
        let read = Habit::new("read", "Read", RateType::Binary, 1_000_000, created());
        let run = Habit::new("run", "Run", RateType::Distance, 2_500_000, created())
            .with_goal(10.0, GoalPeriod::Week);
        let mut logs = daily_logs(&read, 18..=20);
        logs.push(LogEntry::record(
            &run,
            "run-1",
            Utc.with_ymd_and_hms(2024, 1, 20, 6, 30, 0).unwrap(),
            Some(3.2),
            None,
        ));

        let dashboard = HabitEngine::new()
            .dashboard(&[read, run], &logs, &ctx())
            .unwrap();
        assert_eq!(dashboard.habits.len(), 2);
        assert_eq!(dashboard.total_logs, 4);
        // 3 x $1.00 + 3.2 mi x $2.50
        assert_eq!(dashboard.total_earnings_micros, 11_000_000);
        assert_eq!(dashboard.today_earnings_micros, 9_000_000);
        assert_eq!(dashboard.today_earnings_display, "$9.00");
        assert!(dashboard.habits[1].goal.is_some());
    }

    #[test]
    fn test_chart_flags_bad_period() {
        let habit = Habit::new("read", "Read", RateType::Binary, 1_000_000, created());
        let logs = daily_logs(&habit, 11..=20);
        let series = HabitEngine::new().chart(&habit, &logs, "2W", ChartView::Value, &ctx());
        assert_eq!(series.period, ChartPeriod::Week);
        assert_eq!(series.points.len(), 7);
        assert_eq!(series.flags, vec![DegradationFlag::UnknownPeriodToken]);
    }

    #[test]
    fn test_calendar_intensities_align_with_grid() {
        let habit = Habit::new("read", "Read", RateType::Binary, 1_000_000, created());
        let logs = daily_logs(&habit, 11..=20);
        let view = HabitEngine::new().calendar(&habit, &logs, 2024, 1, &ctx());
        assert_eq!(view.intensities.len(), view.grid.weeks.len());
        // January 2024 starts on a Monday; Jan 11 is row 1, column 4
        assert_eq!(view.intensities[0], [0; 7]);
        assert_eq!(view.intensities[1][4], 4);
    }

    #[test]
    fn test_heatmap_view() {
        let habit = Habit::new("read", "Read", RateType::Binary, 1_000_000, created());
        let logs = daily_logs(&habit, 18..=20);
        let view = HabitEngine::new().heatmap(&habit, &logs, "7D", &ctx());
        assert_eq!(view.cells.len(), 7);
        assert_eq!(view.cells.iter().filter(|c| c.intensity == 4).count(), 3);
    }

    #[test]
    fn test_dashboard_from_json() {
        let json = dashboard_from_json(sample_input_json(), &ctx()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_earnings_display"], "$0.50");
        assert_eq!(value["habits"][0]["habit_id"], "walk");
        assert_eq!(value["habits"][0]["goal"]["today_remaining"], 3000.0);
    }

    #[test]
    fn test_unknown_goal_and_schedule_tokens_degrade() {
        let schedule = r#""schedule": { "days": ["Sat", "caturday"] },"#;
        let input = sample_input_json()
            .replace(r#""period": "day""#, r#""period": "fortnight""#)
            .replace(r#""created_at""#, &format!(r#"{schedule} "created_at""#));
        let json = dashboard_from_json(&input, &ctx()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let habit = &value["habits"][0];

        assert_eq!(
            habit["flags"],
            serde_json::json!(["unknown_goal_period", "unknown_schedule_day"])
        );
        assert_eq!(habit["goal"]["flag"], "unknown_goal_period");
        // 8000 per week after the fallback
        assert_eq!(habit["goal"]["goal_x"], 8000.0 / 7.0);
        // Saturdays Jan 6, 13 and 20 are scheduled; only the 20th is logged
        assert_eq!(habit["completion_rate"], 1.0 / 3.0);
    }

    #[test]
    fn test_dashboard_at_end_of_calendar() {
        let now = Utc.from_utc_datetime(&NaiveDate::MAX.and_hms_opt(12, 0, 0).unwrap());
        let input: DashboardInput = serde_json::from_str(sample_input_json()).unwrap();
        let mut logs = input.logs;
        logs[0].timestamp = now;

        let dashboard = HabitEngine::new()
            .dashboard(&input.habits, &logs, &EngineContext::utc(now))
            .unwrap();
        let report = &dashboard.habits[0];

        assert_eq!(dashboard.today, NaiveDate::MAX);
        assert_eq!(report.goal.as_ref().unwrap().today_remaining, 3000.0);
        assert_eq!(report.streak.current, 1);
        assert!(serde_json::to_string(&dashboard).is_ok());
    }

    #[test]
    fn test_invalid_json() {
        let result = dashboard_from_json("not valid json", &ctx());
        assert!(matches!(result, Err(EngineError::JsonError(_))));
    }

    #[test]
    fn test_index_score() {
        assert_eq!(index_score(CalibrationState::Building, 1.0, 30), None);
        assert_eq!(index_score(CalibrationState::Emerging, 0.5, 0), Some(35.0));
        assert_eq!(index_score(CalibrationState::Established, 1.0, 90), Some(100.0));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.milestones.clear();
        assert!(HabitEngine::with_config(config).is_err());
    }
}
