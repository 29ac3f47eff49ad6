//! Consecutive-day streaks

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::clock::EngineContext;
use crate::types::LogEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    /// Consecutive days ending today or yesterday
    pub current: u32,
    /// Longest run in the full history
    pub longest: u32,
    /// Distinct days with at least one log
    pub active_days: u32,
    /// Most recent logged day on or before today
    pub last_logged: Option<NaiveDate>,
}

/// Distinct local calendar days that have at least one log
pub fn unique_days<'a, I>(logs: I, ctx: &EngineContext) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    logs.into_iter().map(|log| ctx.day_of(log.timestamp)).collect()
}

pub fn compute_streaks<'a, I>(logs: I, ctx: &EngineContext) -> StreakSummary
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let days = unique_days(logs, ctx);
    streaks_from_days(&days, ctx.today())
}

/// Streaks over a set of logged days.
///
/// The current streak survives until the end of the day after the last log,
/// so it does not drop to zero the moment the clock passes midnight.
pub fn streaks_from_days(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> StreakSummary {
    if days.is_empty() {
        return StreakSummary::default();
    }

    StreakSummary {
        current: current_streak(days, today),
        longest: longest_streak(days),
        active_days: days.len() as u32,
        last_logged: days.range(..=today).next_back().copied(),
    }
}

fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    // Logs dated in the future do not anchor a streak
    let mut descending = days.range(..=today).rev().peekable();

    let Some(&&latest) = descending.peek() else {
        return 0;
    };
    if latest != today && Some(latest) != today.pred_opt() {
        return 0;
    }

    let mut streak = 0u32;
    let mut expected = Some(latest);
    for day in descending {
        if Some(*day) != expected {
            break;
        }
        streak += 1;
        expected = day.pred_opt();
    }
    streak
}

fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;

    for day in days {
        run = match previous {
            Some(prev) if (*day - prev).num_days() == 1 => run + 1,
            // the set is already de-duplicated, so any other gap restarts the run
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }
    longest
}
