//! Insight narratives
//!
//! Composes calibration, completion rate and lifetime earnings into the
//! milestone, difficulty and maturity cards. No new arithmetic happens here
//! beyond picking a rule and filling its template.

use serde::{Deserialize, Serialize};

use crate::calibration::{self, CalibrationState, CalibrationStatus, MaturityStatus};
use crate::money;

/// Progress toward the next cumulative-earnings milestone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Next threshold above lifetime earnings; `None` once the ladder is exhausted
    pub target_micros: Option<i64>,
    /// Last threshold already passed (0 before the first)
    pub previous_micros: i64,
    pub current_micros: i64,
    pub remaining_micros: i64,
    /// Progress from the previous threshold to the target, 0-100
    pub progress_pct: f64,
    /// Logs still needed at the observed average earnings per log
    pub estimated_completions: Option<u32>,
    pub message: String,
}

pub fn milestone(total_earnings_micros: i64, log_count: u32, ladder: &[u32]) -> Milestone {
    let current = total_earnings_micros.max(0);
    let thresholds = ladder
        .iter()
        .map(|units| (*units as i64).saturating_mul(money::MICROS_PER_UNIT));

    let target = thresholds.clone().find(|t| *t > current);
    let previous = thresholds.filter(|t| *t <= current).last().unwrap_or(0);

    let Some(target) = target else {
        return Milestone {
            target_micros: None,
            previous_micros: previous,
            current_micros: current,
            remaining_micros: 0,
            progress_pct: 100.0,
            estimated_completions: None,
            message: format!(
                "Every milestone reached with {} earned",
                money::micros_to_display(current)
            ),
        };
    };

    let remaining = target - current;
    let span = target - previous;
    let progress_pct = if span > 0 {
        ((current - previous) as f64 / span as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let average_per_log = if log_count > 0 && current > 0 {
        Some(current as f64 / log_count as f64)
    } else {
        None
    };
    let estimated_completions = average_per_log.map(|avg| (remaining as f64 / avg).ceil() as u32);

    let message = match estimated_completions {
        Some(n) => format!(
            "{} to go until {} (about {} more {})",
            money::micros_to_display(remaining),
            money::micros_to_display(target),
            n,
            if n == 1 { "log" } else { "logs" }
        ),
        None => format!("Your first milestone is {}", money::micros_to_display(target)),
    };

    Milestone {
        target_micros: Some(target),
        previous_micros: previous,
        current_micros: current,
        remaining_micros: remaining,
        progress_pct,
        estimated_completions,
        message,
    }
}

/// How demanding a habit currently is for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Evaluating,
    Struggling,
    Challenging,
    Calibrated,
    Mastered,
}

impl Difficulty {
    pub fn title(&self) -> &'static str {
        match self {
            Difficulty::Evaluating => "Evaluating",
            Difficulty::Struggling => "Struggling",
            Difficulty::Challenging => "Challenging",
            Difficulty::Calibrated => "Well calibrated",
            Difficulty::Mastered => "Mastered",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Difficulty::Evaluating => {
                "Keep logging so we can judge how hard this habit is for you."
            }
            Difficulty::Struggling => {
                "Consider a smaller goal or fewer scheduled days to rebuild momentum."
            }
            Difficulty::Challenging => {
                "You are completing most days. A little more consistency will lock it in."
            }
            Difficulty::Calibrated => "The difficulty suits you. Keep the current rhythm.",
            Difficulty::Mastered => "You rarely miss a day. Ready to raise the bar?",
        }
    }
}

struct DifficultyRule {
    min_rate: f64,
    requires: Option<CalibrationState>,
    difficulty: Difficulty,
}

const DIFFICULTY_RULES: [DifficultyRule; 4] = [
    DifficultyRule {
        min_rate: 0.95,
        requires: Some(CalibrationState::Established),
        difficulty: Difficulty::Mastered,
    },
    DifficultyRule {
        min_rate: 0.80,
        requires: None,
        difficulty: Difficulty::Calibrated,
    },
    DifficultyRule {
        min_rate: 0.50,
        requires: None,
        difficulty: Difficulty::Challenging,
    },
    DifficultyRule {
        min_rate: 0.0,
        requires: None,
        difficulty: Difficulty::Struggling,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyInsight {
    pub difficulty: Difficulty,
    /// Trailing completion rate, 0.0-1.0
    pub completion_rate: f64,
    pub title: String,
    pub message: String,
}

/// Classify difficulty. Nothing is judged until calibration unlocks a score.
pub fn difficulty(calibration: CalibrationState, completion_rate: f64) -> DifficultyInsight {
    let rate = if completion_rate.is_finite() {
        completion_rate.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let difficulty = if calibration == CalibrationState::Building {
        Difficulty::Evaluating
    } else {
        DIFFICULTY_RULES
            .iter()
            .find(|rule| {
                rate >= rule.min_rate && rule.requires.map_or(true, |gate| calibration >= gate)
            })
            .map(|rule| rule.difficulty)
            .unwrap_or(Difficulty::Struggling)
    };

    DifficultyInsight {
        difficulty,
        completion_rate: rate,
        title: difficulty.title().to_string(),
        message: difficulty.message().to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub milestone: Milestone,
    pub difficulty: DifficultyInsight,
    pub maturity: MaturityStatus,
}

/// Inputs already derived for a habit
#[derive(Debug, Clone, Copy)]
pub struct InsightInputs<'a> {
    pub calibration: &'a CalibrationStatus,
    pub total_earnings_micros: i64,
    pub completion_rate: f64,
    pub days_since_creation: u32,
    pub milestones: &'a [u32],
}

pub fn insights(inputs: InsightInputs<'_>) -> Insights {
    Insights {
        milestone: milestone(
            inputs.total_earnings_micros,
            inputs.calibration.log_count,
            inputs.milestones,
        ),
        difficulty: difficulty(inputs.calibration.status, inputs.completion_rate),
        maturity: calibration::maturity_stage(inputs.days_since_creation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{classify, MaturityStage};
    use crate::config::DEFAULT_MILESTONES;

    #[test]
    fn test_first_milestone_with_no_logs() {
        let m = milestone(0, 0, &DEFAULT_MILESTONES);
        assert_eq!(m.target_micros, Some(25_000_000));
        assert_eq!(m.progress_pct, 0.0);
        assert_eq!(m.estimated_completions, None);
        assert_eq!(m.message, "Your first milestone is $25.00");
    }

    #[test]
    fn test_milestone_progress_from_previous() {
        // $60 over 12 logs = $5/log, next is $100
        let m = milestone(60_000_000, 12, &DEFAULT_MILESTONES);
        assert_eq!(m.previous_micros, 50_000_000);
        assert_eq!(m.target_micros, Some(100_000_000));
        assert_eq!(m.remaining_micros, 40_000_000);
        assert_eq!(m.progress_pct, 20.0);
        assert_eq!(m.estimated_completions, Some(8));
    }

    #[test]
    fn test_milestone_is_strictly_next() {
        let m = milestone(25_000_000, 5, &DEFAULT_MILESTONES);
        assert_eq!(m.target_micros, Some(50_000_000));
        assert_eq!(m.previous_micros, 25_000_000);
    }

    #[test]
    fn test_ladder_exhausted() {
        let m = milestone(6_000_000_000, 900, &DEFAULT_MILESTONES);
        assert_eq!(m.target_micros, None);
        assert_eq!(m.progress_pct, 100.0);
        assert_eq!(m.remaining_micros, 0);
    }

    #[test]
    fn test_difficulty_rules() {
        use CalibrationState::*;
        assert_eq!(difficulty(Building, 1.0).difficulty, Difficulty::Evaluating);
        assert_eq!(difficulty(Emerging, 0.2).difficulty, Difficulty::Struggling);
        assert_eq!(difficulty(Emerging, 0.5).difficulty, Difficulty::Challenging);
        assert_eq!(difficulty(Emerging, 0.8).difficulty, Difficulty::Calibrated);
        // a perfect rate alone is not mastery
        assert_eq!(difficulty(Emerging, 1.0).difficulty, Difficulty::Calibrated);
        assert_eq!(difficulty(Established, 0.95).difficulty, Difficulty::Mastered);
        assert_eq!(difficulty(Established, f64::NAN).difficulty, Difficulty::Struggling);
    }

    #[test]
    fn test_insights_compose() {
        let calibration = classify(10);
        let out = insights(InsightInputs {
            calibration: &calibration,
            total_earnings_micros: 10_000_000,
            completion_rate: 1.0,
            days_since_creation: 9,
            milestones: &DEFAULT_MILESTONES,
        });
        assert_eq!(out.difficulty.difficulty, Difficulty::Calibrated);
        assert_eq!(out.maturity.stage, MaturityStage::Forming);
        assert_eq!(out.milestone.estimated_completions, Some(15));
    }
}
