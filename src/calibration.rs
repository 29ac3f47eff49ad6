//! Calibration and maturity classification
//!
//! Both classifiers are ordered rule tables evaluated top to bottom. Every
//! input matches exactly one rule, and because the rules are ordered by
//! threshold the result can only move forward as the input grows.

use serde::{Deserialize, Serialize};

use crate::config::CalibrationThresholds;

/// Whether enough history exists to trust derived scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    Building,
    Emerging,
    Established,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStatus {
    pub log_count: u32,
    pub status: CalibrationState,
    /// Logs until the next state (0 once established)
    pub logs_needed: u32,
    /// Progress toward the next state, 0-100
    pub progress_pct: f64,
    pub message: String,
}

impl CalibrationStatus {
    pub fn has_score(&self) -> bool {
        self.status != CalibrationState::Building
    }
}

/// Classify with the default thresholds
pub fn classify(log_count: u32) -> CalibrationStatus {
    classify_with(log_count, &CalibrationThresholds::default())
}

pub fn classify_with(log_count: u32, thresholds: &CalibrationThresholds) -> CalibrationStatus {
    let rules = [
        (thresholds.logs_for_established, CalibrationState::Established),
        (thresholds.min_logs_for_score, CalibrationState::Emerging),
        (0, CalibrationState::Building),
    ];
    let status = rules
        .iter()
        .find(|(min, _)| log_count >= *min)
        .map(|(_, state)| *state)
        .unwrap_or(CalibrationState::Building);

    let target = match status {
        CalibrationState::Building => thresholds.min_logs_for_score,
        CalibrationState::Emerging => thresholds.logs_for_established,
        CalibrationState::Established => log_count,
    };
    let logs_needed = target.saturating_sub(log_count);
    let progress_pct = if target == 0 {
        100.0
    } else {
        (log_count as f64 / target as f64 * 100.0).min(100.0)
    };

    let message = match status {
        CalibrationState::Building => format!(
            "Log {} more {} to unlock your score",
            logs_needed,
            plural(logs_needed, "time", "times")
        ),
        CalibrationState::Emerging => format!(
            "Your baseline is forming. {} more {} to establish it",
            logs_needed,
            plural(logs_needed, "log", "logs")
        ),
        CalibrationState::Established => {
            "Your baseline is established and scores are reliable".to_string()
        }
    };

    CalibrationStatus {
        log_count,
        status,
        logs_needed,
        progress_pct,
        message,
    }
}

fn plural<'a>(n: u32, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

/// Habit-formation stage by days since creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityStage {
    Forming,
    Establishing,
    Strengthening,
    Stable,
    Mastered,
}

struct StageBand {
    stage: MaturityStage,
    start_day: u32,
    /// Exclusive end; `None` for the terminal band
    end_day: Option<u32>,
    title: &'static str,
    message: &'static str,
}

const STAGE_BANDS: [StageBand; 5] = [
    StageBand {
        stage: MaturityStage::Mastered,
        start_day: 180,
        end_day: None,
        title: "Mastered",
        message: "This habit is part of who you are. Keep it effortless.",
    },
    StageBand {
        stage: MaturityStage::Stable,
        start_day: 90,
        end_day: Some(180),
        title: "Stable",
        message: "The routine holds on its own now. Protect it during busy weeks.",
    },
    StageBand {
        stage: MaturityStage::Strengthening,
        start_day: 60,
        end_day: Some(90),
        title: "Strengthening",
        message: "Repetition is paying off. The habit needs less willpower each week.",
    },
    StageBand {
        stage: MaturityStage::Establishing,
        start_day: 21,
        end_day: Some(60),
        title: "Establishing",
        message: "You are past the first hurdle. Consistency matters more than intensity.",
    },
    StageBand {
        stage: MaturityStage::Forming,
        start_day: 0,
        end_day: Some(21),
        title: "Forming",
        message: "Early days. Small, regular wins build the foundation.",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaturityStatus {
    pub stage: MaturityStage,
    pub days_since_creation: u32,
    pub title: String,
    pub message: String,
    /// Progress through the current band, 0-100
    pub progress_pct: f64,
    /// Days until the next band; `None` in the terminal band
    pub days_to_next: Option<u32>,
}

pub fn maturity_stage(days_since_creation: u32) -> MaturityStatus {
    let band = STAGE_BANDS
        .iter()
        .find(|band| days_since_creation >= band.start_day)
        .unwrap_or(&STAGE_BANDS[STAGE_BANDS.len() - 1]);

    let (progress_pct, days_to_next) = match band.end_day {
        Some(end) => {
            let width = (end - band.start_day) as f64;
            let into = (days_since_creation - band.start_day) as f64;
            ((into / width * 100.0).min(100.0), Some(end - days_since_creation))
        }
        None => (100.0, None),
    };

    MaturityStatus {
        stage: band.stage,
        days_since_creation,
        title: band.title.to_string(),
        message: band.message.to_string(),
        progress_pct,
        days_to_next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        let zero = classify(0);
        assert_eq!(zero.status, CalibrationState::Building);
        assert_eq!(zero.logs_needed, 10);
        assert_eq!(zero.progress_pct, 0.0);

        assert_eq!(classify(9).status, CalibrationState::Building);
        assert_eq!(classify(9).logs_needed, 1);
        assert_eq!(classify(10).status, CalibrationState::Emerging);
        assert_eq!(classify(10).logs_needed, 20);
        assert_eq!(classify(29).status, CalibrationState::Emerging);
        assert_eq!(classify(30).status, CalibrationState::Established);
        assert_eq!(classify(30).logs_needed, 0);
        assert_eq!(classify(500).progress_pct, 100.0);
    }

    #[test]
    fn test_messages() {
        assert_eq!(classify(9).message, "Log 1 more time to unlock your score");
        assert!(classify(3).message.contains("7 more times"));
        assert!(classify(12).message.contains("18 more logs"));
    }

    #[test]
    fn test_monotonic() {
        let mut previous = classify(0).status;
        for n in 1..200 {
            let current = classify(n).status;
            assert!(current >= previous, "regressed at {n}");
            previous = current;
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = CalibrationThresholds {
            min_logs_for_score: 3,
            logs_for_established: 3,
        };
        assert_eq!(classify_with(2, &thresholds).status, CalibrationState::Building);
        assert_eq!(
            classify_with(3, &thresholds).status,
            CalibrationState::Established
        );
    }

    #[test]
    fn test_maturity_bands() {
        assert_eq!(maturity_stage(0).stage, MaturityStage::Forming);
        assert_eq!(maturity_stage(20).stage, MaturityStage::Forming);
        assert_eq!(maturity_stage(21).stage, MaturityStage::Establishing);
        assert_eq!(maturity_stage(59).stage, MaturityStage::Establishing);
        assert_eq!(maturity_stage(60).stage, MaturityStage::Strengthening);
        assert_eq!(maturity_stage(90).stage, MaturityStage::Stable);
        assert_eq!(maturity_stage(179).stage, MaturityStage::Stable);
        assert_eq!(maturity_stage(180).stage, MaturityStage::Mastered);
    }

    #[test]
    fn test_maturity_progress() {
        let forming = maturity_stage(7);
        assert_eq!(forming.days_to_next, Some(14));
        assert!((forming.progress_pct - 33.333).abs() < 0.01);

        let mastered = maturity_stage(400);
        assert_eq!(mastered.days_to_next, None);
        assert_eq!(mastered.progress_pct, 100.0);

        let mut previous = maturity_stage(0).stage;
        for day in 1..400 {
            let current = maturity_stage(day).stage;
            assert!(current >= previous);
            previous = current;
        }
    }
}
