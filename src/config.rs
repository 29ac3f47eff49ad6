//! Engine configuration
//!
//! All thresholds the classifiers and aggregators use, with defaults matching
//! the product's published behavior. Hosts can override them from JSON.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Logs required before a habit gets a score
pub const MIN_LOGS_FOR_SCORE: u32 = 10;

/// Logs required before the baseline counts as established
pub const LOGS_FOR_ESTABLISHED: u32 = 30;

/// Cumulative-earnings milestones in whole currency units
pub const DEFAULT_MILESTONES: [u32; 8] = [25, 50, 100, 250, 500, 1000, 2500, 5000];

/// Default trailing window for completion rate and difficulty
pub const DEFAULT_COMPLETION_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationThresholds {
    pub min_logs_for_score: u32,
    pub logs_for_established: u32,
}

impl Default for CalibrationThresholds {
    fn default() -> Self {
        Self {
            min_logs_for_score: MIN_LOGS_FOR_SCORE,
            logs_for_established: LOGS_FOR_ESTABLISHED,
        }
    }
}

/// Target bucket counts for periods rendered at reduced resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub quarter_buckets: u32,
    pub year_buckets: u32,
    pub all_time_buckets: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            quarter_buckets: 15,
            year_buckets: 53,
            all_time_buckets: 52,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityConfig {
    pub min_participants: u32,
    pub max_participants: u32,
    pub history_weeks: u32,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            min_participants: 800,
            max_participants: 5000,
            history_weeks: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub calibration: CalibrationThresholds,
    pub milestones: Vec<u32>,
    pub completion_window_days: u32,
    pub chart: ChartConfig,
    pub community: CommunityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationThresholds::default(),
            milestones: DEFAULT_MILESTONES.to_vec(),
            completion_window_days: DEFAULT_COMPLETION_WINDOW_DAYS,
            chart: ChartConfig::default(),
            community: CommunityConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Check the thresholds are mutually consistent
    pub fn validate(&self) -> Result<(), EngineError> {
        let cal = &self.calibration;
        if cal.min_logs_for_score == 0 {
            return Err(EngineError::InvalidConfig(
                "min_logs_for_score must be positive".to_string(),
            ));
        }
        if cal.logs_for_established < cal.min_logs_for_score {
            return Err(EngineError::InvalidConfig(format!(
                "logs_for_established ({}) is below min_logs_for_score ({})",
                cal.logs_for_established, cal.min_logs_for_score
            )));
        }
        if self.milestones.is_empty() {
            return Err(EngineError::InvalidConfig(
                "milestone ladder is empty".to_string(),
            ));
        }
        if self.milestones.windows(2).any(|w| w[0] >= w[1]) || self.milestones[0] == 0 {
            return Err(EngineError::InvalidConfig(
                "milestones must be positive and strictly increasing".to_string(),
            ));
        }
        if self.completion_window_days == 0 {
            return Err(EngineError::InvalidConfig(
                "completion_window_days must be positive".to_string(),
            ));
        }
        let chart = &self.chart;
        if chart.quarter_buckets == 0 || chart.year_buckets == 0 || chart.all_time_buckets == 0 {
            return Err(EngineError::InvalidConfig(
                "chart bucket targets must be positive".to_string(),
            ));
        }
        let community = &self.community;
        if community.min_participants == 0
            || community.min_participants > community.max_participants
        {
            return Err(EngineError::InvalidConfig(format!(
                "participant range {}..={} is empty",
                community.min_participants, community.max_participants
            )));
        }
        if community.history_weeks == 0 {
            return Err(EngineError::InvalidConfig(
                "history_weeks must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate configuration from JSON. Missing sections use defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate().map_err(|e| {
            tracing::warn!(error = %e, "Rejected engine configuration");
            e
        })?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::EncodingError(e.to_string()))
    }
}
