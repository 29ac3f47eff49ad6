//! Community distribution simulator
//!
//! Synthesizes a plausible population of peer index scores for a behavior.
//! The data is synthetic. A snapshot is generated once and held by the host
//! in a [`DistributionCache`] until it is explicitly invalidated; `generate`
//! is not memoized and returns a fresh draw on every call.

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::CommunityConfig;
use crate::error::EngineError;
use crate::types::{DegradationFlag, Resolved};

/// Bounds for each week of the trend history
pub const HISTORY_FLOOR: f64 = 50.0;
pub const HISTORY_CEILING: f64 = 90.0;

/// Lower score bound of each bucket, lowest first. The top bucket ends at 100.
pub const BUCKET_LOWER_BOUNDS: [f64; 5] = [0.0, 40.0, 55.0, 70.0, 85.0];

/// Shape of the simulated population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    Realistic,
    High,
    Mixed,
}

struct ModeParams {
    mean: f64,
    std_dev: f64,
    change_mean: f64,
    change_std_dev: f64,
    /// Share of participants per bucket, lowest first
    ratios: [f64; 5],
}

impl DistributionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionMode::Realistic => "realistic",
            DistributionMode::High => "high",
            DistributionMode::Mixed => "mixed",
        }
    }

    /// Parse a token, falling back to `realistic` for anything unrecognized
    pub fn resolve(token: &str) -> Resolved<DistributionMode> {
        match token.parse() {
            Ok(mode) => Resolved::exact(mode),
            Err(_) => {
                tracing::warn!(token = %token, "Unknown distribution mode, using realistic");
                Resolved::fallback(
                    DistributionMode::Realistic,
                    DegradationFlag::UnknownDistributionMode,
                )
            }
        }
    }

    fn params(&self) -> ModeParams {
        match self {
            DistributionMode::Realistic => ModeParams {
                mean: 62.0,
                std_dev: 8.0,
                change_mean: 1.5,
                change_std_dev: 2.0,
                ratios: [0.15, 0.25, 0.30, 0.20, 0.10],
            },
            DistributionMode::High => ModeParams {
                mean: 74.0,
                std_dev: 6.0,
                change_mean: 2.5,
                change_std_dev: 1.5,
                ratios: [0.05, 0.15, 0.30, 0.30, 0.20],
            },
            DistributionMode::Mixed => ModeParams {
                mean: 66.0,
                std_dev: 12.0,
                change_mean: 0.5,
                change_std_dev: 3.0,
                ratios: [0.20, 0.20, 0.20, 0.20, 0.20],
            },
        }
    }
}

impl FromStr for DistributionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "realistic" => Ok(DistributionMode::Realistic),
            "high" => Ok(DistributionMode::High),
            "mixed" => Ok(DistributionMode::Mixed),
            other => Err(format!("unknown distribution mode: {other}")),
        }
    }
}

impl fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participants per score tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionBuckets {
    pub struggling: u32,
    pub starting: u32,
    pub building: u32,
    pub strong: u32,
    pub top: u32,
}

impl DistributionBuckets {
    /// Split `participants` by `ratios`. The lowest tier absorbs the rounding
    /// remainder, so the counts always sum to `participants`.
    pub fn partition(participants: u32, ratios: [f64; 5]) -> Self {
        let share = |ratio: f64| (participants as f64 * ratio).floor() as u32;
        let starting = share(ratios[1]);
        let building = share(ratios[2]);
        let strong = share(ratios[3]);
        let top = share(ratios[4]);
        let assigned = starting
            .saturating_add(building)
            .saturating_add(strong)
            .saturating_add(top)
            .min(participants);

        Self {
            struggling: participants - assigned,
            starting,
            building,
            strong,
            top,
        }
    }

    pub fn as_array(&self) -> [u32; 5] {
        [
            self.struggling,
            self.starting,
            self.building,
            self.strong,
            self.top,
        ]
    }

    pub fn total(&self) -> u64 {
        self.as_array().iter().map(|c| *c as u64).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// 1 is the oldest week; the last point is the current week
    pub week: u32,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSnapshot {
    pub snapshot_id: Uuid,
    pub behavior_id: String,
    pub mode: DistributionMode,
    pub participants: u32,
    pub index_average: f64,
    /// Week-over-week change of the index average, in percent
    pub change_percent: f64,
    pub buckets: DistributionBuckets,
    pub history: Vec<HistoryPoint>,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<DegradationFlag>,
}

/// Draw a fresh snapshot for a behavior.
///
/// Not memoized: two calls return different populations. Hold the result in a
/// [`DistributionCache`] to keep it stable across reads.
pub fn generate<R: Rng + ?Sized>(
    behavior_id: &str,
    mode_token: &str,
    config: &CommunityConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> DistributionSnapshot {
    let resolved = DistributionMode::resolve(mode_token);
    let mode = resolved.value;
    let params = mode.params();

    let (low, high) = if config.min_participants <= config.max_participants {
        (config.min_participants, config.max_participants)
    } else {
        (config.max_participants, config.min_participants)
    };
    let participants = rng.gen_range(low..=high);

    let index_average = round_to_tenth(
        sample_normal(rng, params.mean, params.std_dev).clamp(0.0, 100.0),
    );
    let change_percent = round_to_tenth(sample_normal(
        rng,
        params.change_mean,
        params.change_std_dev,
    ));
    let buckets = DistributionBuckets::partition(participants, params.ratios);
    let history = history_walk(rng, index_average, config.history_weeks);

    let bytes: [u8; 16] = rng.gen();
    let snapshot_id = uuid::Builder::from_random_bytes(bytes).into_uuid();

    tracing::debug!(
        behavior_id = %behavior_id,
        mode = %mode,
        participants,
        index_average,
        "Generated community snapshot"
    );

    DistributionSnapshot {
        snapshot_id,
        behavior_id: behavior_id.to_string(),
        mode,
        participants,
        index_average,
        change_percent,
        buckets,
        history,
        generated_at: now,
        flags: resolved.flag.into_iter().collect(),
    }
}

/// Reproducible snapshot for tests and demos
pub fn generate_seeded(
    behavior_id: &str,
    mode_token: &str,
    config: &CommunityConfig,
    now: DateTime<Utc>,
    seed: u64,
) -> DistributionSnapshot {
    let mut rng = StdRng::seed_from_u64(seed);
    generate(behavior_id, mode_token, config, now, &mut rng)
}

/// Backward random walk from the current average, oldest week first
fn history_walk<R: Rng + ?Sized>(rng: &mut R, current: f64, weeks: u32) -> Vec<HistoryPoint> {
    let weeks = weeks.max(1);
    let mut averages = Vec::with_capacity(weeks as usize);
    let mut value = current.clamp(HISTORY_FLOOR, HISTORY_CEILING);
    averages.push(value);
    for _ in 1..weeks {
        let step = sample_normal(rng, 0.4, 0.8);
        value = (value - step).clamp(HISTORY_FLOOR, HISTORY_CEILING);
        averages.push(value);
    }
    averages.reverse();

    averages
        .into_iter()
        .enumerate()
        .map(|(i, average)| HistoryPoint {
            week: i as u32 + 1,
            average: round_to_tenth(average),
        })
        .collect()
}

/// Box-Muller transform over two uniform draws
fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    // 1 - u keeps the log argument in (0, 1]
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    mean + std_dev * z
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Approximate percentile rank (0-100) of `score` within a snapshot.
///
/// This is an estimate, not an exact rank. It finds the score bucket and
/// assumes its participants are spread evenly across the bucket's score
/// range, then interpolates linearly. Returns 0.0 for an empty population.
pub fn estimate_percentile(score: f64, snapshot: &DistributionSnapshot) -> f64 {
    let total = snapshot.buckets.total();
    if total == 0 || !score.is_finite() {
        return 0.0;
    }
    let score = score.clamp(0.0, 100.0);
    let counts = snapshot.buckets.as_array();

    let index = BUCKET_LOWER_BOUNDS
        .iter()
        .rposition(|lower| score >= *lower)
        .unwrap_or(0);
    let lower = BUCKET_LOWER_BOUNDS[index];
    let upper = BUCKET_LOWER_BOUNDS.get(index + 1).copied().unwrap_or(100.0);

    let below: u64 = counts[..index].iter().map(|c| *c as u64).sum();
    let within = if upper > lower {
        ((score - lower) / (upper - lower)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let rank = below as f64 + counts[index] as f64 * within;

    (rank * 100.0 / total as f64).clamp(0.0, 100.0)
}

/// Host-owned store of snapshots keyed by behavior id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionCache {
    snapshots: BTreeMap<String, DistributionSnapshot>,
}

impl DistributionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, behavior_id: &str) -> Option<&DistributionSnapshot> {
        let found = self.snapshots.get(behavior_id);
        tracing::debug!(
            behavior_id = %behavior_id,
            hit = found.is_some(),
            "Community cache lookup"
        );
        found
    }

    /// Store a snapshot, returning the one it replaced
    pub fn put(&mut self, snapshot: DistributionSnapshot) -> Option<DistributionSnapshot> {
        tracing::debug!(behavior_id = %snapshot.behavior_id, "Community cache put");
        self.snapshots.insert(snapshot.behavior_id.clone(), snapshot)
    }

    pub fn invalidate(&mut self, behavior_id: &str) -> Option<DistributionSnapshot> {
        tracing::debug!(behavior_id = %behavior_id, "Community cache invalidate");
        self.snapshots.remove(behavior_id)
    }

    pub fn clear(&mut self) {
        tracing::debug!(entries = self.snapshots.len(), "Community cache cleared");
        self.snapshots.clear();
    }

    /// Return the cached snapshot, generating and storing one on a miss
    pub fn get_or_create<R: Rng + ?Sized>(
        &mut self,
        behavior_id: &str,
        mode_token: &str,
        config: &CommunityConfig,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> &DistributionSnapshot {
        match self.snapshots.entry(behavior_id.to_string()) {
            Entry::Occupied(entry) => {
                tracing::debug!(behavior_id = %behavior_id, "Community cache hit");
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                tracing::debug!(behavior_id = %behavior_id, "Community cache miss");
                entry.insert(generate(behavior_id, mode_token, config, now, rng))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn behavior_ids(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let cache: Self = serde_json::from_str(json)?;
        if let Some((key, snapshot)) = cache
            .snapshots
            .iter()
            .find(|(key, snapshot)| **key != snapshot.behavior_id)
        {
            return Err(EngineError::ParseError(format!(
                "cache entry {key} holds snapshot for {}",
                snapshot.behavior_id
            )));
        }
        Ok(cache)
    }
}
