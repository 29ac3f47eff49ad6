//! Habit Engine - On-device analytics for habit tracking
//!
//! The engine turns a host's habits and completion logs into everything a
//! habit dashboard shows: streaks, calibration, goal progress, charts,
//! heatmaps, calendars and narrative insights. Every computation is a pure
//! function of its inputs plus an injected [`EngineContext`] (the current
//! instant and the user's UTC offset), so results are reproducible.
//!
//! ## Modules
//!
//! - **Records**: [`types`], [`money`] (fixed-point micro-units), [`clock`]
//! - **Per-habit stats**: [`daily`], [`streak`], [`calibration`], [`goal`], [`insight`]
//! - **Presentation**: [`temporal`] (periods, month grids), [`series`] (charts, heatmaps)
//! - **Community**: [`community`] simulated peer distributions and their cache
//! - **Orchestration**: [`pipeline`] ([`HabitEngine`], JSON dashboard entry point)
//!
//! Malformed-but-recoverable input never fails: the engine falls back to a
//! sensible default, logs a warning and attaches a [`DegradationFlag`].

pub mod calibration;
pub mod clock;
pub mod community;
pub mod config;
pub mod daily;
pub mod error;
pub mod goal;
pub mod insight;
pub mod money;
pub mod pipeline;
pub mod series;
pub mod streak;
pub mod temporal;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use clock::{Clock, EngineContext, FixedClock, SystemClock};
pub use community::{DistributionCache, DistributionMode, DistributionSnapshot};
pub use config::EngineConfig;
pub use error::EngineError;
pub use pipeline::{dashboard_from_json, Dashboard, HabitEngine, HabitReport};
pub use series::{ChartSeries, ChartView};
pub use types::{
    ChartPeriod, DegradationFlag, Goal, GoalPeriod, Habit, LogEntry, RateType, Resolved, Schedule,
};

/// Engine version embedded in generated reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and FFI
pub const PRODUCER_NAME: &str = "habit-engine";
