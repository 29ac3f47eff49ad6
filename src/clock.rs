//! Injectable time source
//!
//! Every temporal computation takes an [`EngineContext`] rather than reading
//! the wall clock, so tests can pin "today" deterministically.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The instant and local offset a computation is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineContext {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl EngineContext {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    /// Context in UTC
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, utc_offset())
    }

    /// Read the clock once and freeze the result
    pub fn from_clock(clock: &dyn Clock, offset: FixedOffset) -> Self {
        Self::new(clock.now(), offset)
    }

    /// Context with an offset given in minutes east of UTC; out-of-range offsets fall back to UTC
    pub fn with_offset_minutes(now: DateTime<Utc>, minutes: i32) -> Self {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(minutes, "UTC offset out of range, using UTC");
                utc_offset()
            });
        Self::new(now, offset)
    }

    /// Calendar day of "now" in the local offset
    pub fn today(&self) -> NaiveDate {
        self.day_of(self.now)
    }

    /// Calendar day of an instant in the local offset (time of day stripped)
    ///
    /// At the edges of the representable range the shifted instant may not
    /// exist; the UTC day is used instead.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        let shift = Duration::seconds(self.offset.local_minus_utc() as i64);
        instant
            .naive_utc()
            .checked_add_signed(shift)
            .unwrap_or_else(|| instant.naive_utc())
            .date()
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}
