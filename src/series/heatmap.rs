//! Calendar heatmap intensities

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::daily::DailyTotals;
use crate::temporal::PeriodRange;

/// Highest intensity level
pub const MAX_INTENSITY: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatCell {
    pub date: NaiveDate,
    pub value: f64,
    /// 0 (no log) through 4
    pub intensity: u8,
}

/// Intensity of a day relative to the busiest day on record.
///
/// A logged day always scores at least 1, even with a zero value.
pub fn intensity(value: f64, max_value: f64, has_log: bool) -> u8 {
    if !has_log {
        return 0;
    }
    if max_value <= 0.0 || !value.is_finite() {
        return 1;
    }
    let ratio = value / max_value;
    if ratio >= 0.75 {
        4
    } else if ratio >= 0.5 {
        3
    } else if ratio >= 0.25 {
        2
    } else {
        1
    }
}

/// One cell per date in `range`, scaled against the whole history in `totals`
pub fn heatmap(totals: &DailyTotals, range: &PeriodRange) -> Vec<HeatCell> {
    let max_value = totals.max_quantity();
    range
        .dates
        .iter()
        .map(|&date| {
            let value = totals.quantity_on(date);
            HeatCell {
                date,
                value,
                intensity: intensity(value, max_value, totals.has_log(date)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::EngineContext;
    use crate::temporal::period_range;
    use crate::types::{ChartPeriod, LogEntry, RateType};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_intensity_quartiles() {
        assert_eq!(intensity(0.0, 100.0, false), 0);
        assert_eq!(intensity(10.0, 100.0, true), 1);
        assert_eq!(intensity(25.0, 100.0, true), 2);
        assert_eq!(intensity(50.0, 100.0, true), 3);
        assert_eq!(intensity(75.0, 100.0, true), 4);
        assert_eq!(intensity(100.0, 100.0, true), MAX_INTENSITY);
        assert_eq!(intensity(0.0, 0.0, true), 1);
    }

    #[test]
    fn test_heatmap_scales_to_full_history() {
        let ctx = EngineContext::utc(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap());
        let at = |m, d| Utc.with_ymd_and_hms(2024, m, d, 8, 0, 0).unwrap();
        let logs = vec![
            // the record day sits outside the charted week
            LogEntry::new("a", "h", at(1, 5), Some(100.0), 0),
            LogEntry::new("b", "h", at(3, 9), Some(60.0), 0),
            LogEntry::new("c", "h", at(3, 10), Some(20.0), 0),
        ];
        let totals = DailyTotals::from_logs(&logs, RateType::Duration, &ctx);
        let range = period_range(ChartPeriod::Week, ctx.today(), totals.first_day());
        let cells = heatmap(&totals, &range);

        assert_eq!(cells.len(), 7);
        let levels: Vec<u8> = cells.iter().map(|c| c.intensity).collect();
        assert_eq!(levels, vec![0, 0, 0, 0, 0, 3, 1]);
        assert_eq!(cells[5].value, 60.0);
    }
}
