//! Fixed-point money
//!
//! Rates and earnings are integer counts of micro-units (one millionth of a
//! currency unit). Summing thousands of tiny per-step rates in floating point
//! drifts visibly; integers do not. Rounding to cents happens once, in the
//! display helpers at the bottom of this module.

use crate::types::RateType;

/// Micro-units per display-currency unit
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// Micro-units per cent
pub const MICROS_PER_CENT: i64 = 10_000;

/// Convert a decimal amount to micro-units (nearest micro-unit)
pub fn units_to_micros(units: f64) -> i64 {
    if !units.is_finite() {
        return 0;
    }
    let scaled = (units * MICROS_PER_UNIT as f64).round();
    scaled.clamp(i64::MIN as f64, i64::MAX as f64) as i64
}

/// Convert micro-units back to a decimal amount
pub fn micros_to_units(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_UNIT as f64
}

/// Earnings for one log entry.
///
/// Binary habits earn the flat rate regardless of units. Per-unit habits earn
/// `rate × units`, truncated toward zero at the micro-unit boundary so many
/// small entries never overstate the total.
pub fn compute_earnings_micros(rate_type: RateType, rate_micros: i64, units_micros: i64) -> i64 {
    if rate_type.is_binary() {
        return rate_micros;
    }
    let product = rate_micros as i128 * units_micros as i128 / MICROS_PER_UNIT as i128;
    product.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Earnings for a number of completions at a flat rate
pub fn flat_earnings_micros(rate_micros: i64, completions: f64) -> i64 {
    compute_earnings_micros(RateType::Count, rate_micros, units_to_micros(completions))
}

/// Saturating sum of micro-unit amounts
pub fn sum_micros<I: IntoIterator<Item = i64>>(amounts: I) -> i64 {
    amounts.into_iter().fold(0i64, |acc, m| acc.saturating_add(m))
}

/// Round to whole cents, half away from zero
pub fn micros_to_cents(micros: i64) -> i64 {
    let half = MICROS_PER_CENT / 2;
    if micros >= 0 {
        micros.saturating_add(half) / MICROS_PER_CENT
    } else {
        micros.saturating_sub(half) / MICROS_PER_CENT
    }
}

/// Display value rounded to cents, for chart axes and JSON view models
pub fn micros_to_display_value(micros: i64) -> f64 {
    micros_to_cents(micros) as f64 / 100.0
}

/// Format as a currency string, e.g. `$1,234.50` or `-$0.25`
pub fn micros_to_display(micros: i64) -> String {
    let cents = micros_to_cents(micros);
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let whole = group_thousands(abs / 100);
    format!("{sign}${whole}.{:02}", abs % 100)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
