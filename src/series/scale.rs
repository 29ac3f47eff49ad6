//! Axis scaling heuristics
//!
//! Picks a padded, human-friendly axis ceiling for a chart so the tallest bar
//! never touches the top and currency axes never show ugly fractions.

use super::ValueKind;

/// Axis ceiling when a value series has no data
pub const DEFAULT_VALUE_MAX: f64 = 10.0;

/// Axis ceiling when a completion series has no data
pub const DEFAULT_COMPLETION_MAX: f64 = 1.0;

/// Axis ceiling when a currency series has no data
pub const DEFAULT_CURRENCY_MAX: f64 = 1.0;

/// Headroom multiplier by magnitude: small values get proportionally more
pub fn padding_factor(max_value: f64) -> f64 {
    if max_value < 10.0 {
        1.5
    } else if max_value < 30.0 {
        1.4
    } else {
        1.35
    }
}

/// Step used to round currency axes up, by magnitude
pub fn currency_step(padded: f64) -> f64 {
    if padded <= 1.0 {
        0.25
    } else if padded <= 5.0 {
        0.5
    } else if padded <= 10.0 {
        1.0
    } else if padded <= 50.0 {
        5.0
    } else if padded <= 100.0 {
        10.0
    } else {
        25.0
    }
}

/// Round up to the next multiple of `step`
pub fn round_up_to(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).ceil() * step
}

/// Axis ceiling for a non-currency series
pub fn value_display_max(max_value: f64, kind: ValueKind) -> f64 {
    if !max_value.is_finite() || max_value <= 0.0 {
        return match kind {
            ValueKind::Completion => DEFAULT_COMPLETION_MAX,
            ValueKind::Duration | ValueKind::Count => DEFAULT_VALUE_MAX,
        };
    }
    let padded = max_value * padding_factor(max_value);
    padded.ceil().max(1.0)
}

/// Axis ceiling for a currency series, in display units
pub fn currency_display_max(max_value: f64) -> f64 {
    if !max_value.is_finite() || max_value <= 0.0 {
        return DEFAULT_CURRENCY_MAX;
    }
    let padded = max_value * padding_factor(max_value);
    round_up_to(padded, currency_step(padded))
}
