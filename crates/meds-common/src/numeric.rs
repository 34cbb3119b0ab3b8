//! Numeric parsing and formatting utilities.
//!
//! Value columns arrive either as floats or as free text, and derived labels are
//! written back as strings. Formatting follows the conventions of the upstream
//! MEDS tooling so that vocabularies stay comparable across implementations:
//! integral floats keep a trailing `.0` (`7.0`, not `7`).

/// Parses a string as f64, returning None for invalid or empty strings.
///
/// # Examples
///
/// ```
/// use meds_common::parse_f64;
///
/// assert_eq!(parse_f64(" 4.5 "), Some(4.5));
/// assert_eq!(parse_f64("Q3"), None);
/// assert_eq!(parse_f64(""), None);
/// ```
pub fn parse_f64(value: &str) -> Option<f64> {
    if value.trim().is_empty() {
        return None;
    }
    value.trim().parse::<f64>().ok()
}

/// Parses a string as i64, returning None for invalid or empty strings.
pub fn parse_i64(value: &str) -> Option<i64> {
    if value.trim().is_empty() {
        return None;
    }
    value.trim().parse::<i64>().ok()
}

/// Formats a float the way a Python `str(float)` would for ordinary magnitudes.
///
/// # Examples
///
/// ```
/// use meds_common::format_float;
///
/// assert_eq!(format_float(7.0), "7.0");
/// assert_eq!(format_float(-10.5), "-10.5");
/// assert_eq!(format_float(0.25), "0.25");
/// ```
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Formats a float with a fixed number of decimal places.
///
/// ```
/// use meds_common::format_fixed;
///
/// assert_eq!(format_fixed(3.14159, 2), "3.14");
/// assert_eq!(format_fixed(2.0, 0), "2");
/// ```
pub fn format_fixed(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

/// Rounds to `decimals` places using round-half-to-even on the scaled value.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_float_keeps_trailing_zero() {
        assert_eq!(format_float(45.0), "45.0");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(1.25), "1.25");
    }

    #[test]
    fn format_float_non_finite() {
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn round_to_two_places() {
        assert_eq!(round_to(7.126, 2), 7.13);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
    }

    #[test]
    fn parse_i64_rejects_floats() {
        assert_eq!(parse_i64("12"), Some(12));
        assert_eq!(parse_i64("12.5"), None);
    }
}
