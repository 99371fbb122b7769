// Parsing and numeric helpers shared across the pipeline.
//
// All the forgiving string-to-number handling lives here so the loader and
// aggregation code can assume clean, typed values.
use num_format::{Locale, ToFormattedString};

/// Parse a cell into `i64`, tolerating the formatting noise common in
/// exported administrative tables: surrounding whitespace and `","`
/// thousands separators. Returns `None` for anything else.
pub fn parse_i64_cell(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    s.replace(',', "").parse::<i64>().ok()
}

/// Same as [`parse_i64_cell`] but for floating-point cells (areas,
/// percentages).
pub fn parse_f64_cell(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    s.replace(',', "").parse::<f64>().ok()
}

/// Arithmetic mean; `None` for an empty slice so callers can distinguish
/// "no members" from a genuine zero.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

/// Round to the nearest integer, ties to even (banker's rounding). Used
/// wherever an averaged count is displayed as a whole number.
pub fn round_half_even(x: f64) -> i64 {
    let floor = x.floor();
    let frac = x - floor;
    if (frac - 0.5).abs() < f64::EPSILON {
        let f = floor as i64;
        if f % 2 == 0 {
            f
        } else {
            f + 1
        }
    } else {
        x.round() as i64
    }
}

/// Format an integer count with thousands separators (`1,234,567`).
pub fn format_int(n: i64) -> String {
    if n < 0 {
        format!("-{}", (-n).to_formatted_string(&Locale::en))
    } else {
        n.to_formatted_string(&Locale::en)
    }
}

/// Format a float with a fixed number of decimals and thousands separators
/// in the integer part (`1,234.5`).
pub fn format_float(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part: i64 = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let mut out = int_part.to_formatted_string(&Locale::en);
    if let Some(frac) = parts.next() {
        out.push('.');
        out.push_str(frac);
    }
    if neg {
        format!("-{}", out)
    } else {
        out
    }
}

/// Format a signed delta for KPI display (`+312` / `-45` / `0`).
pub fn format_delta(n: i64) -> String {
    if n > 0 {
        format!("+{}", format_int(n))
    } else {
        format_int(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_separated_numbers() {
        assert_eq!(parse_i64_cell(" 55,000 "), Some(55_000));
        assert_eq!(parse_i64_cell(""), None);
        assert_eq!(parse_i64_cell("n/a"), None);
        assert_eq!(parse_f64_cell("1,234.5"), Some(1234.5));
        assert_eq!(parse_f64_cell("abc"), None);
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[55_000.0, 35_000.0]), Some(45_000.0));
    }

    #[test]
    fn rounding_ties_go_to_even() {
        assert_eq!(round_half_even(2.5), 2);
        assert_eq!(round_half_even(3.5), 4);
        assert_eq!(round_half_even(-2.5), -2);
        assert_eq!(round_half_even(-3.5), -4);
        assert_eq!(round_half_even(2.4), 2);
        assert_eq!(round_half_even(2.6), 3);
        assert_eq!(round_half_even(45_000.0), 45_000);
    }

    #[test]
    fn formats_counts_and_floats() {
        assert_eq!(format_int(1_234_567), "1,234,567");
        assert_eq!(format_int(-9_855), "-9,855");
        assert_eq!(format_float(1234.56, 1), "1,234.6");
        assert_eq!(format_float(0.0, 1), "0.0");
        assert_eq!(format_delta(312), "+312");
        assert_eq!(format_delta(-45), "-45");
    }
}
