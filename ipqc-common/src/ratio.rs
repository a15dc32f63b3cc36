//! Potting mixing ratio
//!
//! The Auto Potting mixing-ratio parameter records the weights of resin
//! Part A and hardener Part B; the Ratio field is derived from them on
//! every edit. Parsing and rounding follow the browser form the checksheet
//! was first used in: leading-number parsing, integer scaling by the
//! longer decimal tail, Euclid's gcd, and half-up `toFixed` formatting.

/// Field names of a derived-ratio parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixingRatioFields {
    pub part_a: &'static str,
    pub part_b: &'static str,
    pub ratio: &'static str,
}

/// Fields of the Auto Potting mixing-ratio parameter
pub const POTTING_MIX: MixingRatioFields = MixingRatioFields {
    part_a: "Part A",
    part_b: "Part B",
    ratio: "Ratio",
};

/// Business rule attached to a parameter's observation updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedRule {
    /// Recompute `ratio` whenever `part_a` or `part_b` changes
    MixingRatio(MixingRatioFields),
}

impl DerivedRule {
    /// Whether an edit to `field` requires recomputation
    pub fn triggered_by(&self, field: &str) -> bool {
        match self {
            DerivedRule::MixingRatio(f) => field == f.part_a || field == f.part_b,
        }
    }
}

/// Normalized "A:B" ratio string, or "" when it cannot be computed
///
/// Blank or non-numeric inputs and a zero Part B clear the ratio.
pub fn compute_mixing_ratio(part_a: &str, part_b: &str) -> String {
    let (Some(a), Some(b)) = (parse_leading_number(part_a), parse_leading_number(part_b)) else {
        return String::new();
    };
    if b == 0.0 {
        return String::new();
    }

    let decimals = decimal_places(a).max(decimal_places(b));
    let scale = 10f64.powi(decimals as i32);
    let (Some(scaled_a), Some(scaled_b)) = (
        to_exact_integer(js_round(a * scale)),
        to_exact_integer(js_round(b * scale)),
    ) else {
        return String::new();
    };

    let divisor = gcd(scaled_a, scaled_b);
    if divisor == 0 {
        return String::new();
    }
    let ratio_a = (scaled_a / divisor) as f64;
    let ratio_b = (scaled_b / divisor) as f64;
    if ratio_b == 0.0 {
        return String::new();
    }

    format!(
        "{}:{}",
        to_fixed(ratio_a / ratio_b, 2),
        to_fixed(ratio_b / ratio_b, 0)
    )
}

/// Largest magnitude an f64 holds with integer precision (2^53 - 1)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Integer value of a rounded scaled reading, or None outside the exact range
fn to_exact_integer(x: f64) -> Option<i64> {
    (x.is_finite() && x.abs() <= MAX_EXACT_INTEGER).then(|| x as i64)
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Math.round: halves round toward +infinity
fn js_round(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Digits after the decimal point in the shortest representation
fn decimal_places(x: f64) -> usize {
    let text = x.to_string();
    text.split_once('.').map(|(_, tail)| tail.len()).unwrap_or(0)
}

/// parseFloat: longest numeric prefix after leading whitespace
fn parse_leading_number(input: &str) -> Option<f64> {
    let text = input.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Number.prototype.toFixed: exact decimal expansion rounded half-up
fn to_fixed(x: f64, digits: usize) -> String {
    if !x.is_finite() {
        return x.to_string();
    }
    let negative = x < 0.0;
    // Enough extra digits that the first dropped digit is exact
    let expanded = format!("{:.*}", digits + 30, x.abs());
    let (int_part, frac_part) = expanded.split_once('.').unwrap_or((expanded.as_str(), ""));

    let mut kept: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().take(digits))
        .map(|b| b - b'0')
        .collect();
    let round_up = frac_part.as_bytes().get(digits).map_or(false, |d| *d >= b'5');

    if round_up {
        let mut i = kept.len();
        loop {
            if i == 0 {
                kept.insert(0, 1);
                break;
            }
            i -= 1;
            if kept[i] == 9 {
                kept[i] = 0;
            } else {
                kept[i] += 1;
                break;
            }
        }
    }

    let int_len = kept.len() - digits;
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.extend(kept[..int_len].iter().map(|d| char::from(b'0' + d)));
    if digits > 0 {
        out.push('.');
        out.extend(kept[int_len..].iter().map(|d| char::from(b'0' + d)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_normalizes_to_one() {
        assert_eq!(compute_mixing_ratio("10", "3"), "3.33:1");
        assert_eq!(compute_mixing_ratio("10", "5"), "2.00:1");
        assert_eq!(compute_mixing_ratio("100", "25"), "4.00:1");
    }

    #[test]
    fn test_ratio_with_decimals() {
        // 2.5:0.5 scales to 25:5 before reduction
        assert_eq!(compute_mixing_ratio("2.5", "0.5"), "5.00:1");
        assert_eq!(compute_mixing_ratio("1.25", "1"), "1.25:1");
    }

    #[test]
    fn test_ratio_rounds_half_up() {
        // 9/8 = 1.125 exactly; toFixed(2) rounds the tie upward
        assert_eq!(compute_mixing_ratio("9", "8"), "1.13:1");
    }

    #[test]
    fn test_ratio_cleared_for_bad_input() {
        assert_eq!(compute_mixing_ratio("", "5"), "");
        assert_eq!(compute_mixing_ratio("10", ""), "");
        assert_eq!(compute_mixing_ratio("10", "0"), "");
        assert_eq!(compute_mixing_ratio("abc", "2"), "");
        assert_eq!(compute_mixing_ratio("10", "   "), "");
    }

    #[test]
    fn test_ratio_out_of_range_is_cleared() {
        assert_eq!(compute_mixing_ratio("-1e19", "-1"), "");
        assert_eq!(compute_mixing_ratio("1", "-1e19"), "");
        assert_eq!(compute_mixing_ratio("1e300", "1"), "");
        assert_eq!(compute_mixing_ratio("1.5", "1e16"), "");
    }

    #[test]
    fn test_ratio_with_negative_parts() {
        assert_eq!(compute_mixing_ratio("-10", "-5"), "2.00:1");
        assert_eq!(compute_mixing_ratio("-10", "5"), "-2.00:1");
    }

    #[test]
    fn test_leading_number_parsing() {
        assert_eq!(parse_leading_number(" 12.5kg"), Some(12.5));
        assert_eq!(parse_leading_number(".5"), Some(0.5));
        assert_eq!(parse_leading_number("5."), Some(5.0));
        assert_eq!(parse_leading_number("1e2"), Some(100.0));
        assert_eq!(parse_leading_number("-"), None);
        assert_eq!(parse_leading_number("."), None);
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(3.3333333, 2), "3.33");
        assert_eq!(to_fixed(0.995, 2), "0.99"); // 0.995 is stored below the tie
        assert_eq!(to_fixed(9.999, 2), "10.00");
        assert_eq!(to_fixed(1.0, 0), "1");
        assert_eq!(to_fixed(-1.005, 2), "-1.00");
    }

    #[test]
    fn test_triggers() {
        let rule = DerivedRule::MixingRatio(POTTING_MIX);
        assert!(rule.triggered_by("Part A"));
        assert!(rule.triggered_by("Part B"));
        assert!(!rule.triggered_by("Ratio"));
    }
}
