//! Conversions from raw telemetry fields to metric values.

use std::num::IntErrorKind;

use once_cell::sync::Lazy;
use regex::Regex;

/// Value the firmware reports when no filament is loaded.
pub const NO_MATERIAL: &str = "---";

// Each segment is optional: "1d 2h 3m 4s", "  1d  0h 54m", "5s", "".
static PRINT_DURATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:([0-9]+)d)?\s*(?:([0-9]+)h)?\s*(?:([0-9]+)m)?\s*(?:([0-9]+)s)?\s*$").unwrap()
});

const SECONDS_PER_UNIT: [u64; 4] = [24 * 60 * 60, 60 * 60, 60, 1];

/// Parse a firmware print duration such as `"1d 0h 54m"` into seconds.
///
/// Parsing is lenient: empty or malformed input yields zero. Oversized
/// segments saturate at `u64::MAX`.
pub fn parse_print_duration(input: &str) -> u64 {
    let Some(caps) = PRINT_DURATION_REGEX.captures(input) else {
        return 0;
    };

    SECONDS_PER_UNIT
        .iter()
        .enumerate()
        .filter_map(|(i, scale)| {
            let amount = saturating_parse(caps.get(i + 1)?.as_str());
            Some(amount.saturating_mul(*scale))
        })
        .fold(0u64, u64::saturating_add)
}

// Input is ASCII digits only, so overflow is the one possible failure.
fn saturating_parse(digits: &str) -> u64 {
    match digits.parse::<u64>() {
        Ok(amount) => amount,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => u64::MAX,
        Err(_) => 0,
    }
}

/// Convert a 0-100 percentage to a 0-1 ratio.
pub fn percent_to_ratio(percent: f64) -> f64 {
    percent / 100.0
}

/// Job progress as a ratio.
///
/// Zero progress is reported the same as missing progress.
pub fn progress_ratio(progress: Option<f64>) -> Option<f64> {
    progress
        .filter(|p| *p != 0.0 && !p.is_nan())
        .map(percent_to_ratio)
}

/// The loaded material, if any.
///
/// Returns the raw value, untrimmed, when it names an actual material.
pub fn loaded_material(material: Option<&str>) -> Option<&str> {
    material.filter(|m| {
        let trimmed = m.trim();
        !trimmed.is_empty() && trimmed != NO_MATERIAL
    })
}

/// Check that a metric name prefix is Prometheus-compatible.
///
/// Prefixes must match `[a-zA-Z_][a-zA-Z0-9_]*`. An empty prefix is allowed
/// and means no prefix.
pub fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        None => true,
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_print_duration_full() {
        assert_eq!(parse_print_duration("1d 0h 54m"), 89_640);
        assert_eq!(parse_print_duration("  1d  0h 54m"), 89_640);
        assert_eq!(parse_print_duration("1d 2h 3m 4s"), 93_784);
    }

    #[test]
    fn test_parse_print_duration_partial() {
        assert_eq!(parse_print_duration("5s"), 5);
        assert_eq!(parse_print_duration("2h 30s"), 7_230);
        assert_eq!(parse_print_duration("17m"), 1_020);
        assert_eq!(parse_print_duration("3d"), 259_200);
    }

    #[test]
    fn test_parse_print_duration_whitespace() {
        assert_eq!(parse_print_duration("1h2m"), 3_720);
        assert_eq!(parse_print_duration("\t1h \n 2m  "), 3_720);
    }

    #[test]
    fn test_parse_print_duration_empty() {
        assert_eq!(parse_print_duration(""), 0);
        assert_eq!(parse_print_duration("   "), 0);
    }

    #[test]
    fn test_parse_print_duration_malformed() {
        assert_eq!(parse_print_duration("soon"), 0);
        assert_eq!(parse_print_duration("1x"), 0);
        assert_eq!(parse_print_duration("54m 1d"), 0);
        assert_eq!(parse_print_duration("1d garbage"), 0);
        assert_eq!(parse_print_duration("-5s"), 0);
    }

    #[test]
    fn test_parse_print_duration_saturates() {
        assert_eq!(parse_print_duration("99999999999999999999d"), u64::MAX);
        assert_eq!(parse_print_duration("999999999999999999d"), u64::MAX);
        assert_eq!(parse_print_duration("99999999999999999999d 5s"), u64::MAX);
        assert_eq!(parse_print_duration("99999999999999999999s"), u64::MAX);
    }

    #[test]
    fn test_parse_print_duration_ascii_digits_only() {
        assert_eq!(parse_print_duration("\u{661}d 5s"), 0);
        assert_eq!(parse_print_duration("\u{663}m"), 0);
    }

    #[test]
    fn test_percent_to_ratio() {
        assert_eq!(percent_to_ratio(100.0), 1.0);
        assert_eq!(percent_to_ratio(87.0), 0.87);
        assert_eq!(percent_to_ratio(0.0), 0.0);
    }

    #[test]
    fn test_progress_ratio() {
        assert_eq!(progress_ratio(Some(87.0)), Some(0.87));
        assert_eq!(progress_ratio(Some(100.0)), Some(1.0));
        assert_eq!(progress_ratio(None), None);
    }

    #[test]
    fn test_progress_ratio_zero_is_absent() {
        // Firmware reports 0 before the first layer; it is indistinguishable
        // from a missing reading.
        assert_eq!(progress_ratio(Some(0.0)), None);
    }

    #[test]
    fn test_loaded_material() {
        assert_eq!(loaded_material(Some("PLA")), Some("PLA"));
        assert_eq!(loaded_material(Some(" PETG ")), Some(" PETG "));
        assert_eq!(loaded_material(Some("")), None);
        assert_eq!(loaded_material(Some("   ")), None);
        assert_eq!(loaded_material(Some("---")), None);
        assert_eq!(loaded_material(Some(" --- ")), None);
        assert_eq!(loaded_material(None), None);
    }

    #[test]
    fn test_is_valid_prefix() {
        assert!(is_valid_prefix("prusa"));
        assert!(is_valid_prefix("my_printer_2"));
        assert!(is_valid_prefix("_private"));
        assert!(is_valid_prefix(""));
        assert!(!is_valid_prefix("2prusa"));
        assert!(!is_valid_prefix("prusa-mini"));
        assert!(!is_valid_prefix("prusa:mini"));
    }
}
