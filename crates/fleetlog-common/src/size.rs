//! Size token normalization
//!
//! Ledger and summary artifacts carry sizes as free text (`"12.4 KB"`,
//! `"931 bytes"`, `"2048"`). Ingestion must never fail on one of these, so
//! every unparseable token maps to `0`.

/// Scaled units in match priority order.
const SCALED_UNITS: [(&str, u64); 3] = [
    ("kb", 1024),
    ("mb", 1024 * 1024),
    ("gb", 1024 * 1024 * 1024),
];

const BYTES_UNIT: &str = "bytes";

/// Parse a size token into a byte count.
///
/// Units are matched case-insensitively in the order `kb`, `mb`, `gb`,
/// `bytes`; a token without a unit is read as a plain number. Fractional
/// scaled values are truncated. Empty, negative, non-numeric or otherwise
/// unrecognised input yields `0`.
///
/// ```
/// use fleetlog_common::size::normalize;
///
/// assert_eq!(normalize("2 MB"), 2_097_152);
/// assert_eq!(normalize("  931 Bytes "), 931);
/// ```
pub fn normalize(token: &str) -> u64 {
    let lowered = token.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return 0;
    }

    for (unit, factor) in SCALED_UNITS {
        if lowered.contains(unit) {
            return scaled(&lowered.replace(unit, ""), factor);
        }
    }

    if lowered.contains(BYTES_UNIT) {
        return lowered
            .replace(BYTES_UNIT, "")
            .trim()
            .parse::<u64>()
            .unwrap_or(0);
    }

    scaled(&lowered, 1)
}

fn scaled(number: &str, factor: u64) -> u64 {
    match number.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => (value * factor as f64) as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_forms() {
        assert_eq!(normalize("1.5 KB"), 1536);
        assert_eq!(normalize("2 MB"), 2_097_152);
        assert_eq!(normalize("1 GB"), 1_073_741_824);
        assert_eq!(normalize("931 bytes"), 931);
        assert_eq!(normalize("garbage"), 0);
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(normalize("  2 kb  "), 2048);
        assert_eq!(normalize("2KB"), 2048);
        assert_eq!(normalize("\t12 BYTES\n"), 12);
    }

    #[test]
    fn test_bare_numbers() {
        assert_eq!(normalize("4096"), 4096);
        assert_eq!(normalize("10.9"), 10);
        assert_eq!(normalize("0"), 0);
    }

    #[test]
    fn test_failures_map_to_zero() {
        assert_eq!(normalize(""), 0);
        assert_eq!(normalize("   "), 0);
        assert_eq!(normalize("-5"), 0);
        assert_eq!(normalize("-1 KB"), 0);
        assert_eq!(normalize("1.5 bytes"), 0);
        assert_eq!(normalize("12 TB"), 0);
        assert_eq!(normalize("NaN"), 0);
        assert_eq!(normalize("inf kb"), 0);
    }

    #[test]
    fn test_truncates_fractional_scaled_values() {
        // 12.4 * 1024 = 12697.6
        assert_eq!(normalize("12.4 KB"), 12697);
    }
}
