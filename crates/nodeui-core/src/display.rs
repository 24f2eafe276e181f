//! Text formatting shared by frontends.

use std::time::Duration;

use crate::metrics::round_to_display;
use crate::types::{MICROUNITS_PER_UNIT, MicroUnits};

/// Format microunits as whole units with six decimals.
pub fn format_units(amount: MicroUnits) -> String {
    format!(
        "{}.{:06}",
        amount / MICROUNITS_PER_UNIT,
        amount % MICROUNITS_PER_UNIT
    )
}

/// Format a duration to a tenth of a second, e.g. `4.4s`, `1m2.3s`, `2h0m5s`.
pub fn format_duration(d: Duration) -> String {
    let tenths = round_to_display(d).as_millis() / 100;
    let hours = tenths / 36_000;
    let minutes = (tenths / 600) % 60;
    let secs_tenths = tenths % 600;
    let secs = if secs_tenths % 10 == 0 {
        format!("{}s", secs_tenths / 10)
    } else {
        format!("{}.{}s", secs_tenths / 10, secs_tenths % 10)
    };

    if hours > 0 {
        format!("{}h{}m{}", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m{}", minutes, secs)
    } else {
        secs
    }
}

/// Protocol versions are URLs; show only the final path segment.
pub fn short_version(version: &str) -> &str {
    match version.rfind('/') {
        Some(i) => &version[i + 1..],
        None => version,
    }
}

/// Catchpoint labels are `<round>#<hash>`; show the round.
pub fn catchpoint_round(label: &str) -> &str {
    label.split('#').next().unwrap_or(label)
}

/// Shorten long identifiers to `head...tail`, counting characters.
pub fn truncate_middle(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars || max_chars < 5 {
        return s.to_string();
    }
    let keep = (max_chars - 3) / 2;
    let head: String = s.chars().take(keep).collect();
    let tail: String = s.chars().skip(count - keep).collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(0), "0.000000");
        assert_eq!(format_units(1_200_000), "1.200000");
        assert_eq!(format_units(123_456_789), "123.456789");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_millis(4_449)), "4.4s");
        assert_eq!(format_duration(Duration::from_millis(62_300)), "1m2.3s");
        assert_eq!(format_duration(Duration::from_secs(7_205)), "2h0m5s");
    }

    #[test]
    fn test_short_version() {
        assert_eq!(
            short_version("https://github.com/algorandfoundation/specs/tree/abd3d4823c6f77349fc04c3af7b1e99fe4df699f"),
            "abd3d4823c6f77349fc04c3af7b1e99fe4df699f"
        );
        assert_eq!(short_version("future"), "future");
    }

    #[test]
    fn test_catchpoint_round() {
        assert_eq!(catchpoint_round("21890000#IQ4BXGHUGNVIF5R3"), "21890000");
        assert_eq!(catchpoint_round(""), "");
    }

    #[test]
    fn test_truncate_middle() {
        assert_eq!(truncate_middle("ABCDEFGHIJ", 20), "ABCDEFGHIJ");
        assert_eq!(truncate_middle("ABCDEFGHIJKLMNOP", 9), "ABC...NOP");
    }
}
