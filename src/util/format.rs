//! Number formatting utilities.

use std::time::Duration;

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Round to `decimals` places and drop trailing zeros (`1.50` -> `1.5`,
/// `2.00` -> `2`).
#[must_use]
pub fn format_trimmed(value: f64, decimals: usize) -> String {
    let formatted = format!("{value:.decimals$}");
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

/// Binary-unit size, B through TB, two decimals at most.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", format_trimmed(value, 2), BYTE_UNITS[unit])
}

/// Percentage of `part` in `total`, one decimal at most. Zero when `total`
/// is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_percent(part: u64, total: u64) -> String {
    if total == 0 {
        return "0".to_string();
    }
    format_trimmed(part as f64 / total as f64 * 100.0, 1)
}

/// Whole seconds when exact (`30s`), otherwise milliseconds (`1500ms`).
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
