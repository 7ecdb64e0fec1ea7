//! Human-readable sizes and durations

use std::time::Duration;

/// Format a byte count with binary units: `1023 B`, `1.0 KB`, `1.5 MB`
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: &[u8] = b"KMGTPE";

    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!(
        "{:.1} {}B",
        bytes as f64 / div as f64,
        PREFIXES[exp] as char
    )
}

/// Round `d` to the nearest multiple of `unit`, halfway away from zero
pub fn round_duration(d: Duration, unit: Duration) -> Duration {
    let unit_ns = unit.as_nanos();
    if unit_ns <= 1 {
        return d;
    }
    let ns = d.as_nanos();
    let rounded = (ns + unit_ns / 2) / unit_ns * unit_ns;
    Duration::from_nanos(rounded.min(u64::MAX as u128) as u64)
}

/// Format a duration compactly: `0s`, `850ns`, `12µs`, `3.5ms`, `1.25s`
pub fn format_duration(d: Duration) -> String {
    let ns = d.as_nanos();
    match ns {
        0 => "0s".to_string(),
        1..=999 => format!("{ns}ns"),
        1_000..=999_999 => trim_unit(ns as f64 / 1e3, "µs"),
        1_000_000..=999_999_999 => trim_unit(ns as f64 / 1e6, "ms"),
        _ => trim_unit(ns as f64 / 1e9, "s"),
    }
}

fn trim_unit(value: f64, unit: &str) -> String {
    let text = format!("{value:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text}{unit}")
}
