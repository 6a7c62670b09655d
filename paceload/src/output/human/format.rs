use std::time::Duration;

/// Average in milliseconds with two decimals; `n/a` when there were no samples.
pub(crate) fn format_avg_ms(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}")
    } else {
        "n/a".to_string()
    }
}

/// Whole-second rendering for progress lines (`1m 5s`); sub-second values keep milliseconds.
pub(crate) fn format_duration(d: Duration) -> String {
    let rounded = if d >= Duration::from_secs(1) {
        Duration::from_secs(d.as_secs())
    } else {
        Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    };
    humantime::format_duration(rounded).to_string()
}
