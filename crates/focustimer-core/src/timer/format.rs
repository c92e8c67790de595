//! Human-readable renderings of millisecond values.

use super::catalog::ONE_SEC_MS;

/// "MM:SS". Minutes are not wrapped at the hour; negatives render as zero.
pub fn format_countdown(ms: i64) -> String {
    let total_secs = ms.max(0) as u64 / ONE_SEC_MS;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// "MMm SSs" up to and including one hour, "HHh MMm" beyond it.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / ONE_SEC_MS;
    let total_min = total_secs / 60;
    if total_min <= 60 {
        format!("{:02}m {:02}s", total_min % 60, total_secs % 60)
    } else {
        format!("{:02}h {:02}m", total_min / 60, total_min % 60)
    }
}
