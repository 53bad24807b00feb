/// Format a duration in whole seconds as a compact human-readable string,
/// e.g. `2h 5m 3s`. Used in recovery emails.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "< 1s".to_owned();
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 {
        parts.push(format!("{secs}s"));
    }

    parts.join(" ")
}
