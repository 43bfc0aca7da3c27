use chrono::Duration;

/// Format bytes into a human-readable size.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format a file age as the largest whole unit, e.g. `12d`, `5h`, `just now`.
///
/// Negative ages (mtime in the future) are shown as `future`.
pub fn format_age(age: Duration) -> String {
    if age < Duration::zero() {
        return String::from("future");
    }

    let days = age.num_days();
    if days > 0 {
        return format!("{}d", days);
    }

    let hours = age.num_hours();
    if hours > 0 {
        return format!("{}h", hours);
    }

    let minutes = age.num_minutes();
    if minutes > 0 {
        format!("{}m", minutes)
    } else {
        String::from("just now")
    }
}
