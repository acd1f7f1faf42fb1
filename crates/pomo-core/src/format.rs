use std::time::Duration;

/// Renders a remaining duration as `mm:ss`, truncating sub-second parts.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "00:00");
        assert_eq!(format_duration(Duration::from_secs(2)), "00:02");
        assert_eq!(format_duration(Duration::from_millis(1999)), "00:01");
        assert_eq!(format_duration(Duration::from_secs(25 * 60)), "25:00");
        assert_eq!(format_duration(Duration::from_secs(125 * 60 + 7)), "125:07");
    }
}
