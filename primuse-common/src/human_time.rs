//! Clock formatting for position/duration display

/// Format milliseconds as `m:ss`.
///
/// Seconds are floored, so a position never reads ahead of the audio.
/// Hours roll into the minute field (`75:03` for 1h15m03s).
///
/// # Examples
///
/// ```
/// use primuse_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0), "0:00");
/// assert_eq!(format_clock(15_000), "0:15");
/// assert_eq!(format_clock(59_999), "0:59");
/// assert_eq!(format_clock(200_000), "3:20");
/// ```
pub fn format_clock(millis: u64) -> String {
    let total_seconds = millis / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(999), "0:00");
        assert_eq!(format_clock(60_000), "1:00");
        assert_eq!(format_clock(4_503_000), "75:03");
    }
}
