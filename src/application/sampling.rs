// Sampling window estimation
use chrono::Duration;

/// Fallback width when the series is too short to estimate a gap. A zero
/// width bucket would make the make-series resampling degenerate.
const FALLBACK_WIDTH: &str = "1d";

/// Render the sampling gap as a KQL timespan literal ("5m", "1d 2h",
/// "1m 30s"), joining only the non-zero components.
///
/// `None` and a sub-second gap both fall back to one day; the two cases are
/// deliberately not distinguished, both mean "no usable gap".
pub fn bucket_width(gap: Option<Duration>) -> String {
    let Some(gap) = gap else {
        return FALLBACK_WIDTH.to_string();
    };

    let total = gap.num_seconds().abs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut components = Vec::new();
    if days > 0 {
        components.push(format!("{days}d"));
    }
    if hours > 0 {
        components.push(format!("{hours}h"));
    }
    if minutes > 0 {
        components.push(format!("{minutes}m"));
    }
    if seconds > 0 {
        components.push(format!("{seconds}s"));
    }

    if components.is_empty() {
        FALLBACK_WIDTH.to_string()
    } else {
        components.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ninety_seconds() {
        assert_eq!(bucket_width(Some(Duration::seconds(90))), "1m 30s");
    }

    #[test]
    fn test_short_series_falls_back() {
        assert_eq!(bucket_width(None), "1d");
    }

    #[test]
    fn test_zero_gap_falls_back() {
        assert_eq!(bucket_width(Some(Duration::zero())), "1d");
    }

    #[test]
    fn test_days_and_hours() {
        assert_eq!(bucket_width(Some(Duration::hours(26))), "1d 2h");
    }

    #[test]
    fn test_negative_gap_uses_magnitude() {
        assert_eq!(bucket_width(Some(Duration::seconds(-300))), "5m");
    }

    #[test]
    fn test_all_components() {
        let gap = Duration::days(2) + Duration::hours(3) + Duration::minutes(4) + Duration::seconds(5);
        assert_eq!(bucket_width(Some(gap)), "2d 3h 4m 5s");
    }
}
