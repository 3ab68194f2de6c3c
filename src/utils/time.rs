/// Formats a playback position as `M:SS`.
///
/// Missing, NaN, infinite, and non-positive inputs all render as `0:00`.
pub fn format_time(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite() && *s > 0.0) else {
        return "0:00".to_string();
    };

    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

#[cfg(test)]
mod tests {
    use super::format_time;

    #[test]
    fn formats_minutes_and_padded_seconds() {
        assert_eq!(format_time(Some(0.0)), "0:00");
        assert_eq!(format_time(Some(65.0)), "1:05");
        assert_eq!(format_time(Some(59.99)), "0:59");
        assert_eq!(format_time(Some(3600.0)), "60:00");
    }

    #[test]
    fn invalid_inputs_render_zero() {
        assert_eq!(format_time(Some(f64::NAN)), "0:00");
        assert_eq!(format_time(None), "0:00");
        assert_eq!(format_time(Some(-3.0)), "0:00");
        assert_eq!(format_time(Some(f64::INFINITY)), "0:00");
    }
}
