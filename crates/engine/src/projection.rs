//! Mapping between the time domain (seconds) and the normalized track
//! projection (percent of the total duration).

/// Full track width in percent.
pub const FULL_WIDTH_PCT: f64 = 100.0;

/// Narrowest clip the editor accepts, in percent of the track.
pub const MIN_WIDTH_PCT: f64 = 5.0;

/// Relative tolerance used when comparing the two clip representations.
pub const PROJECTION_TOLERANCE: f64 = 1e-9;

/// Converts `seconds` into percent of `total_duration`.
///
/// # Example
/// ```
/// use trim_engine::projection::percent_of;
///
/// assert_eq!(percent_of(60.0, 120.0), 50.0);
/// ```
pub fn percent_of(seconds: f64, total_duration: f64) -> f64 {
    debug_assert!(total_duration > 0.0);
    FULL_WIDTH_PCT * seconds / total_duration
}

/// Converts a track percentage back into seconds.
///
/// # Example
/// ```
/// use trim_engine::projection::seconds_at;
///
/// assert_eq!(seconds_at(60.0, 120.0), 72.0);
/// ```
pub fn seconds_at(percent: f64, total_duration: f64) -> f64 {
    percent * total_duration / FULL_WIDTH_PCT
}

/// Converts a pointer displacement in pixels into a track percentage.
///
/// A non-positive track width maps every displacement to `0`.
pub fn pixels_to_percent(delta_px: f64, track_width_px: f64) -> f64 {
    if !(track_width_px > 0.0) || !delta_px.is_finite() {
        return 0.0;
    }
    delta_px / track_width_px * FULL_WIDTH_PCT
}

/// Converts an absolute pointer position on the track into seconds.
///
/// Positions outside the track are clamped to `[0, total_duration]`.
///
/// # Example
/// ```
/// use trim_engine::projection::time_at_pixel;
///
/// assert_eq!(time_at_pixel(250.0, 1_000.0, 120.0), 30.0);
/// assert_eq!(time_at_pixel(-5.0, 1_000.0, 120.0), 0.0);
/// ```
pub fn time_at_pixel(pixel_x: f64, track_width_px: f64, total_duration: f64) -> f64 {
    if !(track_width_px > 0.0) || !pixel_x.is_finite() {
        return 0.0;
    }
    let ratio = (pixel_x / track_width_px).clamp(0.0, 1.0);
    ratio * total_duration
}

/// Returns `true` when `a` and `b` agree within [`PROJECTION_TOLERANCE`],
/// relative to the larger magnitude (absolute near zero).
pub fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= PROJECTION_TOLERANCE * scale
}

pub(crate) fn is_valid_duration(total_duration: f64) -> bool {
    total_duration.is_finite() && total_duration > 0.0
}

/// Formats seconds as `MM:SS`, the label shown on clips and the time ruler.
///
/// # Example
/// ```
/// use trim_engine::projection::format_time;
///
/// assert_eq!(format_time(0.0), "00:00");
/// assert_eq!(format_time(125.9), "02:05");
/// ```
pub fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{minutes:02}:{secs:02}")
}

/// Formats seconds as `H:MM:SS`, or `M:SS` below one hour.
///
/// # Example
/// ```
/// use trim_engine::projection::format_time_hms;
///
/// assert_eq!(format_time_hms(187.0), "3:07");
/// assert_eq!(format_time_hms(3875.0), "1:04:35");
/// ```
pub fn format_time_hms(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::{approx_eq, pixels_to_percent, time_at_pixel};

    #[test]
    fn pixel_delta_maps_proportionally_to_track_width() {
        assert_eq!(pixels_to_percent(100.0, 1_000.0), 10.0);
        assert_eq!(pixels_to_percent(-250.0, 500.0), -50.0);
    }

    #[test]
    fn zero_width_track_maps_every_delta_to_zero() {
        assert_eq!(pixels_to_percent(40.0, 0.0), 0.0);
        assert_eq!(time_at_pixel(40.0, 0.0, 120.0), 0.0);
    }

    #[test]
    fn click_past_the_right_edge_clamps_to_total_duration() {
        assert_eq!(time_at_pixel(1_200.0, 1_000.0, 90.0), 90.0);
    }

    #[test]
    fn approx_eq_is_relative_for_large_values() {
        assert!(approx_eq(3_600.0, 3_600.0 + 1e-7));
        assert!(!approx_eq(1.0, 1.001));
    }
}
