//! Millisecond timestamp formatting.
//!
//! Clip boundaries are kept as integer milliseconds; ffmpeg arguments and
//! sidecar metadata want clock strings.

/// Format milliseconds as `HH:MM:SS`, truncating sub-second precision.
///
/// # Examples
/// ```
/// use clipqa_models::timestamp::format_hms;
/// assert_eq!(format_hms(90_500), "00:01:30");
/// assert_eq!(format_hms(3_661_000), "01:01:01");
/// ```
pub fn format_hms(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Format milliseconds as `HH:MM:SS.mmm` for ffmpeg seek arguments.
pub fn format_hms_millis(ms: i64) -> String {
    let ms = ms.max(0);
    format!("{}.{:03}", format_hms(ms), ms % 1000)
}

/// Milliseconds as fractional seconds.
pub fn ms_to_secs(ms: i64) -> f64 {
    ms as f64 / 1000.0
}
