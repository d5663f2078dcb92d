use chrono::{TimeZone, Timelike};

use super::projector::DisplayState;

/// `mm:ss.cc` with hundredths. Minutes keep counting past 59.
pub fn format_stopwatch(ms: u64) -> String {
    let total_secs = ms / 1000;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    let hundredths = (ms % 1000) / 10;
    format!("{minutes:02}:{seconds:02}.{hundredths:02}")
}

/// `mm:ss`, or `hh:mm:ss` from one hour up. Used by the timer and the alarm.
pub fn format_countdown(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Wall-clock `HH:MM` of an absolute instant in `tz`, e.g. the alarm's
/// scheduled time.
pub fn format_time_of_day<Tz: TimeZone>(instant_ms: i64, tz: &Tz) -> Option<String> {
    let local = tz.timestamp_millis_opt(instant_ms).single()?;
    Some(format!("{:02}:{:02}", local.hour(), local.minute()))
}

/// The text a viewer sees for a display state.
pub fn format_display(display: &DisplayState) -> String {
    match display {
        DisplayState::Idle => format_countdown(0),
        DisplayState::Stopwatch(d) => format_stopwatch(d.elapsed_ms),
        DisplayState::Timer(d) => format_countdown(d.remaining_ms),
        DisplayState::Alarm(d) => format_countdown(d.time_until_ms),
    }
}
