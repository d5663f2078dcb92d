//! Pure projection of (corrected now, timeline) into what a viewer displays.
//!
//! All arithmetic is integer milliseconds. Every visible duration is clamped
//! at zero because `now` can jitter backwards when the offset is re-estimated.

use serde::Serialize;

use crate::session::{SessionDescriptor, Timeline};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StopwatchDisplay {
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimerDisplay {
    pub remaining_ms: u64,
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AlarmDisplay {
    pub time_until_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum DisplayState {
    #[default]
    Idle,
    Stopwatch(StopwatchDisplay),
    Timer(TimerDisplay),
    Alarm(AlarmDisplay),
}

fn clamp_ms(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub fn project_stopwatch(now: i64, anchor_start: i64) -> StopwatchDisplay {
    StopwatchDisplay {
        elapsed_ms: clamp_ms(now.saturating_sub(anchor_start)),
    }
}

pub fn project_timer(now: i64, anchor_start: i64, duration: i64) -> TimerDisplay {
    let elapsed = now.saturating_sub(anchor_start);
    let remaining_ms = clamp_ms(duration.saturating_sub(elapsed));
    TimerDisplay {
        remaining_ms,
        expired: remaining_ms == 0,
    }
}

/// Whether the alarm has gone off is an edge, and edges need memory; that
/// lives with the controller, not here.
pub fn project_alarm(now: i64, target_time: i64) -> AlarmDisplay {
    AlarmDisplay {
        time_until_ms: clamp_ms(target_time.saturating_sub(now)),
    }
}

pub fn project_timeline(now: i64, timeline: &Timeline) -> DisplayState {
    match *timeline {
        Timeline::Stopwatch { anchor_start } => {
            DisplayState::Stopwatch(project_stopwatch(now, anchor_start))
        }
        Timeline::Timer {
            anchor_start,
            duration,
        } => DisplayState::Timer(project_timer(now, anchor_start, duration)),
        Timeline::Alarm { target_time } => DisplayState::Alarm(project_alarm(now, target_time)),
    }
}

/// Incomplete descriptors project to `Idle`.
pub fn project(now: i64, descriptor: &SessionDescriptor) -> DisplayState {
    descriptor
        .timeline()
        .map(|timeline| project_timeline(now, &timeline))
        .unwrap_or_default()
}
