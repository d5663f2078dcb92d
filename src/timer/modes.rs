//! Per-mode behaviour plugged into the generic session controller.

use std::fmt::Debug;

use chrono::{FixedOffset, Local, TimeZone};
use serde::Serialize;

use crate::error::StartError;
use crate::session::{SessionDescriptor, SessionMode, Timeline};

use super::projector::{
    project_alarm, project_stopwatch, project_timer, AlarmDisplay, DisplayState,
    StopwatchDisplay, TimerDisplay,
};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub trait TimelineMode: Send + Sync + 'static {
    const MODE: SessionMode;
    /// Whether the cadence keeps running after the threshold edge.
    const TICK_AFTER_FIRE: bool;

    type Display: Copy + Default + Debug + PartialEq + Serialize + Send + Sync + 'static;
    type Input;

    /// `None` when the timeline belongs to another mode.
    fn project(now: i64, timeline: &Timeline) -> Option<Self::Display>;

    fn at_threshold(display: &Self::Display) -> bool;

    /// Build the descriptor for a brand-new session anchored at `now`.
    fn descriptor_for(now: i64, input: Self::Input) -> Result<SessionDescriptor, StartError>;

    fn wrap(display: Self::Display) -> DisplayState;
}

pub struct Stopwatch;

impl TimelineMode for Stopwatch {
    const MODE: SessionMode = SessionMode::Stopwatch;
    const TICK_AFTER_FIRE: bool = true;

    type Display = StopwatchDisplay;
    type Input = ();

    fn project(now: i64, timeline: &Timeline) -> Option<StopwatchDisplay> {
        match *timeline {
            Timeline::Stopwatch { anchor_start } => Some(project_stopwatch(now, anchor_start)),
            _ => None,
        }
    }

    fn at_threshold(_display: &StopwatchDisplay) -> bool {
        false
    }

    fn descriptor_for(now: i64, _input: ()) -> Result<SessionDescriptor, StartError> {
        Ok(SessionDescriptor::stopwatch(now))
    }

    fn wrap(display: StopwatchDisplay) -> DisplayState {
        DisplayState::Stopwatch(display)
    }
}

/// Countdown length as typed by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerInput {
    pub minutes: i64,
    pub seconds: i64,
}

impl TimerInput {
    pub fn new(minutes: i64, seconds: i64) -> Self {
        Self { minutes, seconds }
    }

    pub fn duration_ms(&self) -> i64 {
        self.minutes
            .saturating_mul(60)
            .saturating_add(self.seconds)
            .saturating_mul(1000)
    }
}

pub struct Countdown;

impl TimelineMode for Countdown {
    const MODE: SessionMode = SessionMode::Timer;
    const TICK_AFTER_FIRE: bool = false;

    type Display = TimerDisplay;
    type Input = TimerInput;

    fn project(now: i64, timeline: &Timeline) -> Option<TimerDisplay> {
        match *timeline {
            Timeline::Timer {
                anchor_start,
                duration,
            } => Some(project_timer(now, anchor_start, duration)),
            _ => None,
        }
    }

    fn at_threshold(display: &TimerDisplay) -> bool {
        display.expired
    }

    fn descriptor_for(now: i64, input: TimerInput) -> Result<SessionDescriptor, StartError> {
        let duration = input.duration_ms();
        if duration <= 0 {
            return Err(StartError::NonPositiveDuration);
        }
        Ok(SessionDescriptor::timer(now, duration))
    }

    fn wrap(display: TimerDisplay) -> DisplayState {
        DisplayState::Timer(display)
    }
}

/// Which wall clock an alarm's hour and minute are read against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmZone {
    Local,
    Fixed(FixedOffset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmInput {
    pub hour: u32,
    pub minute: u32,
    pub zone: AlarmZone,
}

impl AlarmInput {
    pub fn local(hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            zone: AlarmZone::Local,
        }
    }
}

/// The first instant strictly after `now_ms` whose wall-clock time in `tz` is
/// `hour:minute:00`. A time that already passed today moves to tomorrow by
/// exactly one day.
pub fn next_occurrence<Tz: TimeZone>(
    now_ms: i64,
    hour: u32,
    minute: u32,
    tz: &Tz,
) -> Result<i64, StartError> {
    let invalid = StartError::InvalidTimeOfDay { hour, minute };
    let now = tz
        .timestamp_millis_opt(now_ms)
        .single()
        .ok_or_else(|| invalid.clone())?;
    let naive = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| invalid.clone())?;
    let same_day = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or(invalid)?
        .timestamp_millis();

    if same_day > now_ms {
        Ok(same_day)
    } else {
        Ok(same_day + DAY_MS)
    }
}

pub struct Alarm;

impl TimelineMode for Alarm {
    const MODE: SessionMode = SessionMode::Alarm;
    const TICK_AFTER_FIRE: bool = true;

    type Display = AlarmDisplay;
    type Input = AlarmInput;

    fn project(now: i64, timeline: &Timeline) -> Option<AlarmDisplay> {
        match *timeline {
            Timeline::Alarm { target_time } => Some(project_alarm(now, target_time)),
            _ => None,
        }
    }

    fn at_threshold(display: &AlarmDisplay) -> bool {
        display.time_until_ms == 0
    }

    fn descriptor_for(now: i64, input: AlarmInput) -> Result<SessionDescriptor, StartError> {
        let target = match input.zone {
            AlarmZone::Local => next_occurrence(now, input.hour, input.minute, &Local)?,
            AlarmZone::Fixed(offset) => next_occurrence(now, input.hour, input.minute, &offset)?,
        };
        Ok(SessionDescriptor::alarm(target))
    }

    fn wrap(display: AlarmDisplay) -> DisplayState {
        DisplayState::Alarm(display)
    }
}
