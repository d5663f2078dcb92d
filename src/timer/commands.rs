use serde::Serialize;

use crate::session::{SessionDescriptor, SessionMode};

use super::{
    format::format_display,
    hub::TimerHub,
    modes::{AlarmInput, TimerInput},
    state::ControllerSnapshot,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubSnapshot {
    pub active_mode: SessionMode,
    pub synced: bool,
    pub offset_ms: i64,
    pub link: String,
    pub text: String,
    pub snapshot: ControllerSnapshot,
}

pub fn get_state(hub: &TimerHub) -> Result<HubSnapshot, String> {
    let snapshot = hub.snapshot();
    Ok(HubSnapshot {
        active_mode: hub.active_mode(),
        synced: hub.clock().is_synced(),
        offset_ms: hub.clock().offset_ms(),
        link: hub.current_link(),
        text: format_display(&snapshot.display),
        snapshot,
    })
}

pub fn start_stopwatch(hub: &TimerHub) -> Result<SessionDescriptor, String> {
    hub.stopwatch.start(()).map_err(|e| e.to_string())
}

pub fn start_timer(hub: &TimerHub, minutes: i64, seconds: i64) -> Result<SessionDescriptor, String> {
    hub.timer
        .start(TimerInput::new(minutes, seconds))
        .map_err(|e| e.to_string())
}

pub fn start_alarm(hub: &TimerHub, hour: u32, minute: u32) -> Result<SessionDescriptor, String> {
    hub.alarm
        .start(AlarmInput::local(hour, minute))
        .map_err(|e| e.to_string())
}

pub fn reset(hub: &TimerHub, mode: SessionMode) -> Result<(), String> {
    match mode {
        SessionMode::Stopwatch => hub.stopwatch.stop(),
        SessionMode::Timer => hub.timer.reset(),
        SessionMode::Alarm => hub.alarm.reset(),
        SessionMode::Home => return Err("nothing to reset on the home screen".into()),
    }
    Ok(())
}

pub fn select_mode(hub: &TimerHub, mode: SessionMode) -> Result<SessionMode, String> {
    hub.select_mode(mode);
    Ok(hub.active_mode())
}

pub fn open_link(hub: &TimerHub, link: &str) -> Result<HubSnapshot, String> {
    hub.open_link(link).map_err(|e| e.to_string())?;
    get_state(hub)
}

/// `HH:MM` on a 24-hour clock.
pub fn parse_time_of_day(text: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("expected HH:MM, got {text:?}");
    let (hour, minute) = text.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        alert::{AlertPlayer, LogTone},
        clock::{ClockService, ManualClock},
        session::LinkStore,
        settings::Settings,
        timer::state::ControllerStatus,
    };

    fn hub() -> TimerHub {
        let clock = ClockService::new(Arc::new(ManualClock::new(1_700_000_000_000)));
        let store = Arc::new(LinkStore::new("https://t.test/?ref=share").unwrap());
        let alert = Arc::new(AlertPlayer::new(Arc::new(LogTone)));
        TimerHub::new(clock, store, alert, &Settings::default())
    }

    #[test]
    fn parses_times_of_day() {
        assert_eq!(parse_time_of_day("07:30"), Ok((7, 30)));
        assert_eq!(parse_time_of_day(" 23:59 "), Ok((23, 59)));
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("12:60").is_err());
        assert!(parse_time_of_day("1230").is_err());
        assert!(parse_time_of_day("ab:cd").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn start_timer_reports_state_and_link() {
        let hub = hub();
        hub.attach();

        start_timer(&hub, 2, 30).unwrap();
        let state = get_state(&hub).unwrap();
        assert_eq!(state.active_mode, SessionMode::Timer);
        assert_eq!(state.snapshot.status, ControllerStatus::Running);
        assert_eq!(state.text, "02:30");
        assert!(state.link.contains("ref=share"));
        assert!(state.link.contains("duration=150000"));
        assert!(!state.synced);

        let err = start_timer(&hub, 1, 0).unwrap_err();
        assert!(err.contains("already running"));
        hub.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timer_is_refused() {
        let hub = hub();
        assert!(start_timer(&hub, 0, 0).is_err());
        assert_eq!(hub.current_link(), "https://t.test/?ref=share");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_home_is_an_error() {
        let hub = hub();
        assert!(reset(&hub, SessionMode::Home).is_err());
        assert!(reset(&hub, SessionMode::Stopwatch).is_ok());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(HubSnapshot {
            active_mode: SessionMode::Stopwatch,
            synced: true,
            offset_ms: -12,
            link: "https://t.test/".into(),
            text: "00:00.00".into(),
            snapshot: ControllerSnapshot {
                mode: SessionMode::Stopwatch,
                status: ControllerStatus::Idle,
                display: Default::default(),
                fired: false,
            },
        })
        .unwrap();
        assert_eq!(json["offsetMs"], -12);
        assert_eq!(json["activeMode"], serde_json::to_value(SessionMode::Stopwatch).unwrap());
    }
}
