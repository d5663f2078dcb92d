use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;

use crate::{
    alert::AlertSink,
    clock::ClockService,
    session::{DescriptorStore, LinkStore, SessionDescriptor, SessionMode},
    settings::Settings,
};

use super::{
    controller::{AlarmController, StopwatchController, TimerController},
    state::ControllerSnapshot,
};

/// One viewer: the three controllers over one link, plus which of them is on
/// screen.
pub struct TimerHub {
    clock: ClockService,
    store: Arc<LinkStore>,
    alert: Arc<dyn AlertSink>,
    pub stopwatch: StopwatchController,
    pub timer: TimerController,
    pub alarm: AlarmController,
    active_tab: Mutex<SessionMode>,
}

impl TimerHub {
    pub fn new(
        clock: ClockService,
        store: Arc<LinkStore>,
        alert: Arc<dyn AlertSink>,
        settings: &Settings,
    ) -> Self {
        let shared: Arc<dyn DescriptorStore> = store.clone();
        Self {
            stopwatch: StopwatchController::new(
                clock.clone(),
                shared.clone(),
                alert.clone(),
                settings.stopwatch_config(),
            ),
            timer: TimerController::new(
                clock.clone(),
                shared.clone(),
                alert.clone(),
                settings.timer_config(),
            ),
            alarm: AlarmController::new(clock.clone(), shared, alert.clone(), settings.alarm_config()),
            clock,
            store,
            alert,
            active_tab: Mutex::new(SessionMode::Stopwatch),
        }
    }

    /// Re-enter the current link on every controller and start following it.
    pub fn attach(&self) {
        self.stopwatch.attach();
        self.timer.attach();
        self.alarm.attach();
    }

    pub fn shutdown(&self) {
        self.stopwatch.detach();
        self.timer.detach();
        self.alarm.detach();
        self.alert.stop_alert();
    }

    pub fn clock(&self) -> &ClockService {
        &self.clock
    }

    pub fn current_link(&self) -> String {
        self.store.current_link()
    }

    pub fn descriptor(&self) -> SessionDescriptor {
        self.store.read()
    }

    pub fn open_link(&self, link: &str) -> Result<()> {
        self.store.navigate(link)
    }

    /// The tab on screen: the shared session's mode when there is one,
    /// otherwise whatever was last selected.
    pub fn active_mode(&self) -> SessionMode {
        let mut tab = self
            .active_tab
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mode = self.store.read().mode;
        if mode != SessionMode::Home {
            *tab = mode;
        }
        *tab
    }

    /// Switching tabs ends whatever session the link carried.
    pub fn select_mode(&self, mode: SessionMode) {
        if mode == SessionMode::Home {
            return;
        }
        *self
            .active_tab
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mode;
        self.store.clear();
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot_of(self.active_mode())
    }

    pub fn snapshot_of(&self, mode: SessionMode) -> ControllerSnapshot {
        match mode {
            SessionMode::Timer => self.timer.snapshot(),
            SessionMode::Alarm => self.alarm.snapshot(),
            SessionMode::Stopwatch | SessionMode::Home => self.stopwatch.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        alert::{AlertPlayer, LogTone},
        clock::ManualClock,
        timer::{modes::TimerInput, state::ControllerStatus},
    };

    fn hub(link: &str) -> TimerHub {
        let clock = ClockService::new(Arc::new(ManualClock::new(1_700_000_000_000)));
        let store = Arc::new(LinkStore::new(link).unwrap());
        let alert = Arc::new(AlertPlayer::new(Arc::new(LogTone)));
        TimerHub::new(clock, store, alert, &Settings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn active_mode_follows_the_link() {
        let hub = hub("https://t.test/?mode=alarm&target=1700000060000");
        hub.attach();
        assert_eq!(hub.active_mode(), SessionMode::Alarm);
        assert_eq!(hub.snapshot().status, ControllerStatus::Running);
        assert_eq!(hub.stopwatch.snapshot().status, ControllerStatus::Idle);
        hub.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn home_link_keeps_the_last_tab() {
        let hub = hub("https://t.test/");
        assert_eq!(hub.active_mode(), SessionMode::Stopwatch);

        hub.select_mode(SessionMode::Timer);
        assert_eq!(hub.active_mode(), SessionMode::Timer);

        hub.select_mode(SessionMode::Home);
        assert_eq!(hub.active_mode(), SessionMode::Timer);
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_a_tab_clears_the_session() {
        let hub = hub("https://t.test/");
        hub.attach();
        hub.timer.start(TimerInput::new(1, 0)).unwrap();
        assert!(hub.current_link().contains("mode=timer"));

        hub.select_mode(SessionMode::Alarm);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(hub.current_link(), "https://t.test/");
        assert_eq!(hub.timer.status(), ControllerStatus::Idle);
        assert_eq!(hub.active_mode(), SessionMode::Alarm);
        hub.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn opening_a_link_switches_controllers() {
        let hub = hub("https://t.test/");
        hub.attach();
        hub.open_link("https://t.test/?mode=stopwatch&start=1699999990000")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(hub.active_mode(), SessionMode::Stopwatch);
        assert_eq!(hub.stopwatch.status(), ControllerStatus::Running);
        hub.shutdown();
        assert_eq!(hub.stopwatch.status(), ControllerStatus::Idle);
    }
}
