use std::{
    marker::PhantomData,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    alert::{AlertPattern, AlertSink},
    clock::ClockService,
    error::StartError,
    session::{DescriptorStore, SessionDescriptor, SessionMode},
};

use super::{
    modes::{Alarm, Countdown, Stopwatch, TimelineMode},
    state::{ControllerSnapshot, ControllerState, ControllerStatus},
};

// Set to false to silence per-session logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ControllerEvent {
    StateChanged { snapshot: ControllerSnapshot },
    Tick { snapshot: ControllerSnapshot },
    AlertFired { mode: SessionMode },
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub tick_interval: Duration,
    /// `None` for modes that never alert.
    pub alert: Option<AlertPattern>,
}

enum TickControl {
    Continue,
    Stop,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ControllerInner<M: TimelineMode> {
    state: Mutex<ControllerState<M::Display>>,
    clock: ClockService,
    store: Arc<dyn DescriptorStore>,
    alert: Arc<dyn AlertSink>,
    config: ControllerConfig,
    ticker: Mutex<Option<JoinHandle<()>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<ControllerEvent>,
    _mode: PhantomData<fn() -> M>,
}

impl<M: TimelineMode> ControllerInner<M> {
    fn snapshot_of(state: &ControllerState<M::Display>) -> ControllerSnapshot {
        ControllerSnapshot {
            mode: M::MODE,
            status: state.status,
            display: M::wrap(state.display),
            fired: state.edge.has_fired(),
        }
    }

    fn emit(&self, event: ControllerEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Bring this controller in line with the published descriptor.
    fn apply(self: &Arc<Self>, descriptor: SessionDescriptor) {
        let timeline = if descriptor.mode == M::MODE {
            descriptor.timeline()
        } else {
            None
        };

        let mut state = lock(&self.state);
        let Some(timeline) = timeline else {
            if state.is_running() {
                self.leave(state);
            }
            return;
        };

        if state.is_running() && state.descriptor == Some(descriptor) {
            return;
        }

        let had_fired = state.edge.has_fired();
        let display = M::project(self.clock.corrected_now(), &timeline).unwrap_or_default();
        let generation = state.begin(descriptor, display);
        let snapshot = Self::snapshot_of(&state);
        if had_fired {
            self.alert.stop_alert();
        }
        // The ticker slot only changes under the state lock, so it always
        // holds the ticker of the latest generation.
        self.spawn_ticker(generation);
        drop(state);

        log_info!(
            "{} session running: {:?}",
            M::MODE.as_str(),
            snapshot.display
        );
        self.emit(ControllerEvent::StateChanged { snapshot });
    }

    fn leave(&self, mut state: MutexGuard<'_, ControllerState<M::Display>>) {
        let had_fired = state.edge.has_fired();
        state.clear();
        let snapshot = Self::snapshot_of(&state);
        if had_fired {
            self.alert.stop_alert();
        }
        self.cancel_ticker();
        drop(state);

        log_info!("{} session idle", M::MODE.as_str());
        self.emit(ControllerEvent::StateChanged { snapshot });
    }

    fn tick(self: &Arc<Self>, generation: u64) -> TickControl {
        let published = self.store.read();
        let mut state = lock(&self.state);
        if state.generation != generation || !state.is_running() {
            return TickControl::Stop;
        }

        if state.descriptor != Some(published) {
            // The store moved on before the watcher got to run.
            drop(state);
            self.apply(published);
            return TickControl::Stop;
        }

        let Some(timeline) = published.timeline() else {
            return TickControl::Stop;
        };
        let Some(display) = M::project(self.clock.corrected_now(), &timeline) else {
            return TickControl::Stop;
        };

        state.display = display;
        let fire = state.edge.observe(M::at_threshold(&display));
        state.ticking = M::TICK_AFTER_FIRE || !state.edge.has_fired();
        let keep_ticking = state.ticking;
        let snapshot = Self::snapshot_of(&state);

        // Fire under the lock so a concurrent reset either sees the edge and
        // stops the alert, or clears first and this tick never gets here.
        if fire {
            if let Some(pattern) = self.config.alert.as_ref() {
                self.alert.fire_alert(pattern);
            }
        }
        drop(state);

        log_debug!("{} tick: {:?}", M::MODE.as_str(), snapshot.display);
        self.emit(ControllerEvent::Tick { snapshot });
        if fire {
            log_info!("{} reached its threshold", M::MODE.as_str());
            self.emit(ControllerEvent::AlertFired { mode: M::MODE });
        }

        if keep_ticking {
            TickControl::Continue
        } else {
            TickControl::Stop
        }
    }

    /// Callers hold the state lock.
    fn spawn_ticker(self: &Arc<Self>, generation: u64) {
        let weak = Arc::downgrade(self);
        let period = self.config.tick_interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if let TickControl::Stop = inner.tick(generation) {
                    break;
                }
            }
        });

        if let Some(previous) = lock(&self.ticker).replace(handle) {
            previous.abort();
        }
    }

    /// Callers hold the state lock, except on drop.
    fn cancel_ticker(&self) {
        if let Some(handle) = lock(&self.ticker).take() {
            handle.abort();
        }
    }
}

impl<M: TimelineMode> Drop for ControllerInner<M> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.watcher).take() {
            handle.abort();
        }
        self.cancel_ticker();
        if lock(&self.state).edge.has_fired() {
            self.alert.stop_alert();
        }
    }
}

/// Drives one mode's display from the shared descriptor.
///
/// Cloning is cheap and every clone drives the same controller. Once the last
/// clone is dropped its ticker and watcher tasks are aborted.
pub struct SessionController<M: TimelineMode> {
    inner: Arc<ControllerInner<M>>,
}

impl<M: TimelineMode> Clone for SessionController<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub type StopwatchController = SessionController<Stopwatch>;
pub type TimerController = SessionController<Countdown>;
pub type AlarmController = SessionController<Alarm>;

impl<M: TimelineMode> SessionController<M> {
    pub fn new(
        clock: ClockService,
        store: Arc<dyn DescriptorStore>,
        alert: Arc<dyn AlertSink>,
        config: ControllerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(ControllerState::new()),
                clock,
                store,
                alert,
                config,
                ticker: Mutex::new(None),
                watcher: Mutex::new(None),
                events,
                _mode: PhantomData,
            }),
        }
    }

    pub fn mode(&self) -> SessionMode {
        M::MODE
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events.subscribe()
    }

    /// Re-enter whatever the store currently holds, then follow it.
    ///
    /// A matching, complete descriptor puts the controller in `Running`
    /// before this returns, with the display already back-dated to now.
    pub fn attach(&self) {
        let mut rx = self.inner.store.subscribe();
        let current = *rx.borrow_and_update();
        self.inner.apply(current);

        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let descriptor = *rx.borrow_and_update();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.apply(descriptor);
            }
        });

        if let Some(previous) = lock(&self.inner.watcher).replace(handle) {
            previous.abort();
        }
    }

    /// Stop following the store and release every task and alert. The shared
    /// descriptor is left alone.
    pub fn detach(&self) {
        if let Some(handle) = lock(&self.inner.watcher).take() {
            handle.abort();
        }
        self.release();
    }

    /// Publish a new session anchored at the corrected now.
    pub fn start(&self, input: M::Input) -> Result<SessionDescriptor, StartError> {
        if lock(&self.inner.state).is_running() {
            return Err(StartError::AlreadyRunning(M::MODE.as_str()));
        }

        let descriptor = M::descriptor_for(self.inner.clock.corrected_now(), input)?;
        self.inner.store.write(&descriptor);
        let published = self.inner.store.read();
        self.inner.apply(published);

        log_info!("started {} session {:?}", M::MODE.as_str(), published);
        Ok(published)
    }

    /// Clear the shared descriptor (if it is this mode's) and go idle.
    pub fn reset(&self) {
        if self.inner.store.read().mode == M::MODE {
            self.inner.store.clear();
        }
        self.release();
    }

    fn release(&self) {
        let state = lock(&self.inner.state);
        if state.is_running() {
            self.inner.leave(state);
        } else {
            self.inner.cancel_ticker();
        }
    }

    pub fn status(&self) -> ControllerStatus {
        lock(&self.inner.state).status
    }

    pub fn is_ticking(&self) -> bool {
        let state = lock(&self.inner.state);
        state.is_running() && state.ticking
    }

    /// Current display, projected fresh. Never fires an edge.
    pub fn snapshot(&self) -> ControllerSnapshot {
        let mut state = lock(&self.inner.state);
        let timeline = state.descriptor.and_then(|d| d.timeline());
        if let Some(timeline) = timeline {
            if let Some(display) = M::project(self.inner.clock.corrected_now(), &timeline) {
                state.display = display;
            }
        }
        ControllerInner::<M>::snapshot_of(&state)
    }
}

impl SessionController<Stopwatch> {
    /// There is no pause: stopping a shared stopwatch ends it for everyone.
    pub fn stop(&self) {
        self.reset();
    }
}
