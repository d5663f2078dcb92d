#[cfg(feature = "audio")]
pub mod beep;
pub mod tone;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use tone::{default_output, LogTone, ToneOutput};

// Set to false to silence pulse logging
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// A bounded run of tone pulses: `pulses` beeps of `pulse_ms`, one every
/// `interval_ms`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AlertPattern {
    pub pulses: u32,
    pub interval_ms: u64,
    pub pulse_ms: u64,
    pub frequency_hz: f32,
    pub volume: f32,
}

impl AlertPattern {
    /// One second-long 800 Hz beep.
    pub fn timer_default() -> Self {
        Self {
            pulses: 1,
            interval_ms: 1000,
            pulse_ms: 1000,
            frequency_hz: 800.0,
            volume: 0.3,
        }
    }

    /// Ten half-second 880 Hz beeps, one per second.
    pub fn alarm_default() -> Self {
        Self {
            pulses: 10,
            interval_ms: 1000,
            pulse_ms: 500,
            frequency_hz: 880.0,
            volume: 0.3,
        }
    }
}

/// Where controllers send "the edge happened" and "never mind".
pub trait AlertSink: Send + Sync {
    fn fire_alert(&self, pattern: &AlertPattern);
    /// Idempotent. Releases the pulse task before returning.
    fn stop_alert(&self);
}

struct ActiveAlert {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Plays an [`AlertPattern`] on a [`ToneOutput`] from a tokio task.
pub struct AlertPlayer {
    output: Arc<dyn ToneOutput>,
    active: Mutex<Option<ActiveAlert>>,
}

impl AlertPlayer {
    pub fn new(output: Arc<dyn ToneOutput>) -> Self {
        Self {
            output,
            active: Mutex::new(None),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|alert| !alert.handle.is_finished())
            .unwrap_or(false)
    }

    fn take_active(&self) -> Option<ActiveAlert> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl AlertSink for AlertPlayer {
    fn fire_alert(&self, pattern: &AlertPattern) {
        self.stop_alert();
        if pattern.pulses == 0 {
            return;
        }

        let pattern = *pattern;
        let output = Arc::clone(&self.output);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        log_info!(
            "alert: {} pulse(s) at {} Hz every {} ms",
            pattern.pulses,
            pattern.frequency_hz,
            pattern.interval_ms
        );

        let handle = tokio::spawn(async move {
            let length = Duration::from_millis(pattern.pulse_ms);
            let cool_down = Duration::from_millis(pattern.interval_ms);
            for pulse in 1..=pattern.pulses {
                if token.is_cancelled() {
                    break;
                }
                log_debug!("alert pulse {pulse}/{}", pattern.pulses);
                output.pulse(pattern.frequency_hz, pattern.volume, length);

                tokio::select! {
                    _ = tokio::time::sleep(cool_down) => {}
                    _ = token.cancelled() => break,
                }
            }
        });

        *self.active.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(ActiveAlert { cancel, handle });
    }

    fn stop_alert(&self) {
        if let Some(alert) = self.take_active() {
            alert.cancel.cancel();
            alert.handle.abort();
            self.output.silence();
        }
    }
}

impl Drop for AlertPlayer {
    fn drop(&mut self) {
        self.stop_alert();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingTone {
        pulses: AtomicU32,
        silences: AtomicU32,
    }

    impl ToneOutput for CountingTone {
        fn pulse(&self, _frequency_hz: f32, _volume: f32, _length: Duration) {
            self.pulses.fetch_add(1, Ordering::SeqCst);
        }

        fn silence(&self) {
            self.silences.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn player() -> (Arc<CountingTone>, AlertPlayer) {
        let tone = Arc::new(CountingTone::default());
        let player = AlertPlayer::new(tone.clone());
        (tone, player)
    }

    #[tokio::test(start_paused = true)]
    async fn plays_exactly_the_pattern_count() {
        let (tone, player) = player();
        player.fire_alert(&AlertPattern::alarm_default());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(tone.pulses.load(Ordering::SeqCst), 10);
        assert!(!player.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cuts_the_run_short() {
        let (tone, player) = player();
        player.fire_alert(&AlertPattern::alarm_default());

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        player.stop_alert();
        let played = tone.pulses.load(Ordering::SeqCst);
        assert_eq!(played, 3);
        assert!(!player.is_playing());
        assert_eq!(tone.silences.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(tone.pulses.load(Ordering::SeqCst), played);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let (tone, player) = player();
        player.stop_alert();
        player.stop_alert();
        assert_eq!(tone.silences.load(Ordering::SeqCst), 0);

        player.fire_alert(&AlertPattern::timer_default());
        player.stop_alert();
        player.stop_alert();
        assert_eq!(tone.silences.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refiring_restarts_instead_of_stacking() {
        let (tone, player) = player();
        let pattern = AlertPattern {
            pulses: 3,
            ..AlertPattern::alarm_default()
        };
        player.fire_alert(&pattern);
        tokio::time::sleep(Duration::from_millis(10)).await;
        player.fire_alert(&pattern);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(tone.pulses.load(Ordering::SeqCst), 4);
    }
}
