use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use tokio::{sync::watch, task::JoinHandle};

use crate::error::SyncError;

use super::{LocalClock, ReferenceTimeSource, SystemClock};

// Set to false to silence sync chatter
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

struct ClockInner {
    local: Arc<dyn LocalClock>,
    offset_ms: AtomicI64,
    synced: watch::Sender<bool>,
}

/// Process-wide corrected clock.
///
/// Starts unsynced with a zero offset. Only [`ClockService::estimate_offset`]
/// writes the offset; controllers only ever call [`ClockService::corrected_now`].
#[derive(Clone)]
pub struct ClockService {
    inner: Arc<ClockInner>,
}

impl ClockService {
    pub fn new(local: Arc<dyn LocalClock>) -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            inner: Arc::new(ClockInner {
                local,
                offset_ms: AtomicI64::new(0),
                synced,
            }),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Local time shifted by the current offset. O(1), no side effects.
    pub fn corrected_now(&self) -> i64 {
        self.inner
            .local
            .now_ms()
            .saturating_add(self.inner.offset_ms.load(Ordering::Acquire))
    }

    pub fn offset_ms(&self) -> i64 {
        self.inner.offset_ms.load(Ordering::Acquire)
    }

    pub fn is_synced(&self) -> bool {
        *self.inner.synced.borrow()
    }

    /// Watch the synced flag, for a status indicator.
    pub fn subscribe_synced(&self) -> watch::Receiver<bool> {
        self.inner.synced.subscribe()
    }

    /// Ask `source` for the reference time, up to `attempts` times, and store
    /// `reference - local_at_receipt` as the new offset.
    ///
    /// Round-trip latency is not compensated. On failure the previous offset
    /// (zero if there never was a good one) stays in place.
    pub async fn estimate_offset(
        &self,
        source: &dyn ReferenceTimeSource,
        attempts: u32,
    ) -> Result<i64, SyncError> {
        let attempts = attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match source.fetch_reference_ms().await {
                Ok(reference_ms) => {
                    let local_ms = self.inner.local.now_ms();
                    let offset = reference_ms.saturating_sub(local_ms);
                    self.inner.offset_ms.store(offset, Ordering::Release);
                    self.inner.synced.send_replace(true);
                    log_info!("clock synced on attempt {attempt}: offset {offset} ms");
                    return Ok(offset);
                }
                Err(err) => {
                    log_warn!("reference time attempt {attempt}/{attempts} failed: {err:#}");
                    last_error = format!("{err:#}");
                }
            }
        }

        if self.is_synced() {
            log_warn!(
                "clock re-sync failed, keeping previous offset {} ms",
                self.offset_ms()
            );
        } else {
            log_warn!("clock sync unavailable, using local clock");
        }

        Err(SyncError::Unavailable {
            attempts,
            last_error,
        })
    }

    /// Run [`ClockService::estimate_offset`] in the background so nothing
    /// waits on the network.
    pub fn spawn_sync(&self, source: Arc<dyn ReferenceTimeSource>, attempts: u32) -> JoinHandle<()> {
        let clock = self.clone();
        tokio::spawn(async move {
            // Unavailable is already logged and leaves the clock usable.
            let _ = clock.estimate_offset(source.as_ref(), attempts).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::*;
    use crate::clock::ManualClock;

    struct FixedSource(i64);

    #[async_trait]
    impl ReferenceTimeSource for FixedSource {
        async fn fetch_reference_ms(&self) -> Result<i64> {
            Ok(self.0)
        }
    }

    /// Fails `failures` times, then answers with `reference_ms`.
    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
        reference_ms: i64,
    }

    impl FlakySource {
        fn new(failures: u32, reference_ms: i64) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                reference_ms,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReferenceTimeSource for FlakySource {
        async fn fetch_reference_ms(&self) -> Result<i64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(anyhow!("connection refused"))
            } else {
                Ok(self.reference_ms)
            }
        }
    }

    fn manual(start_ms: i64) -> (ManualClock, ClockService) {
        let local = ManualClock::new(start_ms);
        let service = ClockService::new(Arc::new(local.clone()));
        (local, service)
    }

    #[test]
    fn starts_unsynced_with_zero_offset() {
        let (_, clock) = manual(5_000);
        assert!(!clock.is_synced());
        assert_eq!(clock.offset_ms(), 0);
        assert_eq!(clock.corrected_now(), 5_000);
    }

    #[tokio::test]
    async fn offset_is_reference_minus_local() {
        let (local, clock) = manual(10_000);
        let offset = clock.estimate_offset(&FixedSource(12_500), 3).await.unwrap();

        assert_eq!(offset, 2_500);
        assert!(clock.is_synced());
        assert_eq!(clock.corrected_now(), 12_500);

        local.advance(1_000);
        assert_eq!(clock.corrected_now(), 13_500);
    }

    #[tokio::test]
    async fn negative_offset_when_local_clock_runs_ahead() {
        let (_, clock) = manual(10_000);
        clock.estimate_offset(&FixedSource(9_000), 1).await.unwrap();
        assert_eq!(clock.offset_ms(), -1_000);
        assert_eq!(clock.corrected_now(), 9_000);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let (_, clock) = manual(0);
        let source = FlakySource::new(2, 700);

        let offset = clock.estimate_offset(&source, 3).await.unwrap();
        assert_eq!(offset, 700);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let (_, clock) = manual(1_000);
        let source = FlakySource::new(u32::MAX, 0);

        let err = clock.estimate_offset(&source, 3).await.unwrap_err();
        assert!(matches!(err, SyncError::Unavailable { attempts: 3, .. }));
        assert_eq!(source.calls(), 3);
        assert!(!clock.is_synced());
        assert_eq!(clock.corrected_now(), 1_000);
    }

    #[tokio::test]
    async fn failed_resync_keeps_previous_offset() {
        let (_, clock) = manual(1_000);
        clock.estimate_offset(&FixedSource(4_000), 1).await.unwrap();
        assert_eq!(clock.offset_ms(), 3_000);

        let failing = FlakySource::new(u32::MAX, 0);
        assert!(clock.estimate_offset(&failing, 2).await.is_err());

        assert_eq!(clock.offset_ms(), 3_000);
        assert!(clock.is_synced());
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let (_, clock) = manual(0);
        let source = FlakySource::new(0, 50);
        clock.estimate_offset(&source, 0).await.unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn background_sync_flips_status_indicator() {
        let (_, clock) = manual(100);
        let mut synced = clock.subscribe_synced();
        assert!(!*synced.borrow());

        clock
            .spawn_sync(Arc::new(FixedSource(600)), 3)
            .await
            .unwrap();

        assert!(synced.has_changed().unwrap());
        assert!(*synced.borrow_and_update());
        assert_eq!(clock.offset_ms(), 500);
    }
}
