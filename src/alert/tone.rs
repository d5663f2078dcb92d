use std::sync::Arc;
use std::time::Duration;

use log::info;

/// Makes the actual noise. One call per pulse; must not block.
pub trait ToneOutput: Send + Sync {
    fn pulse(&self, frequency_hz: f32, volume: f32, length: Duration);
    /// Cut whatever is still sounding.
    fn silence(&self);
}

/// Writes pulses to the log instead of a speaker. Used when the crate is built
/// without the `audio` feature, and by the speaker output's thread when no
/// output device can be opened.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTone;

impl ToneOutput for LogTone {
    fn pulse(&self, frequency_hz: f32, _volume: f32, length: Duration) {
        info!("\u{7}beep {frequency_hz} Hz for {} ms", length.as_millis());
    }

    fn silence(&self) {}
}

#[cfg(feature = "audio")]
pub use rodio_output::RodioTone;

#[cfg(feature = "audio")]
mod rodio_output {
    use std::sync::{
        mpsc::{self, Receiver, Sender},
        Mutex, PoisonError,
    };
    use std::thread;
    use std::time::Duration;

    use log::error;
    use rodio::{OutputStream, Sink};

    use super::{LogTone, ToneOutput};
    use crate::alert::beep::SineBeep;

    enum ToneCommand {
        Pulse {
            frequency_hz: f32,
            volume: f32,
            length: Duration,
        },
        Silence,
    }

    /// Hands every queued command to `output` until all senders are gone.
    fn drain_into(rx: &Receiver<ToneCommand>, output: &dyn ToneOutput) {
        while let Ok(cmd) = rx.recv() {
            match cmd {
                ToneCommand::Pulse {
                    frequency_hz,
                    volume,
                    length,
                } => output.pulse(frequency_hz, volume, length),
                ToneCommand::Silence => output.silence(),
            }
        }
    }

    /// Speaker output. rodio's stream is not `Send`, so it lives on its own
    /// thread and is driven over a channel.
    pub struct RodioTone {
        tx: Mutex<Option<Sender<ToneCommand>>>,
    }

    impl RodioTone {
        pub fn new() -> Self {
            Self { tx: Mutex::new(None) }
        }

        fn ensure_thread(&self) -> Result<Sender<ToneCommand>, String> {
            let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tx) = guard.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<ToneCommand>();
            thread::Builder::new()
                .name("alert-tone".to_string())
                .spawn(move || {
                    let (_stream, handle) = match OutputStream::try_default() {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!("Failed to open audio output, logging tones instead: {}", e);
                            drain_into(&rx, &LogTone);
                            return;
                        }
                    };
                    let mut sink: Option<Sink> = None;

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            ToneCommand::Pulse {
                                frequency_hz,
                                volume,
                                length,
                            } => {
                                if sink.is_none() {
                                    match Sink::try_new(&handle) {
                                        Ok(s) => sink = Some(s),
                                        Err(e) => {
                                            error!("Failed to create audio sink: {}", e);
                                            continue;
                                        }
                                    }
                                }
                                if let Some(ref s) = sink {
                                    s.append(SineBeep::new(frequency_hz, volume, length));
                                }
                            }
                            ToneCommand::Silence => {
                                if let Some(s) = sink.take() {
                                    s.stop();
                                }
                            }
                        }
                    }
                })
                .map_err(|e| e.to_string())?;

            *guard = Some(tx.clone());
            Ok(tx)
        }
    }

    impl Default for RodioTone {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ToneOutput for RodioTone {
        fn pulse(&self, frequency_hz: f32, volume: f32, length: Duration) {
            let sent = self.ensure_thread().and_then(|tx| {
                tx.send(ToneCommand::Pulse {
                    frequency_hz,
                    volume,
                    length,
                })
                .map_err(|e| e.to_string())
            });
            if let Err(e) = sent {
                error!("Failed to queue alert tone: {}", e);
            }
        }

        fn silence(&self) {
            let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(ToneCommand::Silence);
            }
        }
    }

}

/// Speaker output when built with `audio`, the log otherwise.
pub fn default_output() -> Arc<dyn ToneOutput> {
    #[cfg(feature = "audio")]
    {
        Arc::new(RodioTone::new())
    }

    #[cfg(not(feature = "audio"))]
    {
        Arc::new(LogTone)
    }
}
