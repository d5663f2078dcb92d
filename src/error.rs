use thiserror::Error;

/// The reference time source could not be reached. Never fatal: the clock
/// keeps its previous offset (or zero) and reports itself unsynced.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("reference time unavailable after {attempts} attempt(s): {last_error}")]
    Unavailable { attempts: u32, last_error: String },
}

/// A `start()` request was refused. Nothing is published when this is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("duration must be greater than zero")]
    NonPositiveDuration,
    #[error("invalid time of day {hour:02}:{minute:02}")]
    InvalidTimeOfDay { hour: u32, minute: u32 },
    #[error("a {0} session is already running")]
    AlreadyRunning(&'static str),
}
