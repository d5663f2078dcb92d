use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    /// No active session.
    #[default]
    Home,
    Stopwatch,
    Timer,
    Alarm,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Home => "home",
            SessionMode::Stopwatch => "stopwatch",
            SessionMode::Timer => "timer",
            SessionMode::Alarm => "alarm",
        }
    }

    /// Unknown values map to `Home`.
    pub fn from_param(value: &str) -> Self {
        match value {
            "stopwatch" => SessionMode::Stopwatch,
            "timer" => SessionMode::Timer,
            "alarm" => SessionMode::Alarm,
            _ => SessionMode::Home,
        }
    }
}

/// The shared timeline as carried by a link: a mode plus absolute anchors in
/// Unix milliseconds.
///
/// Never patched in place; a new session produces a whole new value. Fields
/// that the mode needs may still be missing (a hand-edited or truncated
/// link), in which case [`SessionDescriptor::timeline`] is `None` and
/// controllers stay idle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub mode: SessionMode,
    pub anchor_start: Option<i64>,
    pub duration: Option<i64>,
    pub target_time: Option<i64>,
}

/// A descriptor whose required fields are all present and sane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeline {
    Stopwatch { anchor_start: i64 },
    Timer { anchor_start: i64, duration: i64 },
    Alarm { target_time: i64 },
}

impl SessionDescriptor {
    pub fn home() -> Self {
        Self::default()
    }

    pub fn stopwatch(anchor_start: i64) -> Self {
        Self {
            mode: SessionMode::Stopwatch,
            anchor_start: Some(anchor_start),
            ..Self::default()
        }
    }

    pub fn timer(anchor_start: i64, duration: i64) -> Self {
        Self {
            mode: SessionMode::Timer,
            anchor_start: Some(anchor_start),
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn alarm(target_time: i64) -> Self {
        Self {
            mode: SessionMode::Alarm,
            target_time: Some(target_time),
            ..Self::default()
        }
    }

    pub fn timeline(&self) -> Option<Timeline> {
        match self.mode {
            SessionMode::Home => None,
            SessionMode::Stopwatch => Some(Timeline::Stopwatch {
                anchor_start: self.anchor_start?,
            }),
            SessionMode::Timer => {
                let duration = self.duration.filter(|d| *d > 0)?;
                Some(Timeline::Timer {
                    anchor_start: self.anchor_start?,
                    duration,
                })
            }
            SessionMode::Alarm => Some(Timeline::Alarm {
                target_time: self.target_time?,
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.timeline().is_some()
    }
}
