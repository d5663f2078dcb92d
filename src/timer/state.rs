use serde::{Deserialize, Serialize};

use crate::session::{SessionDescriptor, SessionMode};

use super::projector::DisplayState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ControllerStatus {
    #[default]
    Idle,
    Running,
}

/// Fires once when a quantity first sits at its threshold, then stays quiet
/// until re-armed. Re-arming happens only when the session is cleared or
/// replaced, so clock jitter around zero cannot ring the alarm twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeTrigger {
    fired: bool,
}

impl EdgeTrigger {
    /// True exactly on the first observation at the threshold.
    pub fn observe(&mut self, at_threshold: bool) -> bool {
        if at_threshold && !self.fired {
            self.fired = true;
            true
        } else {
            false
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn rearm(&mut self) {
        self.fired = false;
    }
}

#[derive(Debug, Clone)]
pub struct ControllerState<D> {
    pub status: ControllerStatus,
    pub descriptor: Option<SessionDescriptor>,
    pub display: D,
    pub edge: EdgeTrigger,
    /// False once a countdown has expired and stopped its cadence.
    pub ticking: bool,
    /// Bumped on every enter/leave so a stale ticker can tell it is stale.
    pub generation: u64,
}

impl<D: Default> Default for ControllerState<D> {
    fn default() -> Self {
        Self {
            status: ControllerStatus::Idle,
            descriptor: None,
            display: D::default(),
            edge: EdgeTrigger::default(),
            ticking: false,
            generation: 0,
        }
    }
}

impl<D: Default> ControllerState<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == ControllerStatus::Running
    }

    /// Switch to a (new) session. Returns the generation the ticker must carry.
    pub fn begin(&mut self, descriptor: SessionDescriptor, display: D) -> u64 {
        *self = Self {
            status: ControllerStatus::Running,
            descriptor: Some(descriptor),
            display,
            edge: EdgeTrigger::default(),
            ticking: true,
            generation: self.generation.wrapping_add(1),
        };
        self.generation
    }

    pub fn clear(&mut self) {
        *self = Self {
            generation: self.generation.wrapping_add(1),
            ..Self::default()
        };
    }
}

/// What a front end needs to draw one controller.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSnapshot {
    pub mode: SessionMode,
    pub status: ControllerStatus,
    pub display: DisplayState,
    /// The threshold edge has been signalled for this session.
    pub fired: bool,
}
