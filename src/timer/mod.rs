pub mod commands;
pub mod controller;
pub mod format;
pub mod hub;
pub mod modes;
pub mod projector;
pub mod state;

pub use controller::{
    AlarmController, ControllerConfig, ControllerEvent, SessionController, StopwatchController,
    TimerController,
};
pub use hub::TimerHub;
pub use modes::{AlarmInput, AlarmZone, TimelineMode, TimerInput};
pub use projector::DisplayState;
pub use state::{ControllerSnapshot, ControllerStatus};
