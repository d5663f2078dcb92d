pub mod local;
pub mod source;
pub mod sync;

pub use local::{LocalClock, ManualClock, SystemClock};
pub use source::{HttpTimeSource, ReferenceTimeSource};
pub use sync::ClockService;
